//! The [`Pipeline`] and its builder.

use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use super::progress::{ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate};
use super::{
    CoercionStage, DeduplicationStage, DerivedFeatureStage, EncodingStage, MissingValueStage,
    OutlierStage, ScalingStage, Stage, StageState,
};
use crate::config::{OutlierStrategy, PipelineConfig};
use crate::dataset::{CleanedDataset, RawDataset};
use crate::error::{ProcessingError, Result};
use crate::reporting::CleaningReport;

/// Share of rows or columns removed above which the report carries a warning.
const REMOVAL_WARNING_PCT: f64 = 30.0;

/// The cleaning pipeline.
///
/// Use [`Pipeline::builder()`] to create a new pipeline with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use care_processing::{MissingValueStrategy, Pipeline, PipelineConfig};
///
/// let pipeline = Pipeline::builder()
///     .config(
///         PipelineConfig::builder()
///             .missing_value_strategy(MissingValueStrategy::Mean)
///             .build()?,
///     )
///     .build()?;
///
/// let (cleaned, report) = pipeline.run(&raw)?;
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    stages: Vec<Box<dyn Stage>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(Pipeline: Send, Sync);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Names of the stages this pipeline runs, in order.
    pub fn stages(&self) -> Vec<PipelineStage> {
        self.stages.iter().map(|s| s.stage()).collect()
    }

    /// Run every stage over `raw`.
    ///
    /// The result depends only on `raw` and the configuration, so running
    /// twice gives identical output.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError::Pipeline`] when the dataset has no rows or
    /// no columns, on input or after any stage.
    pub fn run(&self, raw: &RawDataset) -> Result<(CleanedDataset, CleaningReport)> {
        match self.run_internal(raw) {
            Ok(result) => {
                self.report_progress(ProgressUpdate::complete("Preprocessing complete"));
                Ok(result)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    fn run_internal(&self, raw: &RawDataset) -> Result<(CleanedDataset, CleaningReport)> {
        let start_time = Instant::now();
        info!(
            "Starting preprocessing of '{}' ({} rows x {} columns)",
            raw.source().name,
            raw.height(),
            raw.width()
        );
        ensure_not_empty(raw.height(), raw.width(), "the uploaded dataset")?;

        let mut state = StageState::from_raw(raw);
        let total = self.stages.len();
        for (idx, stage) in self.stages.iter().enumerate() {
            let name = stage.stage().display_name();
            info!("Step {}: {}...", idx + 1, name);
            self.report_progress(ProgressUpdate::step(
                stage.stage(),
                idx,
                total,
                format!("{}...", name),
            ));

            state = stage.apply(state, &self.config)?;
            ensure_not_empty(
                state.df.height(),
                state.df.width(),
                &format!("stage '{}'", name),
            )?;
        }

        let StageState {
            df,
            schema,
            encodings,
            mut report,
        } = state;
        finalize_report(&mut report, &df)?;

        info!(
            "Preprocessing complete in {:.2}s: {} rows x {} columns",
            start_time.elapsed().as_secs_f64(),
            df.height(),
            df.width()
        );

        let cleaned = CleanedDataset::new(
            df,
            schema,
            encodings,
            raw.source().clone(),
            raw.generation(),
        );
        Ok((cleaned, report))
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }
}

fn ensure_not_empty(rows: usize, columns: usize, after: &str) -> Result<()> {
    if columns == 0 {
        return Err(ProcessingError::Pipeline(format!(
            "no columns left after {}",
            after
        )));
    }
    if rows == 0 {
        return Err(ProcessingError::Pipeline(format!(
            "no rows left after {}",
            after
        )));
    }
    Ok(())
}

/// Fill in final counts and the per-column `missing_after`.
fn finalize_report(report: &mut CleaningReport, df: &polars::prelude::DataFrame) -> Result<()> {
    report.rows_after = df.height();
    report.columns_after = df.width();

    for column in report.columns.iter_mut().filter(|c| !c.was_removed) {
        column.missing_after = df.column(&column.name)?.null_count();
    }

    if report.rows_removed_percentage() > REMOVAL_WARNING_PCT {
        let warning = format!(
            "{:.1}% of rows were removed during preprocessing",
            report.rows_removed_percentage()
        );
        report.add_warning(warning);
    }
    let removed_columns = report.removed_columns().len();
    if report.columns_before > 0
        && removed_columns as f64 / report.columns_before as f64 * 100.0 > REMOVAL_WARNING_PCT
    {
        report.add_warning(format!(
            "{} of {} columns were removed for missing values",
            removed_columns, report.columns_before
        ));
    }
    Ok(())
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback using a closure.
    pub fn on_progress<F>(self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter(Arc::new(ClosureProgressReporter::new(callback)))
    }

    /// Build the pipeline.
    ///
    /// Optional stages (deduplication, outliers, derived features, scaling)
    /// are only included when the configuration enables them.
    pub fn build(self) -> Result<Pipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let mut stages: Vec<Box<dyn Stage>> = vec![Box::new(CoercionStage)];
        if config.remove_duplicates {
            stages.push(Box::new(DeduplicationStage));
        }
        stages.push(Box::new(MissingValueStage));
        if config.outlier_strategy != OutlierStrategy::Keep {
            stages.push(Box::new(OutlierStage));
        }
        stages.push(Box::new(EncodingStage));
        if !config.derived_features.is_empty() {
            stages.push(Box::new(DerivedFeatureStage));
        }
        if config.scaling.is_some() {
            stages.push(Box::new(ScalingStage));
        }

        Ok(Pipeline {
            config,
            stages,
            progress_reporter: self.progress_reporter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DerivedFeature, IngestConfig, MissingValueStrategy, ScalingMethod};
    use crate::ingest::ingest_bytes;
    use std::sync::Mutex;

    fn raw(csv: &str) -> RawDataset {
        ingest_bytes(csv.as_bytes(), "t.csv", &IngestConfig::default()).unwrap()
    }

    #[test]
    fn test_default_stage_order() {
        let pipeline = Pipeline::builder().build().unwrap();
        assert_eq!(
            pipeline.stages(),
            vec![
                PipelineStage::Coercion,
                PipelineStage::MissingValues,
                PipelineStage::Encoding
            ]
        );
    }

    #[test]
    fn test_optional_stages_follow_config() {
        let config = PipelineConfig::builder()
            .remove_duplicates(true)
            .outlier_strategy(OutlierStrategy::Cap)
            .derive(DerivedFeature::AgeGroup)
            .scaling(ScalingMethod::Standard)
            .build()
            .unwrap();
        let pipeline = Pipeline::builder().config(config).build().unwrap();
        assert_eq!(
            pipeline.stages(),
            vec![
                PipelineStage::Coercion,
                PipelineStage::Deduplication,
                PipelineStage::MissingValues,
                PipelineStage::Outliers,
                PipelineStage::Encoding,
                PipelineStage::DerivedFeatures,
                PipelineStage::Scaling,
            ]
        );
    }

    #[test]
    fn test_no_rows_is_pipeline_error() {
        let err = Pipeline::builder()
            .build()
            .unwrap()
            .run(&raw("age,outcome\n"))
            .unwrap_err();
        assert_eq!(err.error_code(), "PIPELINE_ERROR");
    }

    #[test]
    fn test_dropping_every_column_is_pipeline_error() {
        let err = Pipeline::builder()
            .build()
            .unwrap()
            .run(&raw("a,b\nNA,NA\nNA,NA\n"))
            .unwrap_err();
        assert!(matches!(err, ProcessingError::Pipeline(_)));
    }

    #[test]
    fn test_progress_is_reported_per_stage() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let pipeline = Pipeline::builder()
            .on_progress(move |u| sink.lock().unwrap().push(u.stage))
            .build()
            .unwrap();
        pipeline.run(&raw("age\n1\n2\n")).unwrap();

        let stages = seen.lock().unwrap().clone();
        assert_eq!(stages.first(), Some(&PipelineStage::Coercion));
        assert_eq!(stages.last(), Some(&PipelineStage::Complete));
        assert_eq!(stages.len(), 4);
    }

    #[test]
    fn test_row_drops_reconcile() {
        let config = PipelineConfig::builder()
            .missing_value_strategy(MissingValueStrategy::Drop)
            .remove_duplicates(true)
            .build()
            .unwrap();
        let (cleaned, report) = Pipeline::builder()
            .config(config)
            .build()
            .unwrap()
            .run(&raw("age,gender\n25,M\n25,M\nNA,F\n40,F\n50,M\n"))
            .unwrap();

        assert_eq!(report.rows_before, 5);
        assert_eq!(report.rows_after, cleaned.height());
        assert_eq!(report.rows_before - report.rows_dropped(), report.rows_after);
        assert_eq!(report.rows_after, 3);
    }

    #[test]
    fn test_large_removal_adds_warning() {
        let config = PipelineConfig::builder()
            .missing_value_strategy(MissingValueStrategy::Drop)
            .build()
            .unwrap();
        let (_, report) = Pipeline::builder()
            .config(config)
            .build()
            .unwrap()
            .run(&raw("age,name\n1,a\nNA,b\n3,c\n"))
            .unwrap();
        assert_eq!(report.rows_after, 2);
        assert!(report.warnings.iter().any(|w| w.contains("33.3% of rows")));
    }
}
