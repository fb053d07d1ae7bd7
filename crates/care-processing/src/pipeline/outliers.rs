//! Outlier handling for numeric columns using Tukey's 1.5 IQR fences.

use polars::prelude::*;
use tracing::{debug, info};

use super::{PipelineStage, Stage, StageState};
use crate::config::{OutlierStrategy, PipelineConfig};
use crate::error::Result;
use crate::profiler::statistics::iqr_bounds;
use crate::reporting::{ActionType, CleaningAction, DropRule};
use crate::types::SemanticType;
use crate::utils::series_f64;

/// Columns with fewer observed values than this are left alone.
const MIN_VALUES_FOR_FENCES: usize = 4;

/// Caps values to the fences, or drops rows holding a value outside them.
pub struct OutlierStage;

impl Stage for OutlierStage {
    fn stage(&self) -> PipelineStage {
        PipelineStage::Outliers
    }

    fn apply(&self, mut state: StageState, config: &PipelineConfig) -> Result<StageState> {
        match config.outlier_strategy {
            OutlierStrategy::Keep => {}
            OutlierStrategy::Cap => cap_outliers(&mut state)?,
            OutlierStrategy::Remove => remove_outliers(&mut state)?,
        }
        Ok(state)
    }
}

/// Numeric columns with their values and fences, fences computed before any change.
fn fenced_columns(state: &StageState) -> Result<Vec<(String, Vec<Option<f64>>, (f64, f64))>> {
    let mut fenced = Vec::new();
    for name in state.columns_of(SemanticType::Numeric) {
        let values = series_f64(state.series(&name)?)?;
        let observed: Vec<f64> = values.iter().flatten().copied().collect();
        if observed.len() < MIN_VALUES_FOR_FENCES {
            debug!("Column '{}': too few values for outlier fences", name);
            continue;
        }
        if let Some(bounds) = iqr_bounds(&observed) {
            fenced.push((name, values, bounds));
        }
    }
    Ok(fenced)
}

fn is_outlier(value: f64, (lower, upper): (f64, f64)) -> bool {
    value < lower || value > upper
}

fn cap_outliers(state: &mut StageState) -> Result<()> {
    for (name, values, bounds) in fenced_columns(state)? {
        let capped_count = values
            .iter()
            .flatten()
            .filter(|v| is_outlier(**v, bounds))
            .count();
        if capped_count == 0 {
            continue;
        }

        let capped: Vec<Option<f64>> = values
            .into_iter()
            .map(|v| v.map(|x| x.clamp(bounds.0, bounds.1)))
            .collect();
        state.replace(&name, Series::new(name.as_str().into(), capped))?;

        info!("Column '{}': capped {} outliers", name, capped_count);
        if let Some(entry) = state.report.column_mut(&name) {
            entry.outliers_handled = capped_count;
        }
        state.report.add_action(CleaningAction::new(
            ActionType::OutlierHandled,
            &name,
            format!(
                "Capped {} values to [{:.2}, {:.2}]",
                capped_count, bounds.0, bounds.1
            ),
        ));
    }
    Ok(())
}

fn remove_outliers(state: &mut StageState) -> Result<()> {
    let mut keep = vec![true; state.df.height()];
    let mut per_column = Vec::new();

    for (name, values, bounds) in fenced_columns(state)? {
        let mut count = 0;
        for (slot, value) in keep.iter_mut().zip(&values) {
            if value.is_some_and(|v| is_outlier(v, bounds)) {
                *slot = false;
                count += 1;
            }
        }
        if count > 0 {
            per_column.push((name, count));
        }
    }
    if per_column.is_empty() {
        return Ok(());
    }

    let removed = state.retain_rows(&keep)?;
    info!("Removed {} rows containing outliers", removed);
    for (name, count) in &per_column {
        if let Some(entry) = state.report.column_mut(name) {
            entry.outliers_handled = *count;
        }
    }
    state.report.record_row_drop(DropRule::Outliers, removed);
    state.report.add_action(CleaningAction::new(
        ActionType::RowsRemoved,
        "dataset",
        format!(
            "Removed {} rows with outliers in: {}",
            removed,
            per_column
                .iter()
                .map(|(name, _)| name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestConfig;
    use crate::ingest::ingest_bytes;
    use crate::pipeline::CoercionStage;

    const BILLING: &str = "billing\n10\n12\n14\n16\n18\n1000\n";

    fn run(strategy: OutlierStrategy) -> StageState {
        let config = PipelineConfig::builder()
            .outlier_strategy(strategy)
            .build()
            .unwrap();
        let raw = ingest_bytes(BILLING.as_bytes(), "t.csv", &IngestConfig::default()).unwrap();
        let state = CoercionStage
            .apply(StageState::from_raw(&raw), &config)
            .unwrap();
        OutlierStage.apply(state, &config).unwrap()
    }

    #[test]
    fn test_cap_outliers() {
        let state = run(OutlierStrategy::Cap);
        let values = series_f64(state.series("billing").unwrap()).unwrap();
        assert_eq!(state.df.height(), 6);
        // Q1 = 12.5, Q3 = 17.5, upper fence = 25
        assert_eq!(values[5], Some(25.0));
        assert_eq!(state.report.column("billing").unwrap().outliers_handled, 1);
    }

    #[test]
    fn test_remove_outliers() {
        let state = run(OutlierStrategy::Remove);
        assert_eq!(state.df.height(), 5);
        assert_eq!(state.report.rows_dropped_by(DropRule::Outliers), 1);
    }

    #[test]
    fn test_keep_changes_nothing() {
        let state = run(OutlierStrategy::Keep);
        assert_eq!(state.df.height(), 6);
        assert!(state.report.actions.is_empty());
    }
}
