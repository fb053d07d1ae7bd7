//! Numeric scaling into new `<column>_<suffix>` columns.
//!
//! The source column is left untouched. Statistics come from the non-missing
//! values after imputation and outlier handling; missing rows stay missing.

use polars::prelude::*;
use tracing::{info, warn};

use super::{PipelineStage, Stage, StageState};
use crate::config::{PipelineConfig, ScalingMethod};
use crate::error::Result;
use crate::profiler::statistics;
use crate::reporting::{ActionType, CleaningAction};
use crate::types::SemanticType;
use crate::utils::series_f64;

pub struct ScalingStage;

impl Stage for ScalingStage {
    fn stage(&self) -> PipelineStage {
        PipelineStage::Scaling
    }

    fn apply(&self, mut state: StageState, config: &PipelineConfig) -> Result<StageState> {
        let Some(method) = config.scaling else {
            return Ok(state);
        };

        // Default to the upload's numeric columns, not derived ones.
        let targets: Vec<String> = if config.scaled_columns.is_empty() {
            state
                .columns_of(SemanticType::Numeric)
                .into_iter()
                .filter(|c| state.report.column(c).is_some())
                .collect()
        } else {
            config.scaled_columns.clone()
        };

        for name in targets {
            let output = format!("{}_{}", name, method.suffix());
            let reason = match state.semantic_type(&name) {
                None => Some(format!("column '{}' not found", name)),
                Some(SemanticType::Numeric) if state.semantic_type(&output).is_some() => {
                    Some(format!("output column '{}' already exists", output))
                }
                Some(SemanticType::Numeric) => None,
                Some(other) => Some(format!(
                    "column '{}' is {}, expected numeric",
                    name,
                    other.display_name().to_lowercase()
                )),
            };

            let values = match reason {
                Some(_) => Vec::new(),
                None => series_f64(state.series(&name)?)?,
            };
            let observed: Vec<f64> = values.iter().flatten().copied().collect();
            let reason = reason.or_else(|| {
                observed
                    .is_empty()
                    .then(|| format!("column '{}' has no values", name))
            });

            if let Some(reason) = reason {
                warn!("Skipped {} scaling of '{}': {}", method.name(), name, reason);
                state
                    .report
                    .add_warning(format!("scaling of '{}' skipped: {}", name, reason));
                state.report.add_action(CleaningAction::new(
                    ActionType::ScalingSkipped,
                    &name,
                    format!("Skipped {} scaling: {}", method.name(), reason),
                ));
                continue;
            }

            let Some((center, scale)) = scaling_parameters(method, &observed) else {
                continue;
            };
            let scaled: Vec<Option<f64>> = values
                .iter()
                .map(|v| v.map(|x| (x - center) / scale))
                .collect();

            state.push_column(
                Series::new(output.as_str().into(), scaled),
                SemanticType::Numeric,
            )?;
            info!("Scaled '{}' into '{}' ({})", name, output, method.name());
            state.report.add_action(CleaningAction::new(
                ActionType::ColumnScaled,
                &name,
                format!(
                    "Added {} ({} scaling, center {:.4}, scale {:.4})",
                    output,
                    method.name(),
                    center,
                    scale
                ),
            ));
        }
        Ok(state)
    }
}

/// `(center, scale)` so that `scaled = (x - center) / scale`. A zero spread
/// gives a scale of 1.
pub fn scaling_parameters(method: ScalingMethod, values: &[f64]) -> Option<(f64, f64)> {
    let (center, spread) = match method {
        ScalingMethod::Standard => {
            let mean = statistics::mean(values)?;
            let variance =
                values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
            (mean, variance.sqrt())
        }
        ScalingMethod::MinMax => {
            let summary = statistics::box_plot_summary(values)?;
            (summary.min, summary.max - summary.min)
        }
        ScalingMethod::Robust => {
            let summary = statistics::box_plot_summary(values)?;
            (summary.median, summary.q3 - summary.q1)
        }
    };
    let scale = if spread == 0.0 || !spread.is_finite() {
        1.0
    } else {
        spread
    };
    Some((center, scale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestConfig;
    use crate::ingest::ingest_bytes;
    use crate::pipeline::CoercionStage;

    fn scale(csv: &str, config: PipelineConfig) -> StageState {
        let raw = ingest_bytes(csv.as_bytes(), "t.csv", &IngestConfig::default()).unwrap();
        let state = CoercionStage
            .apply(StageState::from_raw(&raw), &config)
            .unwrap();
        ScalingStage.apply(state, &config).unwrap()
    }

    fn config(method: ScalingMethod) -> PipelineConfig {
        PipelineConfig::builder().scaling(method).build().unwrap()
    }

    fn observed(state: &StageState, name: &str) -> Vec<f64> {
        series_f64(state.series(name).unwrap())
            .unwrap()
            .into_iter()
            .flatten()
            .collect()
    }

    const AGES: &str = "age,gender\n20,Male\n30,Female\n40,Male\n50,Female\n90,Male\n";

    #[test]
    fn test_standard_scaling_centers_on_zero() {
        let state = scale(AGES, config(ScalingMethod::Standard));
        let scaled = observed(&state, "age_scaled");

        let n = scaled.len() as f64;
        let mean = scaled.iter().sum::<f64>() / n;
        let population_sd = (scaled.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        assert!(mean.abs() < 1e-9);
        assert!((population_sd - 1.0).abs() < 1e-9);

        // Source column is untouched
        assert_eq!(observed(&state, "age"), vec![20.0, 30.0, 40.0, 50.0, 90.0]);
        assert!(state.semantic_type("gender_scaled").is_none());
    }

    #[test]
    fn test_min_max_scaling_spans_unit_interval() {
        let state = scale(AGES, config(ScalingMethod::MinMax));
        let scaled = observed(&state, "age_minmax");
        assert_eq!(scaled.first().copied(), Some(0.0));
        assert_eq!(scaled.last().copied(), Some(1.0));
        assert!(scaled.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!((scaled[1] - 10.0 / 70.0).abs() < 1e-12);
    }

    #[test]
    fn test_robust_scaling_uses_median_and_iqr() {
        let state = scale(AGES, config(ScalingMethod::Robust));
        let scaled = observed(&state, "age_robust");

        // median 40, Q1 30, Q3 50
        assert_eq!(scaled, vec![-1.0, -0.5, 0.0, 0.5, 2.5]);
        let summary = statistics::box_plot_summary(&scaled).unwrap();
        assert_eq!(summary.median, 0.0);
        assert_eq!(summary.q3 - summary.q1, 1.0);
    }

    #[test]
    fn test_constant_column_keeps_unit_scale() {
        for method in [
            ScalingMethod::Standard,
            ScalingMethod::MinMax,
            ScalingMethod::Robust,
        ] {
            assert_eq!(scaling_parameters(method, &[7.0, 7.0, 7.0]), Some((7.0, 1.0)));
        }
        assert_eq!(scaling_parameters(ScalingMethod::Standard, &[]), None);
    }

    #[test]
    fn test_missing_values_stay_missing() {
        let state = scale("age\n10\nNA\n30\n", config(ScalingMethod::MinMax));
        let scaled = series_f64(state.series("age_minmax").unwrap()).unwrap();
        assert_eq!(scaled, vec![Some(0.0), None, Some(1.0)]);
    }

    #[test]
    fn test_unusable_columns_are_skipped() {
        let config = PipelineConfig::builder()
            .scaling(ScalingMethod::Standard)
            .scale_columns(["gender", "weight", "age"])
            .build()
            .unwrap();
        let state = scale("age,gender,age_scaled\n1,Male,2\n3,Female,4\n", config);

        assert_eq!(state.report.warnings.len(), 3);
        assert!(state.report.warnings[0].contains("expected numeric"));
        assert!(state.report.warnings[1].contains("column 'weight' not found"));
        assert!(state.report.warnings[2].contains("'age_scaled' already exists"));
        assert!(
            state
                .report
                .actions
                .iter()
                .all(|a| a.action_type != ActionType::ColumnScaled)
        );
    }
}
