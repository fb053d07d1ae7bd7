//! Type coercion: text cells to each column's semantic type.

use polars::prelude::*;
use tracing::{debug, warn};

use super::{PipelineStage, Stage, StageState};
use crate::config::PipelineConfig;
use crate::error::{Result, ResultExt};
use crate::reporting::{ActionType, CleaningAction};
use crate::types::SemanticType;
use crate::utils::{date_series, parse_date_string, parse_numeric_string};

/// Converts numeric columns to `f64` and date columns to polars `Date`.
///
/// Cells that fail conversion become missing and are counted per column.
/// `missing_before` is measured after this stage.
pub struct CoercionStage;

impl Stage for CoercionStage {
    fn stage(&self) -> PipelineStage {
        PipelineStage::Coercion
    }

    fn apply(&self, mut state: StageState, _config: &PipelineConfig) -> Result<StageState> {
        for column in state.schema.clone() {
            let series = state.series(&column.name)?;
            let texts: Vec<Option<&str>> = series
                .str()
                .context(format!("column '{}' is not text", column.name))?
                .into_iter()
                .collect();
            let present = texts.iter().flatten().count();

            let (converted, failures) = match column.semantic_type {
                SemanticType::Numeric => {
                    let values: Vec<Option<f64>> = texts
                        .iter()
                        .map(|v| v.and_then(parse_numeric_string))
                        .collect();
                    let failures = present - values.iter().flatten().count();
                    (Some(Series::new(column.name.as_str().into(), values)), failures)
                }
                SemanticType::Datetime => {
                    let values: Vec<_> = texts
                        .iter()
                        .map(|v| v.and_then(parse_date_string))
                        .collect();
                    let failures = present - values.iter().flatten().count();
                    (Some(date_series(&column.name, &values)?), failures)
                }
                SemanticType::Categorical | SemanticType::Text => (None, 0),
            };

            if let Some(series) = converted {
                state.replace(&column.name, series)?;
            }
            let missing = state.series(&column.name)?.null_count();

            if let Some(entry) = state.report.column_mut(&column.name) {
                entry.missing_before = missing;
                entry.missing_after = missing;
                entry.coercion_failures = failures;
            }

            if failures > 0 {
                warn!(
                    "Column '{}': {} values could not be read as {}",
                    column.name, failures, column.semantic_type
                );
                state.report.add_action(CleaningAction::new(
                    ActionType::ValuesCoerced,
                    &column.name,
                    format!(
                        "{} values could not be read as {} and were set to missing",
                        failures, column.semantic_type
                    ),
                ));
            }
            debug!(
                "Column '{}' coerced to {} ({} missing)",
                column.name, column.semantic_type, missing
            );
        }

        Ok(state)
    }
}
