//! Missing-value handling: flag sparse columns, then drop or fill.
//!
//! Numeric and date columns follow `missing_value_strategy`; categorical and
//! text columns follow `categorical_fill`. A column missing more than
//! `missingness_drop_threshold` of its values (or every value) is flagged
//! and never imputed.

use polars::prelude::*;
use tracing::{debug, info, warn};

use super::{PipelineStage, Stage, StageState};
use crate::config::{CategoricalFill, MissingValueStrategy, PipelineConfig, UNKNOWN_LABEL};
use crate::error::Result;
use crate::profiler::statistics;
use crate::reporting::{ActionType, CleaningAction, DropRule};
use crate::types::SemanticType;
use crate::utils::{
    date_series, date_to_days, days_to_date, numeric_mode, series_dates, series_f64,
    series_strings, string_mode,
};

pub struct MissingValueStage;

impl Stage for MissingValueStage {
    fn stage(&self) -> PipelineStage {
        PipelineStage::MissingValues
    }

    fn apply(&self, mut state: StageState, config: &PipelineConfig) -> Result<StageState> {
        flag_sparse_columns(&mut state, config)?;
        if config.missing_value_strategy == MissingValueStrategy::Drop {
            drop_incomplete_rows(&mut state)?;
        }
        fill_missing(&mut state, config)?;
        Ok(state)
    }
}

fn flag_sparse_columns(state: &mut StageState, config: &PipelineConfig) -> Result<()> {
    let height = state.df.height();
    if height == 0 {
        return Ok(());
    }

    for column in state.schema.clone() {
        let missing = state.series(&column.name)?.null_count();
        let fraction = missing as f64 / height as f64;
        let reason = if missing == height {
            "no observed values".to_string()
        } else if fraction > config.missingness_drop_threshold {
            format!(
                "{:.1}% missing exceeds the {:.1}% threshold",
                fraction * 100.0,
                config.missingness_drop_threshold * 100.0
            )
        } else {
            continue;
        };

        warn!("Column '{}' flagged for removal: {}", column.name, reason);
        if let Some(entry) = state.report.column_mut(&column.name) {
            entry.flag(reason.clone(), config.drop_flagged_columns);
        }

        if config.drop_flagged_columns {
            state.remove_column(&column.name)?;
            state.report.add_action(CleaningAction::new(
                ActionType::ColumnRemoved,
                &column.name,
                format!("Removed column: {}", reason),
            ));
        } else {
            state.report.add_action(CleaningAction::new(
                ActionType::ColumnFlagged,
                &column.name,
                format!("Flagged column, kept without imputation: {}", reason),
            ));
        }
    }
    Ok(())
}

/// `drop` strategy: remove rows missing a value in any retained numeric or date column.
fn drop_incomplete_rows(state: &mut StageState) -> Result<()> {
    let mut targets = Vec::new();
    for column in &state.schema {
        let numeric_like = matches!(
            column.semantic_type,
            SemanticType::Numeric | SemanticType::Datetime
        );
        if numeric_like
            && !state.is_flagged(&column.name)
            && state.series(&column.name)?.null_count() > 0
        {
            targets.push(column.name.clone());
        }
    }
    if targets.is_empty() {
        return Ok(());
    }

    let mut keep = vec![true; state.df.height()];
    for name in &targets {
        let nulls = state.series(name)?.is_null();
        for (slot, is_null) in keep.iter_mut().zip(nulls.into_iter()) {
            if is_null.unwrap_or(false) {
                *slot = false;
            }
        }
    }

    let removed = state.retain_rows(&keep)?;
    info!(
        "Dropped {} rows with missing values in {} columns",
        removed,
        targets.len()
    );
    state.report.record_row_drop(DropRule::MissingValues, removed);
    state.report.add_action(CleaningAction::new(
        ActionType::RowsRemoved,
        "dataset",
        format!(
            "Dropped {} rows with missing values in: {}",
            removed,
            targets.join(", ")
        ),
    ));
    for name in &targets {
        if let Some(entry) = state.report.column_mut(name) {
            entry.imputation = Some("drop rows".to_string());
        }
    }
    Ok(())
}

fn fill_missing(state: &mut StageState, config: &PipelineConfig) -> Result<()> {
    for column in state.schema.clone() {
        let missing = state.series(&column.name)?.null_count();
        if missing == 0 || state.is_flagged(&column.name) {
            continue;
        }

        let series = state.series(&column.name)?;
        let filled = match column.semantic_type {
            SemanticType::Numeric => fill_numeric(series, config.missing_value_strategy)?,
            SemanticType::Datetime => fill_dates(series, config.missing_value_strategy)?,
            SemanticType::Categorical | SemanticType::Text => {
                fill_labels(series, config.categorical_fill)?
            }
        };
        let Some((series, description)) = filled else {
            continue;
        };

        state.replace(&column.name, series)?;
        debug!(
            "Column '{}': filled {} values with {}",
            column.name, missing, description
        );
        if let Some(entry) = state.report.column_mut(&column.name) {
            entry.imputation = Some(description.clone());
        }
        state.report.add_action(CleaningAction::new(
            ActionType::ValueImputed,
            &column.name,
            format!("Filled {} missing values with {}", missing, description),
        ));
    }
    Ok(())
}

fn fill_numeric(
    series: &Series,
    strategy: MissingValueStrategy,
) -> Result<Option<(Series, String)>> {
    let values = series_f64(series)?;
    let observed: Vec<f64> = values.iter().flatten().copied().collect();
    let fill = match strategy {
        MissingValueStrategy::Mean => statistics::mean(&observed),
        MissingValueStrategy::Median => statistics::median(&observed),
        MissingValueStrategy::Mode => numeric_mode(&observed),
        MissingValueStrategy::Drop => None,
    };
    let Some(fill) = fill else {
        return Ok(None);
    };

    let filled: Vec<f64> = values.into_iter().map(|v| v.unwrap_or(fill)).collect();
    Ok(Some((
        Series::new(series.name().clone(), filled),
        format!("{} ({})", strategy.name(), fill),
    )))
}

/// Dates use the median date for `mean` and `median`, and the most frequent date for `mode`.
fn fill_dates(
    series: &Series,
    strategy: MissingValueStrategy,
) -> Result<Option<(Series, String)>> {
    let values = series_dates(series)?;
    let mut days: Vec<i32> = values.iter().flatten().map(|d| date_to_days(*d)).collect();
    days.sort_unstable();

    let fill_day = match strategy {
        MissingValueStrategy::Mean | MissingValueStrategy::Median => {
            days.get(days.len().saturating_sub(1) / 2).copied()
        }
        MissingValueStrategy::Mode => {
            let as_f64: Vec<f64> = days.iter().map(|d| f64::from(*d)).collect();
            numeric_mode(&as_f64).map(|d| d as i32)
        }
        MissingValueStrategy::Drop => None,
    };
    let Some(fill) = fill_day.and_then(days_to_date) else {
        return Ok(None);
    };

    let label = match strategy {
        MissingValueStrategy::Mode => "mode",
        _ => "median date",
    };
    let filled: Vec<_> = values.into_iter().map(|v| Some(v.unwrap_or(fill))).collect();
    Ok(Some((
        date_series(series.name().as_str(), &filled)?,
        format!("{} ({})", label, fill.format("%Y-%m-%d")),
    )))
}

fn fill_labels(series: &Series, fill: CategoricalFill) -> Result<Option<(Series, String)>> {
    let values = series_strings(series)?;
    let (value, description) = match fill {
        CategoricalFill::Mode => {
            let Some(mode) = string_mode(values.iter().flatten().map(String::as_str)) else {
                return Ok(None);
            };
            let description = format!("mode ({})", mode);
            (mode, description)
        }
        CategoricalFill::Unknown => (
            UNKNOWN_LABEL.to_string(),
            format!("constant ({})", UNKNOWN_LABEL),
        ),
    };

    let filled: Vec<String> = values
        .into_iter()
        .map(|v| v.unwrap_or_else(|| value.clone()))
        .collect();
    Ok(Some((Series::new(series.name().clone(), filled), description)))
}
