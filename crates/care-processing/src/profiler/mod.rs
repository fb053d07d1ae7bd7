//! Column profiling for the session's profile cache and the overview pages.

pub mod statistics;

use rand::prelude::*;
use std::collections::HashSet;
use tracing::debug;

use crate::error::Result;
use crate::types::{CategoryCount, ColumnProfile, DateRange, NumericSummary, SemanticType};
use crate::utils::value_counts;
use crate::view::DatasetView;

/// Number of most frequent values kept per categorical column.
pub const TOP_VALUES: usize = 10;

/// Number of example values kept per column.
pub const SAMPLE_SIZE: usize = 5;

const SAMPLE_SEED: u64 = 42;

/// Computes [`ColumnProfile`]s from either session dataset.
pub struct DataProfiler;

impl DataProfiler {
    /// Profile every column, in column order.
    pub fn profile_dataset(view: &DatasetView<'_>) -> Result<Vec<ColumnProfile>> {
        let profiles = view
            .schema()
            .iter()
            .map(|c| Self::profile_column(view, &c.name, c.semantic_type))
            .collect::<Result<Vec<_>>>()?;
        debug!("Profiled {} columns of the {} dataset", profiles.len(), view.key());
        Ok(profiles)
    }

    pub fn profile_column(
        view: &DatasetView<'_>,
        name: &str,
        semantic_type: SemanticType,
    ) -> Result<ColumnProfile> {
        let height = view.height();
        let missing_count = view.null_count(name)?;
        let missing_percentage = if height > 0 {
            missing_count as f64 / height as f64 * 100.0
        } else {
            0.0
        };

        let labels = view.labels(name)?;
        let observed: Vec<&str> = labels.iter().flatten().map(String::as_str).collect();

        let mut profile = ColumnProfile {
            name: name.to_string(),
            semantic_type,
            missing_count,
            missing_percentage,
            distinct_count: observed.iter().collect::<HashSet<_>>().len(),
            numeric: None,
            date_range: None,
            top_values: Vec::new(),
            sample_values: sample_values(&observed),
        };

        match semantic_type {
            SemanticType::Numeric => {
                let numbers: Vec<f64> = view.numbers(name)?.into_iter().flatten().collect();
                profile.distinct_count = numbers
                    .iter()
                    .map(|v| v.to_bits())
                    .collect::<HashSet<_>>()
                    .len();
                profile.numeric = numeric_summary(&numbers);
            }
            SemanticType::Datetime => {
                let dates: Vec<_> = view.dates(name)?.into_iter().flatten().collect();
                profile.date_range = match (dates.iter().min(), dates.iter().max()) {
                    (Some(min), Some(max)) => Some(DateRange {
                        min: min.format("%Y-%m-%d").to_string(),
                        max: max.format("%Y-%m-%d").to_string(),
                    }),
                    _ => None,
                };
            }
            SemanticType::Categorical | SemanticType::Text => {
                let total = observed.len() as f64;
                profile.top_values = value_counts(observed.iter().copied())
                    .into_iter()
                    .take(TOP_VALUES)
                    .map(|(value, count)| CategoryCount {
                        value,
                        count,
                        percentage: count as f64 / total * 100.0,
                    })
                    .collect();
            }
        }

        Ok(profile)
    }
}

fn numeric_summary(values: &[f64]) -> Option<NumericSummary> {
    let summary = statistics::box_plot_summary(values)?;
    Some(NumericSummary {
        count: values.len(),
        min: summary.min,
        q1: summary.q1,
        median: summary.median,
        q3: summary.q3,
        max: summary.max,
        mean: statistics::mean(values)?,
        std: statistics::std_dev(values)?,
    })
}

/// Seeded sample so repeated profiling of the same data agrees.
fn sample_values(observed: &[&str]) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);
    observed
        .choose_multiple(&mut rng, SAMPLE_SIZE.min(observed.len()))
        .map(|v| v.to_string())
        .collect()
}
