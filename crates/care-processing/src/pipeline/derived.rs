//! Derived features: pure functions of existing columns appended at the end.
//!
//! A derivation whose source column is missing or has the wrong type, or
//! whose output column already exists, is skipped and recorded. It never
//! aborts the run.

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use tracing::{info, warn};

use super::{PipelineStage, Stage, StageState};
use crate::config::{DerivationSources, DerivedFeature, PipelineConfig};
use crate::error::Result;
use crate::reporting::{ActionType, CleaningAction, DerivationOutcome};
use crate::types::SemanticType;
use crate::utils::{series_dates, series_f64};

/// Life-stage buckets as `(exclusive upper age, label)`.
const AGE_GROUPS: [(f64, &str); 4] = [
    (18.0, "Child"),
    (35.0, "Young Adult"),
    (55.0, "Middle Age"),
    (75.0, "Senior"),
];
const OLDEST_AGE_GROUP: &str = "Elderly";

/// Stay buckets as `(inclusive upper day count, label)`.
const STAY_BUCKETS: [(i64, &str); 3] = [(3, "0-3 days"), (7, "4-7 days"), (14, "8-14 days")];
const LONGEST_STAY_BUCKET: &str = "15+ days";

pub struct DerivedFeatureStage;

impl Stage for DerivedFeatureStage {
    fn stage(&self) -> PipelineStage {
        PipelineStage::DerivedFeatures
    }

    fn apply(&self, mut state: StageState, config: &PipelineConfig) -> Result<StageState> {
        for feature in &config.derived_features {
            let outcome = match derive(&mut state, *feature, &config.derivation_sources) {
                Ok(columns) => {
                    info!("Derived '{}': {}", feature.name(), columns.join(", "));
                    state.report.add_action(CleaningAction::new(
                        ActionType::FeatureDerived,
                        feature.name(),
                        format!("Added {}", columns.join(", ")),
                    ));
                    DerivationOutcome::applied(*feature, columns)
                }
                Err(Skip(reason)) => {
                    warn!("Skipped derivation '{}': {}", feature.name(), reason);
                    state.report.add_action(CleaningAction::new(
                        ActionType::DerivationSkipped,
                        feature.name(),
                        format!("Skipped: {}", reason),
                    ));
                    DerivationOutcome::skipped(*feature, reason)
                }
            };
            state.report.derivations.push(outcome);
        }
        Ok(state)
    }
}

/// Why a derivation did not run.
struct Skip(String);

impl From<crate::error::ProcessingError> for Skip {
    fn from(err: crate::error::ProcessingError) -> Self {
        Skip(err.to_string())
    }
}

impl From<PolarsError> for Skip {
    fn from(err: PolarsError) -> Self {
        Skip(err.to_string())
    }
}

fn derive(
    state: &mut StageState,
    feature: DerivedFeature,
    sources: &DerivationSources,
) -> std::result::Result<Vec<String>, Skip> {
    match feature {
        DerivedFeature::AgeGroup => {
            require_source(state, &sources.age, SemanticType::Numeric)?;
            require_free(state, &["age_group".to_string()])?;

            let ages = series_f64(state.series(&sources.age)?)?;
            let groups: Vec<Option<&str>> = ages.iter().map(|a| a.map(age_group)).collect();
            state.push_column(
                Series::new("age_group".into(), groups),
                SemanticType::Categorical,
            )?;
            Ok(vec!["age_group".to_string()])
        }
        DerivedFeature::LengthOfStay => {
            let stays = stay_lengths(state, sources)?;
            require_free(state, &["length_of_stay".to_string()])?;

            let negative = stays.iter().flatten().filter(|d| **d < 0).count();
            if negative > 0 {
                state.report.add_warning(format!(
                    "{} rows have a discharge date before the admission date",
                    negative
                ));
            }
            state.push_column(
                Series::new("length_of_stay".into(), stays),
                SemanticType::Numeric,
            )?;
            Ok(vec!["length_of_stay".to_string()])
        }
        DerivedFeature::LengthOfStayBucket => {
            let stays = stay_lengths(state, sources)?;
            require_free(state, &["length_of_stay_bucket".to_string()])?;

            let buckets: Vec<Option<&str>> = stays.iter().map(|d| d.and_then(stay_bucket)).collect();
            state.push_column(
                Series::new("length_of_stay_bucket".into(), buckets),
                SemanticType::Categorical,
            )?;
            Ok(vec!["length_of_stay_bucket".to_string()])
        }
        DerivedFeature::AdmissionDateParts => {
            let source = &sources.admission_date;
            require_source(state, source, SemanticType::Datetime)?;
            let outputs: Vec<String> = ["year", "month", "day", "weekday", "quarter"]
                .iter()
                .map(|part| format!("{}_{}", source, part))
                .collect();
            require_free(state, &outputs)?;

            let dates = series_dates(state.series(source)?)?;
            let parts: [fn(&NaiveDate) -> i32; 5] = [
                |d| d.year(),
                |d| d.month() as i32,
                |d| d.day() as i32,
                |d| d.weekday().num_days_from_monday() as i32,
                |d| d.month0() as i32 / 3 + 1,
            ];
            for (name, part) in outputs.iter().zip(parts) {
                let values: Vec<Option<i32>> = dates.iter().map(|d| d.as_ref().map(part)).collect();
                state.push_column(Series::new(name.as_str().into(), values), SemanticType::Numeric)?;
            }
            Ok(outputs)
        }
    }
}

fn require_source(
    state: &StageState,
    name: &str,
    expected: SemanticType,
) -> std::result::Result<(), Skip> {
    match state.semantic_type(name) {
        None => Err(Skip(format!("column '{}' not found", name))),
        Some(actual) if actual != expected => Err(Skip(format!(
            "column '{}' is {}, expected {}",
            name,
            actual.display_name().to_lowercase(),
            expected.display_name().to_lowercase()
        ))),
        Some(_) => Ok(()),
    }
}

fn require_free(state: &StageState, outputs: &[String]) -> std::result::Result<(), Skip> {
    match outputs.iter().find(|o| state.semantic_type(o).is_some()) {
        Some(existing) => Err(Skip(format!("output column '{}' already exists", existing))),
        None => Ok(()),
    }
}

/// Whole days from admission to discharge, per row.
fn stay_lengths(
    state: &StageState,
    sources: &DerivationSources,
) -> std::result::Result<Vec<Option<i64>>, Skip> {
    require_source(state, &sources.admission_date, SemanticType::Datetime)?;
    require_source(state, &sources.discharge_date, SemanticType::Datetime)?;

    let admitted = series_dates(state.series(&sources.admission_date)?)?;
    let discharged = series_dates(state.series(&sources.discharge_date)?)?;
    Ok(admitted
        .iter()
        .zip(&discharged)
        .map(|(a, d)| match (a, d) {
            (Some(a), Some(d)) => Some(d.signed_duration_since(*a).num_days()),
            _ => None,
        })
        .collect())
}

fn age_group(age: f64) -> &'static str {
    AGE_GROUPS
        .iter()
        .find(|(upper, _)| age < *upper)
        .map_or(OLDEST_AGE_GROUP, |(_, label)| label)
}

/// `None` for negative stays.
fn stay_bucket(days: i64) -> Option<&'static str> {
    if days < 0 {
        return None;
    }
    Some(
        STAY_BUCKETS
            .iter()
            .find(|(upper, _)| days <= *upper)
            .map_or(LONGEST_STAY_BUCKET, |(_, label)| label),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestConfig;
    use crate::ingest::ingest_bytes;
    use crate::pipeline::CoercionStage;
    use crate::reporting::DerivationStatus;
    use crate::utils::series_strings;

    fn run(csv: &str, features: &[DerivedFeature]) -> StageState {
        let config = PipelineConfig::builder()
            .derived_features(features.iter().copied())
            .build()
            .unwrap();
        let raw = ingest_bytes(csv.as_bytes(), "t.csv", &IngestConfig::default()).unwrap();
        let state = CoercionStage
            .apply(StageState::from_raw(&raw), &config)
            .unwrap();
        DerivedFeatureStage.apply(state, &config).unwrap()
    }

    #[test]
    fn test_age_group_boundaries() {
        assert_eq!(age_group(17.9), "Child");
        assert_eq!(age_group(18.0), "Young Adult");
        assert_eq!(age_group(54.0), "Middle Age");
        assert_eq!(age_group(74.0), "Senior");
        assert_eq!(age_group(75.0), "Elderly");
    }

    #[test]
    fn test_stay_bucket_boundaries() {
        assert_eq!(stay_bucket(0), Some("0-3 days"));
        assert_eq!(stay_bucket(4), Some("4-7 days"));
        assert_eq!(stay_bucket(14), Some("8-14 days"));
        assert_eq!(stay_bucket(30), Some("15+ days"));
        assert_eq!(stay_bucket(-1), None);
    }

    #[test]
    fn test_length_of_stay() {
        let state = run(
            "date_of_admission,discharge_date\n2024-01-01,2024-01-06\n2024-02-10,2024-02-10\n",
            &[DerivedFeature::LengthOfStay, DerivedFeature::LengthOfStayBucket],
        );
        let stays = series_f64(state.series("length_of_stay").unwrap()).unwrap();
        assert_eq!(stays, vec![Some(5.0), Some(0.0)]);
        let buckets = series_strings(state.series("length_of_stay_bucket").unwrap()).unwrap();
        assert_eq!(buckets[0].as_deref(), Some("4-7 days"));
        assert_eq!(state.semantic_type("length_of_stay"), Some(SemanticType::Numeric));
    }

    #[test]
    fn test_missing_source_is_skipped_others_still_run() {
        let state = run(
            "age,date_of_admission\n30,2024-03-15\n80,2024-07-01\n",
            &[
                DerivedFeature::AgeGroup,
                DerivedFeature::LengthOfStay,
                DerivedFeature::AdmissionDateParts,
            ],
        );

        let los = state.report.derivation(DerivedFeature::LengthOfStay).unwrap();
        assert_eq!(los.status, DerivationStatus::Skipped);
        assert_eq!(los.reason.as_deref(), Some("column 'discharge_date' not found"));
        assert!(state.semantic_type("length_of_stay").is_none());

        let groups = series_strings(state.series("age_group").unwrap()).unwrap();
        assert_eq!(groups[1].as_deref(), Some("Elderly"));

        let quarters = series_f64(state.series("date_of_admission_quarter").unwrap()).unwrap();
        assert_eq!(quarters, vec![Some(1.0), Some(3.0)]);
        let weekday = series_f64(state.series("date_of_admission_weekday").unwrap()).unwrap();
        // 2024-03-15 was a Friday
        assert_eq!(weekday[0], Some(4.0));
    }

    #[test]
    fn test_wrong_type_and_existing_output_are_skipped() {
        let state = run("age,age_group\nold,x\n", &[DerivedFeature::AgeGroup]);
        let outcome = state.report.derivation(DerivedFeature::AgeGroup).unwrap();
        assert_eq!(outcome.status, DerivationStatus::Skipped);
        assert!(outcome.reason.as_deref().unwrap().contains("expected numeric"));

        let state = run("age,age_group\n30,x\n", &[DerivedFeature::AgeGroup]);
        let outcome = state.report.derivation(DerivedFeature::AgeGroup).unwrap();
        assert_eq!(
            outcome.reason.as_deref(),
            Some("output column 'age_group' already exists")
        );
    }
}
