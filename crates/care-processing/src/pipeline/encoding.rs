//! Categorical encoding: labels to stable `u32` codes.
//!
//! Requested columns also get one-hot indicator and frequency columns,
//! built from the labels before they are replaced. The source column keeps
//! its code mapping either way.

use polars::prelude::*;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::{PipelineStage, Stage, StageState};
use crate::config::PipelineConfig;
use crate::dataset::CategoryEncoding;
use crate::error::Result;
use crate::reporting::{ActionType, CleaningAction};
use crate::types::SemanticType;
use crate::utils::{series_strings, value_counts};

/// Replaces every categorical column with codes into its sorted label list.
///
/// Text columns are left as they are.
pub struct EncodingStage;

/// Requested extra encodings that cannot run: not a categorical column.
fn check_requested(state: &mut StageState, requested: &[String], kind: &str) {
    for name in requested {
        let reason = match state.semantic_type(name) {
            None => format!("column '{}' not found", name),
            Some(SemanticType::Categorical) => continue,
            Some(other) => format!(
                "column '{}' is {}, expected categorical",
                name,
                other.display_name().to_lowercase()
            ),
        };
        skip(state, name, kind, &reason);
    }
}

fn skip(state: &mut StageState, name: &str, kind: &str, reason: &str) {
    warn!("Skipped {} encoding of '{}': {}", kind, name, reason);
    state
        .report
        .add_warning(format!("{} encoding of '{}' skipped: {}", kind, name, reason));
    state.report.add_action(CleaningAction::new(
        ActionType::EncodingSkipped,
        name,
        format!("Skipped {} encoding: {}", kind, reason),
    ));
}

fn existing_output<'a>(state: &StageState, outputs: &'a [String]) -> Option<&'a String> {
    outputs.iter().find(|o| state.semantic_type(o).is_some())
}

/// One `<name>_<label>` 0/1 column per label, in label order. Missing rows
/// are 0 in every indicator.
fn one_hot(
    state: &mut StageState,
    name: &str,
    labels: &[Option<String>],
    encoding: &CategoryEncoding,
) -> Result<()> {
    let outputs: Vec<String> = encoding
        .labels()
        .iter()
        .map(|label| format!("{}_{}", name, label))
        .collect();
    if let Some(existing) = existing_output(state, &outputs) {
        let reason = format!("output column '{}' already exists", existing);
        skip(state, name, "one-hot", &reason);
        return Ok(());
    }

    for (output, label) in outputs.iter().zip(encoding.labels()) {
        let indicator: Vec<f64> = labels
            .iter()
            .map(|l| if l.as_deref() == Some(label.as_str()) { 1.0 } else { 0.0 })
            .collect();
        state.push_column(
            Series::new(output.as_str().into(), indicator),
            SemanticType::Numeric,
        )?;
    }
    state.report.add_action(CleaningAction::new(
        ActionType::OneHotEncoded,
        name,
        format!("Added {} indicator columns", outputs.len()),
    ));
    Ok(())
}

/// `<name>_frequency`: how many rows share each row's label.
fn frequency(state: &mut StageState, name: &str, labels: &[Option<String>]) -> Result<()> {
    let output = format!("{}_frequency", name);
    if let Some(existing) = existing_output(state, std::slice::from_ref(&output)) {
        let reason = format!("output column '{}' already exists", existing);
        skip(state, name, "frequency", &reason);
        return Ok(());
    }

    let counts: HashMap<String, usize> =
        value_counts(labels.iter().flatten().map(String::as_str)).into_iter().collect();
    let values: Vec<Option<f64>> = labels
        .iter()
        .map(|l| l.as_ref().and_then(|label| counts.get(label)).map(|n| *n as f64))
        .collect();
    state.push_column(Series::new(output.as_str().into(), values), SemanticType::Numeric)?;
    state.report.add_action(CleaningAction::new(
        ActionType::FrequencyEncoded,
        name,
        format!("Added {}", output),
    ));
    Ok(())
}

impl Stage for EncodingStage {
    fn stage(&self) -> PipelineStage {
        PipelineStage::Encoding
    }

    fn apply(&self, mut state: StageState, config: &PipelineConfig) -> Result<StageState> {
        check_requested(&mut state, &config.one_hot_columns, "one-hot");
        check_requested(&mut state, &config.frequency_columns, "frequency");

        for name in state.columns_of(SemanticType::Categorical) {
            let labels = series_strings(state.series(&name)?)?;
            let encoding =
                CategoryEncoding::from_values(&name, labels.iter().flatten().map(String::as_str));

            if config.one_hot_columns.contains(&name) {
                one_hot(&mut state, &name, &labels, &encoding)?;
            }
            if config.frequency_columns.contains(&name) {
                frequency(&mut state, &name, &labels)?;
            }
            let codes: Vec<Option<u32>> = labels
                .iter()
                .map(|l| l.as_deref().and_then(|label| encoding.encode(label)))
                .collect();

            state.replace(&name, Series::new(name.as_str().into(), codes))?;
            debug!("Column '{}': {} categories encoded", name, encoding.len());

            if let Some(entry) = state.report.column_mut(&name) {
                entry.encoding_size = Some(encoding.len());
            }
            state.report.add_action(CleaningAction::new(
                ActionType::CategoriesEncoded,
                &name,
                format!("Encoded {} categories as integer codes", encoding.len()),
            ));
            state.encodings.insert(name, encoding);
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestConfig;
    use crate::ingest::ingest_bytes;
    use crate::utils::{series_f64, series_u32};

    #[test]
    fn test_codes_follow_sorted_labels() {
        let raw = ingest_bytes(
            b"outcome,note\nreadmitted,a\nnot_readmitted,b\nreadmitted,c\n",
            "t.csv",
            &IngestConfig::default(),
        )
        .unwrap();
        let state = EncodingStage
            .apply(StageState::from_raw(&raw), &PipelineConfig::default())
            .unwrap();

        let codes = series_u32(state.series("outcome").unwrap()).unwrap();
        assert_eq!(codes, vec![Some(1), Some(0), Some(1)]);
        let encoding = &state.encodings["outcome"];
        assert_eq!(encoding.labels(), ["not_readmitted", "readmitted"]);
        assert_eq!(
            state.report.column("outcome").unwrap().encoding_size,
            Some(2)
        );
    }

    #[test]
    fn test_encoding_is_a_bijection() {
        let raw = ingest_bytes(
            b"blood_type\nA+\nO-\nB+\nA+\nAB-\nO-\n",
            "t.csv",
            &IngestConfig::default(),
        )
        .unwrap();
        let state = EncodingStage
            .apply(StageState::from_raw(&raw), &PipelineConfig::default())
            .unwrap();
        let encoding = &state.encodings["blood_type"];

        let originals = ["A+", "O-", "B+", "AB-"];
        let mut codes: Vec<u32> = originals
            .iter()
            .map(|l| encoding.encode(l).unwrap())
            .collect();
        for (label, code) in originals.iter().zip(&codes) {
            assert_eq!(encoding.decode(*code), Some(*label));
        }
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), originals.len());
    }

    fn encode(csv: &str, config: &PipelineConfig) -> StageState {
        let raw = ingest_bytes(csv.as_bytes(), "t.csv", &IngestConfig::default()).unwrap();
        EncodingStage.apply(StageState::from_raw(&raw), config).unwrap()
    }

    #[test]
    fn test_one_hot_columns_follow_labels() {
        let config = PipelineConfig::builder().one_hot("gender").build().unwrap();
        let state = encode("gender,age\nMale,30\nFemale,41\nNA,50\nMale,62\n", &config);

        let female = series_f64(state.series("gender_Female").unwrap()).unwrap();
        let male = series_f64(state.series("gender_Male").unwrap()).unwrap();
        assert_eq!(female, vec![Some(0.0), Some(1.0), Some(0.0), Some(0.0)]);
        assert_eq!(male, vec![Some(1.0), Some(0.0), Some(0.0), Some(1.0)]);
        assert_eq!(state.semantic_type("gender_Male"), Some(SemanticType::Numeric));

        // The source column is still coded through its own encoding
        let codes = series_u32(state.series("gender").unwrap()).unwrap();
        assert_eq!(codes, vec![Some(1), Some(0), None, Some(1)]);
        assert_eq!(state.encodings["gender"].labels(), ["Female", "Male"]);
        assert!(!state.encodings.contains_key("gender_Male"));
        assert!(
            state
                .report
                .actions
                .iter()
                .any(|a| a.action_type == ActionType::OneHotEncoded && a.target == "gender")
        );
    }

    #[test]
    fn test_frequency_column_counts_labels() {
        let config = PipelineConfig::builder()
            .frequency_encode("condition")
            .build()
            .unwrap();
        let state = encode("condition\nAsthma\nCancer\nAsthma\nNA\nAsthma\n", &config);

        let counts = series_f64(state.series("condition_frequency").unwrap()).unwrap();
        assert_eq!(
            counts,
            vec![Some(3.0), Some(1.0), Some(3.0), None, Some(3.0)]
        );
        assert_eq!(state.encodings["condition"].len(), 2);
    }

    #[test]
    fn test_unusable_requests_are_skipped_with_warnings() {
        let config = PipelineConfig::builder()
            .one_hot("age")
            .one_hot("missing")
            .frequency_encode("gender")
            .build()
            .unwrap();
        let state = encode("age,gender,gender_frequency\n30,Male,x\n", &config);

        assert!(state.semantic_type("age_30").is_none());
        assert_eq!(state.report.warnings.len(), 3);
        assert!(state.report.warnings[0].contains("expected categorical"));
        assert!(state.report.warnings[1].contains("column 'missing' not found"));
        assert!(state.report.warnings[2].contains("'gender_frequency' already exists"));
        assert_eq!(state.encodings["gender"].labels(), ["Male"]);
    }
}
