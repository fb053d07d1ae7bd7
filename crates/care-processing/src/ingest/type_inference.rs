//! Deterministic semantic type inference for uploaded columns.
//!
//! Every non-missing value has to agree for a column to be numeric or a
//! date; sampling is never used, so the same column always gets the same
//! type.

use std::collections::HashSet;

use crate::types::SemanticType;
use crate::utils::{parse_date_string, parse_numeric_string};

/// Columns whose distinct-value share exceeds this may be free text.
const TEXT_UNIQUE_RATIO: f64 = 0.7;

/// Minimum average length, in characters, for free text.
const TEXT_MIN_AVG_LEN: f64 = 30.0;

/// Infer the semantic type of a column from its non-missing values.
///
/// Precedence: numeric, then datetime, then text (long and mostly unique),
/// otherwise categorical. An all-missing column is categorical.
pub fn infer_semantic_type<'a>(values: impl IntoIterator<Item = Option<&'a str>>) -> SemanticType {
    let observed: Vec<&str> = values.into_iter().flatten().collect();
    if observed.is_empty() {
        return SemanticType::Categorical;
    }

    if observed.iter().all(|v| parse_numeric_string(v).is_some()) {
        return SemanticType::Numeric;
    }

    if observed.iter().all(|v| parse_date_string(v).is_some()) {
        return SemanticType::Datetime;
    }

    if looks_like_free_text(&observed) {
        SemanticType::Text
    } else {
        SemanticType::Categorical
    }
}

fn looks_like_free_text(observed: &[&str]) -> bool {
    let unique: HashSet<&str> = observed.iter().copied().collect();
    let unique_ratio = unique.len() as f64 / observed.len() as f64;
    let avg_len =
        observed.iter().map(|v| v.chars().count()).sum::<usize>() as f64 / observed.len() as f64;
    unique_ratio > TEXT_UNIQUE_RATIO && avg_len > TEXT_MIN_AVG_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infer(values: &[Option<&str>]) -> SemanticType {
        infer_semantic_type(values.iter().copied())
    }

    #[test]
    fn test_numeric_wins_over_everything() {
        assert_eq!(
            infer(&[Some("25"), None, Some("40.5")]),
            SemanticType::Numeric
        );
        assert_eq!(
            infer(&[Some("$1,200.50"), Some("300")]),
            SemanticType::Numeric
        );
        // Bare years are numbers, not dates.
        assert_eq!(infer(&[Some("2020"), Some("2021")]), SemanticType::Numeric);
    }

    #[test]
    fn test_datetime_before_categorical() {
        assert_eq!(
            infer(&[Some("2024-01-05"), Some("2024-02-10"), None]),
            SemanticType::Datetime
        );
        assert_eq!(
            infer(&[Some("01/05/2024"), Some("2024-02-10 10:00:00")]),
            SemanticType::Datetime
        );
    }

    #[test]
    fn test_one_bad_value_demotes_column() {
        assert_eq!(
            infer(&[Some("25"), Some("forty")]),
            SemanticType::Categorical
        );
        assert_eq!(
            infer(&[Some("2024-01-05"), Some("soon")]),
            SemanticType::Categorical
        );
    }

    #[test]
    fn test_text_requires_long_unique_values() {
        let notes = [
            Some("Patient reported mild chest pain after exercise"),
            Some("Follow-up scheduled for blood pressure monitoring"),
            Some("No complications observed during the overnight stay"),
        ];
        assert_eq!(infer(&notes), SemanticType::Text);

        let repeated = [
            Some("Patient reported mild chest pain after exercise"),
            Some("Patient reported mild chest pain after exercise"),
            Some("Patient reported mild chest pain after exercise"),
        ];
        assert_eq!(infer(&repeated), SemanticType::Categorical);

        assert_eq!(
            infer(&[Some("Male"), Some("Female"), Some("Other")]),
            SemanticType::Categorical
        );
    }

    #[test]
    fn test_all_missing_is_categorical() {
        assert_eq!(infer(&[None, None]), SemanticType::Categorical);
        assert_eq!(infer(&[]), SemanticType::Categorical);
    }
}
