//! Core data types shared across ingestion, the session store and the pages.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Column Types
// =============================================================================

/// Semantic type of a column, inferred once at upload time.
///
/// Inference precedence is `Numeric`, then `Datetime`, then `Categorical`,
/// with `Text` reserved for long, mostly-unique strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Numeric,
    Datetime,
    Categorical,
    Text,
}

impl SemanticType {
    /// Returns a human-readable name for the type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Numeric => "Numeric",
            Self::Datetime => "Date",
            Self::Categorical => "Categorical",
            Self::Text => "Text",
        }
    }

    /// Whether the pipeline replaces this column with integer codes.
    pub fn is_encoded(&self) -> bool {
        matches!(self, Self::Categorical)
    }

    /// Whether missing values are filled with the categorical fill rule.
    pub fn is_label_like(&self) -> bool {
        matches!(self, Self::Categorical | Self::Text)
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Name and semantic type of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub semantic_type: SemanticType,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            semantic_type,
        }
    }
}

/// Look up the semantic type of `name` in an ordered schema.
pub fn schema_type(schema: &[ColumnSchema], name: &str) -> Option<SemanticType> {
    schema
        .iter()
        .find(|c| c.name == name)
        .map(|c| c.semantic_type)
}

// =============================================================================
// Session Keys
// =============================================================================

/// The well-known keys of the session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKey {
    /// The dataset as uploaded.
    Raw,
    /// The output of the preprocessing pipeline.
    Cleaned,
}

impl DatasetKey {
    pub const ALL: [DatasetKey; 2] = [DatasetKey::Raw, DatasetKey::Cleaned];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Cleaned => "cleaned",
        }
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an uploaded dataset came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Display name (usually the file name).
    pub name: String,
    /// Size of the uploaded bytes.
    pub size_bytes: usize,
}

// =============================================================================
// Profiling Types
// =============================================================================

/// Per-column summary computed on demand and cached by the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub semantic_type: SemanticType,
    pub missing_count: usize,
    pub missing_percentage: f64,
    pub distinct_count: usize,
    /// Present for numeric columns with at least one value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericSummary>,
    /// Present for date columns with at least one value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    /// Most frequent values, for categorical and text columns.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub top_values: Vec<CategoryCount>,
    /// A few example values, seeded so repeated profiling agrees.
    pub sample_values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    /// Non-missing values.
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub mean: f64,
    /// Sample standard deviation.
    pub std: f64,
}

/// Earliest and latest date, ISO formatted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub min: String,
    pub max: String,
}

/// One value with its frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub value: String,
    pub count: usize,
    pub percentage: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_key_display() {
        assert_eq!(DatasetKey::Raw.to_string(), "raw");
        assert_eq!(DatasetKey::Cleaned.to_string(), "cleaned");
        let json = serde_json::to_string(&DatasetKey::Cleaned).unwrap();
        assert_eq!(json, "\"cleaned\"");
    }

    #[test]
    fn test_schema_lookup() {
        let schema = vec![
            ColumnSchema::new("age", SemanticType::Numeric),
            ColumnSchema::new("gender", SemanticType::Categorical),
        ];
        assert_eq!(schema_type(&schema, "age"), Some(SemanticType::Numeric));
        assert_eq!(schema_type(&schema, "missing"), None);
        assert!(SemanticType::Categorical.is_encoded());
        assert!(!SemanticType::Text.is_encoded());
        assert!(SemanticType::Text.is_label_like());
    }
}
