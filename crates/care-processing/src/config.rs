//! Configuration for ingestion, the cleaning pipeline and the dashboard pages.
//!
//! Pipeline options use the builder pattern; everything derives serde so a
//! whole [`DashboardConfig`] can be loaded from one JSON file where every
//! field is optional.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{ProcessingError, Result};
use crate::utils::DEFAULT_MISSING_MARKERS;

/// Sentinel used by [`CategoricalFill::Unknown`].
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Strategy for missing numeric (and date) values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingValueStrategy {
    /// Use the mean of non-null values (dates use the median date)
    Mean,
    /// Use the median of non-null values
    #[default]
    Median,
    /// Use the most frequent value, smallest on ties
    Mode,
    /// Drop rows with a missing value in a retained numeric or date column;
    /// categorical columns still use their fill rule
    Drop,
}

impl MissingValueStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Mode => "mode",
            Self::Drop => "drop",
        }
    }
}

/// Fill rule for missing categorical and text values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalFill {
    /// Use the most frequent value, lexicographically smallest on ties
    #[default]
    Mode,
    /// Use the constant "Unknown"
    Unknown,
}

/// Strategy for numeric values outside the 1.5 IQR fences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutlierStrategy {
    /// Leave values as they are
    #[default]
    Keep,
    /// Clamp values to the fences
    Cap,
    /// Drop rows holding an outlier
    Remove,
}

/// Rescaling applied to numeric columns; results land in new columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingMethod {
    /// `(x - mean) / std`, population standard deviation
    Standard,
    /// `(x - min) / (max - min)`
    MinMax,
    /// `(x - median) / IQR`
    Robust,
}

impl ScalingMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::MinMax => "min_max",
            Self::Robust => "robust",
        }
    }

    /// Suffix of the output column, `<column>_<suffix>`.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Standard => "scaled",
            Self::MinMax => "minmax",
            Self::Robust => "robust",
        }
    }
}

/// Named, pure feature derivations appended by the last pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedFeature {
    /// Life-stage bucket of the age column
    AgeGroup,
    /// Whole days between admission and discharge
    LengthOfStay,
    /// Bucketed length of stay
    LengthOfStayBucket,
    /// Year, month, day, weekday and quarter of the admission date
    AdmissionDateParts,
}

impl DerivedFeature {
    pub const ALL: [DerivedFeature; 4] = [
        DerivedFeature::AgeGroup,
        DerivedFeature::LengthOfStay,
        DerivedFeature::LengthOfStayBucket,
        DerivedFeature::AdmissionDateParts,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::AgeGroup => "age_group",
            Self::LengthOfStay => "length_of_stay",
            Self::LengthOfStayBucket => "length_of_stay_bucket",
            Self::AdmissionDateParts => "admission_date_parts",
        }
    }
}

/// Column names the derivations read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DerivationSources {
    pub age: String,
    pub admission_date: String,
    pub discharge_date: String,
}

impl Default for DerivationSources {
    fn default() -> Self {
        Self {
            age: "age".to_string(),
            admission_date: "date_of_admission".to_string(),
            discharge_date: "discharge_date".to_string(),
        }
    }
}

/// Configuration for the preprocessing pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use care_processing::config::{DerivedFeature, MissingValueStrategy, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .missing_value_strategy(MissingValueStrategy::Mean)
///     .missingness_drop_threshold(0.4)
///     .derive(DerivedFeature::AgeGroup)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Fill rule for numeric and date columns (default: median)
    pub missing_value_strategy: MissingValueStrategy,

    /// Fill rule for categorical and text columns (default: mode)
    pub categorical_fill: CategoricalFill,

    /// Columns missing more than this fraction are flagged for removal
    /// instead of imputed (default: 0.5)
    pub missingness_drop_threshold: f64,

    /// Whether flagged columns are removed from the cleaned dataset
    /// (default: true). When false they are kept un-imputed.
    pub drop_flagged_columns: bool,

    /// Derivations to run after encoding (default: none)
    pub derived_features: BTreeSet<DerivedFeature>,

    /// Source column names for the derivations
    pub derivation_sources: DerivationSources,

    /// Outlier handling for numeric columns (default: keep)
    pub outlier_strategy: OutlierStrategy,

    /// Drop exact duplicate rows, keeping the first (default: false)
    pub remove_duplicates: bool,

    /// Categorical columns that also get one 0/1 column per label,
    /// `<column>_<label>` (default: none)
    pub one_hot_columns: Vec<String>,

    /// Categorical columns that also get `<column>_frequency`, the count of
    /// each row's label (default: none)
    pub frequency_columns: Vec<String>,

    /// Rescaling of numeric columns into `<column>_<suffix>` (default: off)
    pub scaling: Option<ScalingMethod>,

    /// Columns to scale; empty means every numeric column of the upload
    pub scaled_columns: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            missing_value_strategy: MissingValueStrategy::default(),
            categorical_fill: CategoricalFill::default(),
            missingness_drop_threshold: 0.5,
            drop_flagged_columns: true,
            derived_features: BTreeSet::new(),
            derivation_sources: DerivationSources::default(),
            outlier_strategy: OutlierStrategy::default(),
            remove_duplicates: false,
            one_hot_columns: Vec::new(),
            frequency_columns: Vec::new(),
            scaling: None,
            scaled_columns: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for PipelineConfig.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        if !(0.0..=1.0).contains(&self.missingness_drop_threshold) {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "missingness_drop_threshold".to_string(),
                value: self.missingness_drop_threshold,
            });
        }

        let sources = &self.derivation_sources;
        for (field, value) in [
            ("derivation_sources.age", &sources.age),
            ("derivation_sources.admission_date", &sources.admission_date),
            ("derivation_sources.discharge_date", &sources.discharge_date),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigValidationError::EmptyColumnName(field.to_string()));
            }
        }

        for (field, columns) in [
            ("one_hot_columns", &self.one_hot_columns),
            ("frequency_columns", &self.frequency_columns),
            ("scaled_columns", &self.scaled_columns),
        ] {
            if columns.iter().any(|c| c.trim().is_empty()) {
                return Err(ConfigValidationError::EmptyColumnName(field.to_string()));
            }
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid limit for '{field}': {value} (must be at least 1)")]
    InvalidLimit { field: String, value: usize },

    #[error("Invalid delimiter {0:?} (must be a single ASCII character other than a quote or newline)")]
    InvalidDelimiter(char),

    #[error("Column name for '{0}' must not be empty")]
    EmptyColumnName(String),
}

impl From<ConfigValidationError> for ProcessingError {
    fn from(err: ConfigValidationError) -> Self {
        ProcessingError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    missing_value_strategy: Option<MissingValueStrategy>,
    categorical_fill: Option<CategoricalFill>,
    missingness_drop_threshold: Option<f64>,
    drop_flagged_columns: Option<bool>,
    derived_features: BTreeSet<DerivedFeature>,
    derivation_sources: Option<DerivationSources>,
    outlier_strategy: Option<OutlierStrategy>,
    remove_duplicates: Option<bool>,
    one_hot_columns: Vec<String>,
    frequency_columns: Vec<String>,
    scaling: Option<ScalingMethod>,
    scaled_columns: Vec<String>,
}

impl PipelineConfigBuilder {
    /// Set the fill rule for numeric and date columns.
    pub fn missing_value_strategy(mut self, strategy: MissingValueStrategy) -> Self {
        self.missing_value_strategy = Some(strategy);
        self
    }

    /// Set the fill rule for categorical and text columns.
    pub fn categorical_fill(mut self, fill: CategoricalFill) -> Self {
        self.categorical_fill = Some(fill);
        self
    }

    /// Set the missingness fraction above which a column is flagged.
    ///
    /// # Arguments
    /// * `threshold` - Value between 0.0 and 1.0 (e.g., 0.5 = 50%)
    pub fn missingness_drop_threshold(mut self, threshold: f64) -> Self {
        self.missingness_drop_threshold = Some(threshold);
        self
    }

    /// Keep or remove flagged columns.
    pub fn drop_flagged_columns(mut self, drop: bool) -> Self {
        self.drop_flagged_columns = Some(drop);
        self
    }

    /// Enable one derivation.
    pub fn derive(mut self, feature: DerivedFeature) -> Self {
        self.derived_features.insert(feature);
        self
    }

    /// Enable several derivations at once.
    pub fn derived_features(mut self, features: impl IntoIterator<Item = DerivedFeature>) -> Self {
        self.derived_features.extend(features);
        self
    }

    /// Override the column names the derivations read.
    pub fn derivation_sources(mut self, sources: DerivationSources) -> Self {
        self.derivation_sources = Some(sources);
        self
    }

    /// Set the strategy for handling outliers.
    pub fn outlier_strategy(mut self, strategy: OutlierStrategy) -> Self {
        self.outlier_strategy = Some(strategy);
        self
    }

    /// Enable or disable duplicate row removal.
    pub fn remove_duplicates(mut self, remove: bool) -> Self {
        self.remove_duplicates = Some(remove);
        self
    }

    /// Add `<column>_<label>` indicator columns for a categorical column.
    pub fn one_hot(mut self, column: impl Into<String>) -> Self {
        self.one_hot_columns.push(column.into());
        self
    }

    /// Add a `<column>_frequency` column for a categorical column.
    pub fn frequency_encode(mut self, column: impl Into<String>) -> Self {
        self.frequency_columns.push(column.into());
        self
    }

    /// Scale numeric columns with `method`.
    pub fn scaling(mut self, method: ScalingMethod) -> Self {
        self.scaling = Some(method);
        self
    }

    /// Restrict scaling to these columns.
    pub fn scale_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.scaled_columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> std::result::Result<PipelineConfig, ConfigValidationError> {
        let defaults = PipelineConfig::default();
        let config = PipelineConfig {
            missing_value_strategy: self.missing_value_strategy.unwrap_or_default(),
            categorical_fill: self.categorical_fill.unwrap_or_default(),
            missingness_drop_threshold: self
                .missingness_drop_threshold
                .unwrap_or(defaults.missingness_drop_threshold),
            drop_flagged_columns: self
                .drop_flagged_columns
                .unwrap_or(defaults.drop_flagged_columns),
            derived_features: self.derived_features,
            derivation_sources: self.derivation_sources.unwrap_or_default(),
            outlier_strategy: self.outlier_strategy.unwrap_or_default(),
            remove_duplicates: self.remove_duplicates.unwrap_or(defaults.remove_duplicates),
            one_hot_columns: self.one_hot_columns,
            frequency_columns: self.frequency_columns,
            scaling: self.scaling,
            scaled_columns: self.scaled_columns,
        };

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Ingestion
// =============================================================================

/// Upload parsing options and resource ceilings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Field delimiter (default: ',')
    pub delimiter: char,
    /// Lower-case headers and replace spaces and hyphens with '_' (default: true)
    pub normalize_headers: bool,
    /// Maximum data rows accepted (default: 1,000,000)
    pub max_rows: usize,
    /// Maximum columns accepted (default: 1,000)
    pub max_columns: usize,
    /// Cell values read as missing
    pub missing_markers: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            normalize_headers: true,
            max_rows: 1_000_000,
            max_columns: 1_000,
            missing_markers: DEFAULT_MISSING_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl IngestConfig {
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_normalize_headers(mut self, normalize: bool) -> Self {
        self.normalize_headers = normalize;
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn with_max_columns(mut self, max_columns: usize) -> Self {
        self.max_columns = max_columns;
        self
    }

    /// The delimiter as the byte the CSV reader expects.
    pub fn delimiter_byte(&self) -> std::result::Result<u8, ConfigValidationError> {
        match self.delimiter {
            '"' | '\n' | '\r' => Err(ConfigValidationError::InvalidDelimiter(self.delimiter)),
            c if c.is_ascii() => Ok(c as u8),
            c => Err(ConfigValidationError::InvalidDelimiter(c)),
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        self.delimiter_byte()?;
        for (field, value) in [("max_rows", self.max_rows), ("max_columns", self.max_columns)] {
            if value == 0 {
                return Err(ConfigValidationError::InvalidLimit {
                    field: field.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }
}

// =============================================================================
// Page Column Roles
// =============================================================================

/// Which columns the dashboard pages read for each domain role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnRoles {
    pub age: String,
    pub gender: String,
    pub blood_type: String,
    pub medical_condition: String,
    pub billing_amount: String,
    pub insurance_provider: String,
    pub admission_date: String,
    pub target: String,
    /// Target value counted as the adverse outcome in headline metrics
    pub positive_label: String,
}

impl Default for ColumnRoles {
    fn default() -> Self {
        Self {
            age: "age".to_string(),
            gender: "gender".to_string(),
            blood_type: "blood_type".to_string(),
            medical_condition: "medical_condition".to_string(),
            billing_amount: "billing_amount".to_string(),
            insurance_provider: "insurance_provider".to_string(),
            admission_date: "date_of_admission".to_string(),
            target: "test_results".to_string(),
            positive_label: "Abnormal".to_string(),
        }
    }
}

// =============================================================================
// Whole-dashboard configuration
// =============================================================================

/// Every option of one dashboard session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub ingest: IngestConfig,
    pub pipeline: PipelineConfig,
    pub roles: ColumnRoles,
}

impl DashboardConfig {
    /// Load and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ProcessingError::Io(e).with_context(path.display().to_string()))?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: DashboardConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        self.ingest.validate()?;
        self.pipeline.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.missing_value_strategy, MissingValueStrategy::Median);
        assert_eq!(config.categorical_fill, CategoricalFill::Mode);
        assert_eq!(config.missingness_drop_threshold, 0.5);
        assert!(config.drop_flagged_columns);
        assert!(config.derived_features.is_empty());
        assert_eq!(config.outlier_strategy, OutlierStrategy::Keep);
        assert!(!config.remove_duplicates);
        assert!(config.scaling.is_none());
        assert!(config.one_hot_columns.is_empty());
    }

    #[test]
    fn test_encoding_and_scaling_options() {
        let config = PipelineConfig::builder()
            .one_hot("gender")
            .frequency_encode("medical_condition")
            .scaling(ScalingMethod::Robust)
            .scale_columns(["age", "billing_amount"])
            .build()
            .unwrap();
        assert_eq!(config.one_hot_columns, vec!["gender"]);
        assert_eq!(config.frequency_columns, vec!["medical_condition"]);
        assert_eq!(config.scaling, Some(ScalingMethod::Robust));
        assert_eq!(config.scaled_columns, vec!["age", "billing_amount"]);

        let json = r#"{ "pipeline": { "scaling": "min_max" } }"#;
        let config = DashboardConfig::from_json_str(json).unwrap();
        assert_eq!(config.pipeline.scaling, Some(ScalingMethod::MinMax));
        assert_eq!(ScalingMethod::MinMax.suffix(), "minmax");

        let result = PipelineConfig::builder().one_hot(" ").build();
        assert!(matches!(
            result,
            Err(ConfigValidationError::EmptyColumnName(field)) if field == "one_hot_columns"
        ));
    }

    #[test]
    fn test_builder() {
        let config = PipelineConfig::builder()
            .missing_value_strategy(MissingValueStrategy::Mean)
            .missingness_drop_threshold(0.3)
            .derive(DerivedFeature::LengthOfStay)
            .derive(DerivedFeature::AgeGroup)
            .remove_duplicates(true)
            .build()
            .unwrap();

        assert_eq!(config.missing_value_strategy, MissingValueStrategy::Mean);
        assert_eq!(config.missingness_drop_threshold, 0.3);
        assert!(config.remove_duplicates);
        let names: Vec<_> = config.derived_features.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["age_group", "length_of_stay"]);
    }

    #[test]
    fn test_invalid_threshold() {
        let result = PipelineConfig::builder()
            .missingness_drop_threshold(1.5)
            .build();
        assert!(matches!(
            result,
            Err(ConfigValidationError::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn test_threshold_bounds_are_inclusive() {
        assert!(PipelineConfig::builder().missingness_drop_threshold(0.0).build().is_ok());
        assert!(PipelineConfig::builder().missingness_drop_threshold(1.0).build().is_ok());
    }

    #[test]
    fn test_ingest_config_validation() {
        assert!(IngestConfig::default().validate().is_ok());
        assert_eq!(IngestConfig::default().delimiter_byte().unwrap(), b',');
        assert!(IngestConfig::default().with_delimiter(';').validate().is_ok());
        assert!(IngestConfig::default().with_delimiter('"').validate().is_err());
        assert!(IngestConfig::default().with_delimiter('é').validate().is_err());
        assert!(IngestConfig::default().with_max_rows(0).validate().is_err());
    }

    #[test]
    fn test_dashboard_config_from_json() {
        let json = r#"{
            "pipeline": {
                "missing_value_strategy": "mean",
                "missingness_drop_threshold": 0.25,
                "derived_features": ["length_of_stay", "age_group"]
            },
            "roles": { "target": "outcome", "positive_label": "readmitted" }
        }"#;

        let config = DashboardConfig::from_json_str(json).unwrap();
        assert_eq!(
            config.pipeline.missing_value_strategy,
            MissingValueStrategy::Mean
        );
        assert_eq!(config.pipeline.derived_features.len(), 2);
        assert_eq!(config.roles.target, "outcome");
        assert_eq!(config.roles.age, "age");
        assert_eq!(config.ingest.max_rows, 1_000_000);
    }

    #[test]
    fn test_dashboard_config_rejects_invalid_values() {
        let json = r#"{ "pipeline": { "missingness_drop_threshold": -0.1 } }"#;
        let err = DashboardConfig::from_json_str(json).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }
}
