//! The cleaning report produced alongside every cleaned dataset.
//!
//! The report holds counts and decisions only (no timings or paths), so two
//! runs over the same upload serialize to identical JSON.

use serde::{Deserialize, Serialize};

use crate::config::DerivedFeature;
use crate::error::Result;
use crate::types::SemanticType;

/// Everything the pipeline changed, per column and per dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub rows_before: usize,
    pub rows_after: usize,
    pub columns_before: usize,
    pub columns_after: usize,
    /// One entry per rule that removed rows.
    pub row_drops: Vec<RowDrop>,
    /// One entry per uploaded column, in upload order.
    pub columns: Vec<ColumnReport>,
    pub derivations: Vec<DerivationOutcome>,
    /// Ordered audit trail of what was done.
    pub actions: Vec<CleaningAction>,
    pub warnings: Vec<String>,
}

impl CleaningReport {
    /// Start a report for a dataset of `rows_before` rows and the given columns.
    pub fn new<'a>(
        rows_before: usize,
        columns: impl IntoIterator<Item = (&'a str, SemanticType)>,
    ) -> Self {
        let columns: Vec<ColumnReport> = columns
            .into_iter()
            .map(|(name, semantic_type)| ColumnReport::new(name, semantic_type))
            .collect();
        Self {
            rows_before,
            rows_after: rows_before,
            columns_before: columns.len(),
            columns_after: columns.len(),
            row_drops: Vec::new(),
            columns,
            derivations: Vec::new(),
            actions: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnReport> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut ColumnReport> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn add_action(&mut self, action: CleaningAction) {
        self.actions.push(action);
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Record rows removed by one rule; zero counts are not recorded.
    pub fn record_row_drop(&mut self, rule: DropRule, count: usize) {
        if count > 0 {
            self.row_drops.push(RowDrop { rule, count });
        }
    }

    pub fn rows_dropped(&self) -> usize {
        self.row_drops.iter().map(|d| d.count).sum()
    }

    pub fn rows_dropped_by(&self, rule: DropRule) -> usize {
        self.row_drops
            .iter()
            .filter(|d| d.rule == rule)
            .map(|d| d.count)
            .sum()
    }

    pub fn rows_removed_percentage(&self) -> f64 {
        if self.rows_before == 0 {
            0.0
        } else {
            self.rows_dropped() as f64 / self.rows_before as f64 * 100.0
        }
    }

    pub fn removed_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.was_removed)
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn derivation(&self, feature: DerivedFeature) -> Option<&DerivationOutcome> {
        self.derivations.iter().find(|d| d.feature == feature)
    }

    pub fn skipped_derivations(&self) -> impl Iterator<Item = &DerivationOutcome> {
        self.derivations
            .iter()
            .filter(|d| d.status == DerivationStatus::Skipped)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Rule that removed rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropRule {
    Duplicates,
    MissingValues,
    Outliers,
}

impl DropRule {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Duplicates => "Duplicate rows",
            Self::MissingValues => "Rows with missing values",
            Self::Outliers => "Rows with outliers",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowDrop {
    pub rule: DropRule,
    pub count: usize,
}

/// What happened to one uploaded column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnReport {
    pub name: String,
    pub semantic_type: SemanticType,
    /// Missing cells after coercion, so failed conversions count.
    pub missing_before: usize,
    pub missing_after: usize,
    /// Non-missing cells that failed conversion to the column's type.
    pub coercion_failures: usize,
    /// Fill rule applied and the value used, e.g. `mean (32.5)`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imputation: Option<String>,
    pub flagged_for_removal: bool,
    pub was_removed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removal_reason: Option<String>,
    /// Number of distinct codes, for encoded columns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding_size: Option<usize>,
    pub outliers_handled: usize,
}

impl ColumnReport {
    pub fn new(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            semantic_type,
            missing_before: 0,
            missing_after: 0,
            coercion_failures: 0,
            imputation: None,
            flagged_for_removal: false,
            was_removed: false,
            removal_reason: None,
            encoding_size: None,
            outliers_handled: 0,
        }
    }

    /// Flag the column; it is not imputed, and is removed when `remove` is set.
    pub fn flag(&mut self, reason: impl Into<String>, remove: bool) {
        self.flagged_for_removal = true;
        self.was_removed = remove;
        self.removal_reason = Some(reason.into());
        self.missing_after = self.missing_before;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivationStatus {
    Applied,
    Skipped,
}

/// Result of one requested derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationOutcome {
    pub feature: DerivedFeature,
    pub status: DerivationStatus,
    /// Columns appended; empty when skipped.
    pub output_columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DerivationOutcome {
    pub fn applied(feature: DerivedFeature, output_columns: Vec<String>) -> Self {
        Self {
            feature,
            status: DerivationStatus::Applied,
            output_columns,
            reason: None,
        }
    }

    pub fn skipped(feature: DerivedFeature, reason: impl Into<String>) -> Self {
        Self {
            feature,
            status: DerivationStatus::Skipped,
            output_columns: Vec::new(),
            reason: Some(reason.into()),
        }
    }
}

/// A single action taken by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningAction {
    pub action_type: ActionType,
    /// Column name, or "dataset".
    pub target: String,
    pub description: String,
}

impl CleaningAction {
    pub fn new(
        action_type: ActionType,
        target: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            action_type,
            target: target.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    ValuesCoerced,
    DuplicatesRemoved,
    ColumnFlagged,
    ColumnRemoved,
    RowsRemoved,
    ValueImputed,
    OutlierHandled,
    CategoriesEncoded,
    OneHotEncoded,
    FrequencyEncoded,
    EncodingSkipped,
    FeatureDerived,
    DerivationSkipped,
    ColumnScaled,
    ScalingSkipped,
}

impl ActionType {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ValuesCoerced => "Values Coerced",
            Self::DuplicatesRemoved => "Duplicates Removed",
            Self::ColumnFlagged => "Column Flagged",
            Self::ColumnRemoved => "Column Removed",
            Self::RowsRemoved => "Rows Removed",
            Self::ValueImputed => "Value Imputed",
            Self::OutlierHandled => "Outlier Handled",
            Self::CategoriesEncoded => "Categories Encoded",
            Self::OneHotEncoded => "One-Hot Encoded",
            Self::FrequencyEncoded => "Frequency Encoded",
            Self::EncodingSkipped => "Encoding Skipped",
            Self::FeatureDerived => "Feature Derived",
            Self::DerivationSkipped => "Derivation Skipped",
            Self::ColumnScaled => "Column Scaled",
            Self::ScalingSkipped => "Scaling Skipped",
        }
    }
}
