//! Dataset-level quality metrics shown on upload and after preprocessing.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{ColumnProfile, SemanticType};
use crate::utils::first_occurrence_mask;
use crate::view::DatasetView;

/// Headline quality figures for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySnapshot {
    pub total_records: usize,
    pub features: usize,
    pub missing_cells: usize,
    /// Share of non-missing cells, 0-100.
    pub completeness_pct: f64,
    pub duplicate_rows: usize,
    /// Share of rows that are not duplicates, 0-100.
    pub uniqueness_pct: f64,
    pub numeric_columns: usize,
    pub categorical_columns: usize,
    pub datetime_columns: usize,
    pub text_columns: usize,
}

impl QualitySnapshot {
    /// Missing cells and type counts come from the column profiles; duplicate
    /// rows need the whole frame.
    pub fn from_profiles(view: &DatasetView<'_>, profiles: &[ColumnProfile]) -> Result<Self> {
        let total_records = view.height();
        let features = profiles.len();
        let missing_cells: usize = profiles.iter().map(|p| p.missing_count).sum();
        let duplicate_rows = first_occurrence_mask(view.df())?
            .into_iter()
            .filter(|first| !first)
            .count();

        let total_cells = total_records * features;
        let completeness_pct = if total_cells > 0 {
            (1.0 - missing_cells as f64 / total_cells as f64) * 100.0
        } else {
            100.0
        };
        let uniqueness_pct = if total_records > 0 {
            (1.0 - duplicate_rows as f64 / total_records as f64) * 100.0
        } else {
            100.0
        };

        let count = |t: SemanticType| profiles.iter().filter(|p| p.semantic_type == t).count();

        Ok(Self {
            total_records,
            features,
            missing_cells,
            completeness_pct,
            duplicate_rows,
            uniqueness_pct,
            numeric_columns: count(SemanticType::Numeric),
            categorical_columns: count(SemanticType::Categorical),
            datetime_columns: count(SemanticType::Datetime),
            text_columns: count(SemanticType::Text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestConfig;
    use crate::ingest::ingest_bytes;
    use crate::profiler::DataProfiler;

    #[test]
    fn test_snapshot_counts() {
        let raw = ingest_bytes(
            b"age,gender\n25,Male\n25,Male\nNA,Female\n40,NA\n",
            "t.csv",
            &IngestConfig::default(),
        )
        .unwrap();
        let view = DatasetView::raw(&raw);
        let profiles = DataProfiler::profile_dataset(&view).unwrap();
        let snapshot = QualitySnapshot::from_profiles(&view, &profiles).unwrap();

        assert_eq!(snapshot.total_records, 4);
        assert_eq!(snapshot.features, 2);
        assert_eq!(snapshot.missing_cells, 2);
        assert_eq!(snapshot.completeness_pct, 75.0);
        assert_eq!(snapshot.duplicate_rows, 1);
        assert_eq!(snapshot.uniqueness_pct, 75.0);
        assert_eq!(snapshot.numeric_columns, 1);
        assert_eq!(snapshot.categorical_columns, 1);
    }

    #[test]
    fn test_snapshot_follows_profiles() {
        let raw = ingest_bytes(b"age\n25\n40\n", "t.csv", &IngestConfig::default()).unwrap();
        let view = DatasetView::raw(&raw);
        let mut profiles = DataProfiler::profile_dataset(&view).unwrap();
        profiles[0].missing_count = 1;
        profiles[0].semantic_type = SemanticType::Text;

        let snapshot = QualitySnapshot::from_profiles(&view, &profiles).unwrap();
        assert_eq!(snapshot.missing_cells, 1);
        assert_eq!(snapshot.completeness_pct, 50.0);
        assert_eq!(snapshot.numeric_columns, 0);
        assert_eq!(snapshot.text_columns, 1);
    }
}
