//! Exact duplicate row removal.

use tracing::info;

use super::{PipelineStage, Stage, StageState};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::reporting::{ActionType, CleaningAction, DropRule};
use crate::utils::first_occurrence_mask;

/// Drops rows identical to an earlier row, keeping the first occurrence.
pub struct DeduplicationStage;

impl Stage for DeduplicationStage {
    fn stage(&self) -> PipelineStage {
        PipelineStage::Deduplication
    }

    fn apply(&self, mut state: StageState, _config: &PipelineConfig) -> Result<StageState> {
        let keep = first_occurrence_mask(&state.df)?;
        let removed = state.retain_rows(&keep)?;

        if removed > 0 {
            info!("Removed {} duplicate rows", removed);
            state.report.record_row_drop(DropRule::Duplicates, removed);
            state.report.add_action(CleaningAction::new(
                ActionType::DuplicatesRemoved,
                "dataset",
                format!("Removed {} duplicate rows", removed),
            ));
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestConfig;
    use crate::ingest::ingest_bytes;

    #[test]
    fn test_duplicates_removed_keep_first() {
        let raw = ingest_bytes(
            b"id,name\n1,a\n2,b\n1,a\n3,c\n2,b\n",
            "t.csv",
            &IngestConfig::default(),
        )
        .unwrap();
        let state = DeduplicationStage
            .apply(StageState::from_raw(&raw), &PipelineConfig::default())
            .unwrap();

        assert_eq!(state.df.height(), 3);
        assert_eq!(state.report.rows_dropped_by(DropRule::Duplicates), 2);
        let ids: Vec<_> = state
            .series("id")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }
}
