//! Cleaning report and dataset quality types.

mod quality;
mod report;

pub use quality::QualitySnapshot;
pub use report::{
    ActionType, CleaningAction, CleaningReport, ColumnReport, DerivationOutcome,
    DerivationStatus, DropRule, RowDrop,
};
