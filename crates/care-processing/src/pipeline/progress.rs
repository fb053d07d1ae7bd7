//! Progress reporting for the cleaning pipeline.
//!
//! Updates are informational: the pipeline runs every stage to completion
//! and there is no cancellation.
//!
//! # Example
//!
//! ```rust,ignore
//! use care_processing::Pipeline;
//!
//! let (cleaned, report) = Pipeline::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run(&raw)?;
//! ```

use serde::{Deserialize, Serialize};

/// Stages of the cleaning pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Converting text cells to each column's type
    Coercion,
    /// Removing exact duplicate rows
    Deduplication,
    /// Flagging sparse columns and filling or dropping missing values
    MissingValues,
    /// Capping or removing IQR outliers
    Outliers,
    /// Replacing categorical labels with integer codes
    Encoding,
    /// Appending derived feature columns
    DerivedFeatures,
    /// Appending scaled copies of numeric columns
    Scaling,
    /// Pipeline completed successfully
    Complete,
    /// Pipeline failed with an error
    Failed,
}

impl PipelineStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Coercion => "Coercing Types",
            Self::Deduplication => "Removing Duplicates",
            Self::MissingValues => "Handling Missing Values",
            Self::Outliers => "Handling Outliers",
            Self::Encoding => "Encoding Categories",
            Self::DerivedFeatures => "Deriving Features",
            Self::Scaling => "Scaling Numeric Columns",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }
}

/// One progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: PipelineStage,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Human-readable message describing current activity
    pub message: String,
}

impl ProgressUpdate {
    /// Update for step `step` (0-based) of `total` stages.
    pub fn step(stage: PipelineStage, step: usize, total: usize, message: impl Into<String>) -> Self {
        let progress = if total > 0 {
            step as f32 / total as f32
        } else {
            0.0
        };
        Self {
            stage,
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
        }
    }

    /// Creates a completion progress update.
    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            stage: PipelineStage::Complete,
            progress: 1.0,
            message: message.into(),
        }
    }

    /// Creates a failed progress update.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            stage: PipelineStage::Failed,
            progress: 0.0,
            message: message.into(),
        }
    }
}

/// Receives progress updates while the pipeline runs.
///
/// Implementations must be `Send + Sync` so a pipeline can be shared
/// with a UI thread.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_step_progress() {
        let update = ProgressUpdate::step(PipelineStage::Encoding, 2, 4, "encoding");
        assert_eq!(update.progress, 0.5);
        assert_eq!(ProgressUpdate::step(PipelineStage::Coercion, 0, 0, "").progress, 0.0);
    }

    #[test]
    fn test_closure_reporter() {
        let seen = Mutex::new(Vec::new());
        let reporter = ClosureProgressReporter::new(|u: ProgressUpdate| {
            seen.lock().unwrap().push(u.stage);
        });
        reporter.report(ProgressUpdate::complete("done"));
        assert_eq!(*seen.lock().unwrap(), vec![PipelineStage::Complete]);
    }

    #[test]
    fn test_stage_serialization() {
        let json = serde_json::to_string(&PipelineStage::MissingValues).unwrap();
        assert_eq!(json, "\"missing_values\"");
    }
}
