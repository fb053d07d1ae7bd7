//! Error types for ingestion, the session store and the cleaning pipeline.
//!
//! Every error carries a stable code so a dashboard frontend can route it:
//! upload problems ask the user to re-upload, pipeline problems point at the
//! source data, and [`ProcessingError::DependencyNotMet`] is a navigational
//! state rather than a failure.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

use crate::types::DatasetKey;

/// The main error type for the processing crate.
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// The upload is not usable delimited text.
    #[error("Invalid file format: {0}")]
    Format(String),

    /// The upload exceeds the configured row or column ceiling.
    #[error("Upload has too many {dimension}: limit is {limit}, found {actual}")]
    InputTooLarge {
        dimension: &'static str,
        limit: usize,
        actual: usize,
    },

    /// The dataset is structurally empty at some point of the pipeline.
    #[error("Pipeline failed: {0}")]
    Pipeline(String),

    /// A page or operation needs a dataset that is not in the session.
    #[error("'{page}' needs the {required} dataset, which has not been produced yet")]
    DependencyNotMet { page: String, required: DatasetKey },

    /// A cleaned dataset was produced from a raw dataset that has since been replaced.
    #[error("Cleaned dataset belongs to upload #{cleaned_from}, current upload is #{current}")]
    StaleDataset { cleaned_from: u64, current: u64 },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ProcessingError>,
    },
}

impl ProcessingError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ProcessingError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get error code for frontend handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Format(_) => "FORMAT_ERROR",
            Self::InputTooLarge { .. } => "INPUT_TOO_LARGE",
            Self::Pipeline(_) => "PIPELINE_ERROR",
            Self::DependencyNotMet { .. } => "DEPENDENCY_NOT_MET",
            Self::StaleDataset { .. } => "STALE_DATASET",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// True for states the user resolves by visiting another page.
    pub fn is_navigational(&self) -> bool {
        match self {
            Self::DependencyNotMet { .. } | Self::StaleDataset { .. } => true,
            Self::WithContext { source, .. } => source.is_navigational(),
            _ => false,
        }
    }

    /// True when the upload itself is unusable.
    pub fn is_format_error(&self) -> bool {
        match self {
            Self::Format(_) | Self::InputTooLarge { .. } => true,
            Self::WithContext { source, .. } => source.is_format_error(),
            _ => false,
        }
    }

    /// Short instruction shown next to the message.
    pub fn user_hint(&self) -> &'static str {
        match self {
            Self::Format(_) | Self::InputTooLarge { .. } => {
                "Upload a valid CSV file with a header row"
            }
            Self::Pipeline(_) => "Check the source data: it has no usable rows or columns",
            Self::DependencyNotMet {
                required: DatasetKey::Raw,
                ..
            } => "Upload a dataset first",
            Self::DependencyNotMet {
                required: DatasetKey::Cleaned,
                ..
            } => "Run preprocessing first",
            Self::StaleDataset { .. } => "Run preprocessing again on the current upload",
            Self::InvalidConfig(_) => "Fix the configuration and try again",
            Self::WithContext { source, .. } => source.user_hint(),
            _ => "Unexpected error, see the logs for details",
        }
    }
}

/// Errors are serialized as `{code, message, hint}` for the frontend.
impl Serialize for ProcessingError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ProcessingError", 3)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.serialize_field("hint", &self.user_hint())?;
        state.end()
    }
}

/// Result type alias for processing operations.
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ProcessingError::Polars(e).with_context(context))
    }
}
