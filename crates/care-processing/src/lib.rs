//! Session-scoped data pipeline for a healthcare readmission dashboard.
//!
//! # Overview
//!
//! An uploaded CSV file moves through three stages:
//!
//! - **Ingestion**: delimited bytes become a [`RawDataset`] with an inferred
//!   semantic type per column (numeric, date, categorical, text)
//! - **Preprocessing**: a deterministic [`Pipeline`] coerces types, handles
//!   missing values and outliers, encodes categories and derives features,
//!   producing a [`CleanedDataset`] and a [`CleaningReport`]
//! - **Pages**: dashboard pages read whichever dataset they need from the
//!   [`SessionState`] and render metrics, chart specs and tables
//!
//! Uploading again replaces the raw dataset and discards the cleaned one, so
//! pages never show results computed from a previous file.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use care_processing::{
//!     ColumnRoles, IngestConfig, MissingValueStrategy, Pipeline, PipelineConfig, SessionState,
//! };
//! use care_processing::pages::{PageContext, find_page, render_page};
//!
//! let session = SessionState::new();
//! session.upload(&bytes, "healthcare.csv", &IngestConfig::default())?;
//!
//! let pipeline = Pipeline::builder()
//!     .config(
//!         PipelineConfig::builder()
//!             .missing_value_strategy(MissingValueStrategy::Mean)
//!             .build()?,
//!     )
//!     .on_progress(|update| println!("[{:.0}%] {}", update.progress * 100.0, update.message))
//!     .build()?;
//! let outcome = session.run_pipeline(&pipeline)?;
//! println!("{}", outcome.report.to_json()?);
//!
//! let ctx = PageContext::from_session(&session, &ColumnRoles::default())?;
//! if let Some(page) = find_page("outcomes") {
//!     println!("{}", render_page(page.as_ref(), &ctx)?);
//! }
//! ```
//!
//! # Configuration
//!
//! [`DashboardConfig`] bundles ingestion limits, pipeline options and the
//! column roles pages look up, and loads from JSON:
//!
//! ```rust,ignore
//! let config = DashboardConfig::from_json_file("dashboard.json")?;
//! ```

pub mod config;
pub mod dataset;
pub mod error;
pub mod ingest;
pub mod pages;
pub mod pipeline;
pub mod profiler;
pub mod reporting;
pub mod session;
pub mod types;
pub mod utils;
pub mod view;

// Re-exports for convenient access
pub use config::{
    CategoricalFill, ColumnRoles, ConfigValidationError, DashboardConfig, DerivationSources,
    DerivedFeature, IngestConfig, MissingValueStrategy, OutlierStrategy, PipelineConfig,
    PipelineConfigBuilder, ScalingMethod,
};
pub use dataset::{CategoryEncoding, CleanedDataset, RawDataset};
pub use error::{ProcessingError, Result as ProcessingResult, ResultExt};
pub use ingest::{ingest_bytes, ingest_file};
pub use pages::{DataRequirement, Page, PageContent, PageContext, PageView, render_page};
pub use pipeline::{
    ClosureProgressReporter, Pipeline, PipelineBuilder, PipelineStage, ProgressReporter,
    ProgressUpdate,
};
pub use profiler::DataProfiler;
pub use reporting::{
    ActionType, CleaningAction, CleaningReport, ColumnReport, DerivationOutcome, DerivationStatus,
    DropRule, QualitySnapshot, RowDrop,
};
pub use session::{
    PipelineOutcome, SessionSnapshot, SessionState, StoredDataset, WorkflowProgress,
};
pub use types::{ColumnProfile, ColumnSchema, DatasetKey, SemanticType, SourceInfo};
pub use view::DatasetView;
