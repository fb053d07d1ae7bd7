//! The cleaning pipeline: named stages from a raw upload to a cleaned dataset.
//!
//! Stages run in a fixed order and each one maps a [`StageState`] to the
//! next. Stages never touch the session; the pipeline is a pure function of
//! the raw dataset and the configuration.

mod builder;
mod coercion;
mod derived;
mod duplicates;
mod encoding;
mod missing;
mod outliers;
pub mod progress;
mod scaling;

pub use builder::{Pipeline, PipelineBuilder};
pub use coercion::CoercionStage;
pub use derived::DerivedFeatureStage;
pub use duplicates::DeduplicationStage;
pub use encoding::EncodingStage;
pub use missing::MissingValueStage;
pub use outliers::OutlierStage;
pub use scaling::{ScalingStage, scaling_parameters};
pub use progress::{
    ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};

use polars::prelude::*;
use std::collections::BTreeMap;

use crate::config::PipelineConfig;
use crate::dataset::{CategoryEncoding, RawDataset};
use crate::error::Result;
use crate::reporting::CleaningReport;
use crate::types::{ColumnSchema, SemanticType, schema_type};

/// One named step of the pipeline.
pub trait Stage: Send + Sync {
    /// Which progress stage this is.
    fn stage(&self) -> PipelineStage;

    fn apply(&self, state: StageState, config: &PipelineConfig) -> Result<StageState>;
}

/// Everything a stage reads and produces.
#[derive(Debug, Clone)]
pub struct StageState {
    pub df: DataFrame,
    pub schema: Vec<ColumnSchema>,
    pub encodings: BTreeMap<String, CategoryEncoding>,
    pub report: CleaningReport,
}

impl StageState {
    /// Initial state: the raw text frame and a report with one entry per column.
    pub fn from_raw(raw: &RawDataset) -> Self {
        let report = CleaningReport::new(
            raw.height(),
            raw.schema()
                .iter()
                .map(|c| (c.name.as_str(), c.semantic_type)),
        );
        Self {
            df: raw.df().clone(),
            schema: raw.schema().to_vec(),
            encodings: BTreeMap::new(),
            report,
        }
    }

    pub fn semantic_type(&self, name: &str) -> Option<SemanticType> {
        schema_type(&self.schema, name)
    }

    pub fn series(&self, name: &str) -> Result<&Series> {
        Ok(self.df.column(name)?.as_materialized_series())
    }

    pub fn replace(&mut self, name: &str, series: Series) -> Result<()> {
        self.df.replace(name, series)?;
        Ok(())
    }

    /// Append a new column with its semantic type.
    pub fn push_column(&mut self, series: Series, semantic_type: SemanticType) -> Result<()> {
        let name = series.name().to_string();
        self.df.with_column(series)?;
        self.schema.push(ColumnSchema::new(name, semantic_type));
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> Result<()> {
        self.df.drop_in_place(name)?;
        self.schema.retain(|c| c.name != name);
        self.encodings.remove(name);
        Ok(())
    }

    /// Keep the rows whose mask entry is `true`; returns how many were dropped.
    pub fn retain_rows(&mut self, keep: &[bool]) -> Result<usize> {
        let before = self.df.height();
        let mask = BooleanChunked::from_slice("keep".into(), keep);
        self.df = self.df.filter(&mask)?;
        Ok(before - self.df.height())
    }

    /// Columns of one semantic type, in column order.
    pub fn columns_of(&self, semantic_type: SemanticType) -> Vec<String> {
        self.schema
            .iter()
            .filter(|c| c.semantic_type == semantic_type)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Whether the column was flagged by the missing-value stage but kept.
    pub fn is_flagged(&self, name: &str) -> bool {
        self.report
            .column(name)
            .is_some_and(|c| c.flagged_for_removal)
    }
}
