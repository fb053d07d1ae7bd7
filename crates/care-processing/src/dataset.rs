//! The two datasets a session can hold.
//!
//! A [`RawDataset`] is the upload exactly as parsed: every cell is text and
//! missing markers are nulls. A [`CleanedDataset`] is the pipeline output:
//! typed columns, categorical columns replaced by integer codes, and the
//! [`CategoryEncoding`] needed to turn codes back into labels.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ProcessingError, Result, ResultExt};
use crate::types::{ColumnSchema, SemanticType, SourceInfo, schema_type};
use crate::utils::series_u32;

// =============================================================================
// Raw
// =============================================================================

/// The parsed upload. Immutable once stored in a session.
#[derive(Debug, Clone)]
pub struct RawDataset {
    df: DataFrame,
    schema: Vec<ColumnSchema>,
    source: SourceInfo,
    generation: u64,
}

impl RawDataset {
    pub(crate) fn new(df: DataFrame, schema: Vec<ColumnSchema>, source: SourceInfo) -> Self {
        Self {
            df,
            schema,
            source,
            generation: 0,
        }
    }

    /// Text frame, one `String` column per header field.
    pub fn df(&self) -> &DataFrame {
        &self.df
    }

    /// Inferred semantic type of every column, in header order.
    pub fn schema(&self) -> &[ColumnSchema] {
        &self.schema
    }

    pub fn source(&self) -> &SourceInfo {
        &self.source
    }

    /// Session upload number; 0 until the dataset is stored.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn width(&self) -> usize {
        self.df.width()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.schema.iter().map(|c| c.name.clone()).collect()
    }

    pub fn semantic_type(&self, column: &str) -> Option<SemanticType> {
        schema_type(&self.schema, column)
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Reversible mapping between the distinct labels of one column and `u32` codes.
///
/// Labels are sorted, and a label's code is its position, so the same set of
/// values always produces the same codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEncoding {
    pub column: String,
    labels: Vec<String>,
}

impl CategoryEncoding {
    /// Build from the observed (non-missing) values of a column.
    pub fn from_values<'a>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut labels: Vec<String> = values.into_iter().map(str::to_string).collect();
        labels.sort();
        labels.dedup();
        Self {
            column: column.into(),
            labels,
        }
    }

    pub fn encode(&self, label: &str) -> Option<u32> {
        self.labels
            .binary_search_by(|l| l.as_str().cmp(label))
            .ok()
            .and_then(|idx| u32::try_from(idx).ok())
    }

    pub fn decode(&self, code: u32) -> Option<&str> {
        self.labels.get(code as usize).map(String::as_str)
    }

    /// Labels in code order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

// =============================================================================
// Cleaned
// =============================================================================

/// Output of the preprocessing pipeline.
#[derive(Debug, Clone)]
pub struct CleanedDataset {
    df: DataFrame,
    schema: Vec<ColumnSchema>,
    encodings: BTreeMap<String, CategoryEncoding>,
    source: SourceInfo,
    source_generation: u64,
}

impl CleanedDataset {
    pub(crate) fn new(
        df: DataFrame,
        schema: Vec<ColumnSchema>,
        encodings: BTreeMap<String, CategoryEncoding>,
        source: SourceInfo,
        source_generation: u64,
    ) -> Self {
        Self {
            df,
            schema,
            encodings,
            source,
            source_generation,
        }
    }

    /// Typed frame; encoded columns hold `u32` codes.
    pub fn df(&self) -> &DataFrame {
        &self.df
    }

    /// Column types after the pipeline, derived columns included.
    pub fn schema(&self) -> &[ColumnSchema] {
        &self.schema
    }

    pub fn encodings(&self) -> &BTreeMap<String, CategoryEncoding> {
        &self.encodings
    }

    pub fn encoding(&self, column: &str) -> Option<&CategoryEncoding> {
        self.encodings.get(column)
    }

    pub fn source(&self) -> &SourceInfo {
        &self.source
    }

    /// Generation of the raw dataset this was produced from.
    pub fn source_generation(&self) -> u64 {
        self.source_generation
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn width(&self) -> usize {
        self.df.width()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.schema.iter().map(|c| c.name.clone()).collect()
    }

    pub fn semantic_type(&self, column: &str) -> Option<SemanticType> {
        schema_type(&self.schema, column)
    }

    /// Copy of the frame with every encoded column turned back into labels.
    pub fn decoded_frame(&self) -> Result<DataFrame> {
        let mut df = self.df.clone();
        for (name, encoding) in &self.encodings {
            let codes = series_u32(df.column(name)?.as_materialized_series())
                .context(format!("decoding column '{}'", name))?;
            let labels: Vec<Option<&str>> = codes
                .iter()
                .map(|c| c.and_then(|code| encoding.decode(code)))
                .collect();
            df.replace(name, Series::new(name.as_str().into(), labels))?;
        }
        Ok(df)
    }

    /// Write the dataset as CSV, with codes or with decoded labels.
    pub fn to_csv_bytes(&self, decoded: bool) -> Result<Vec<u8>> {
        let mut df = if decoded {
            self.decoded_frame()?
        } else {
            self.df.clone()
        };
        let mut buf = Vec::new();
        CsvWriter::new(&mut buf)
            .include_header(true)
            .with_separator(b',')
            .with_quote_char(b'"')
            .finish(&mut df)
            .map_err(|e| ProcessingError::Polars(e).with_context("writing cleaned CSV"))?;
        Ok(buf)
    }
}
