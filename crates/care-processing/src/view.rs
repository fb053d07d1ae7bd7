//! Uniform read access to either session dataset.
//!
//! Raw columns are text and are parsed on the fly; cleaned columns are typed
//! and encoded columns are decoded through their [`CategoryEncoding`]. The
//! profiler, the quality snapshot and every page read through this view, so
//! they never care which dataset they were given.

use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::BTreeMap;

use crate::dataset::{CategoryEncoding, CleanedDataset, RawDataset};
use crate::error::{ProcessingError, Result};
use crate::types::{ColumnSchema, DatasetKey, SemanticType, schema_type};
use crate::utils::{
    parse_date_string, parse_numeric_string, series_dates, series_f64, series_strings, series_u32,
};

/// Borrowed view over a raw or cleaned dataset.
#[derive(Debug, Clone, Copy)]
pub struct DatasetView<'a> {
    key: DatasetKey,
    df: &'a DataFrame,
    schema: &'a [ColumnSchema],
    encodings: Option<&'a BTreeMap<String, CategoryEncoding>>,
}

impl<'a> DatasetView<'a> {
    pub fn raw(dataset: &'a RawDataset) -> Self {
        Self {
            key: DatasetKey::Raw,
            df: dataset.df(),
            schema: dataset.schema(),
            encodings: None,
        }
    }

    pub fn cleaned(dataset: &'a CleanedDataset) -> Self {
        Self {
            key: DatasetKey::Cleaned,
            df: dataset.df(),
            schema: dataset.schema(),
            encodings: Some(dataset.encodings()),
        }
    }

    /// Which session dataset this view reads.
    pub fn key(&self) -> DatasetKey {
        self.key
    }

    pub fn df(&self) -> &'a DataFrame {
        self.df
    }

    pub fn schema(&self) -> &'a [ColumnSchema] {
        self.schema
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn width(&self) -> usize {
        self.df.width()
    }

    pub fn has_column(&self, name: &str) -> bool {
        schema_type(self.schema, name).is_some()
    }

    pub fn semantic_type(&self, name: &str) -> Option<SemanticType> {
        schema_type(self.schema, name)
    }

    /// Names of the columns with the given type, in column order.
    pub fn columns_of(&self, semantic_type: SemanticType) -> Vec<&'a str> {
        self.schema
            .iter()
            .filter(|c| c.semantic_type == semantic_type)
            .map(|c| c.name.as_str())
            .collect()
    }

    fn series(&self, name: &str) -> Result<&'a Series> {
        if !self.has_column(name) {
            return Err(ProcessingError::ColumnNotFound(name.to_string()));
        }
        Ok(self.df.column(name)?.as_materialized_series())
    }

    fn encoding(&self, name: &str) -> Option<&'a CategoryEncoding> {
        self.encodings.and_then(|e| e.get(name))
    }

    /// Values as numbers; unparsable cells are `None`.
    pub fn numbers(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let series = self.series(name)?;
        if series.dtype() == &DataType::String {
            let values = series
                .str()?
                .into_iter()
                .map(|v| v.and_then(parse_numeric_string))
                .collect();
            return Ok(values);
        }
        if self.encoding(name).is_some() || series.dtype() == &DataType::Date {
            return Ok(vec![None; series.len()]);
        }
        Ok(series_f64(series)?)
    }

    /// Values as display labels; encoded columns are decoded.
    pub fn labels(&self, name: &str) -> Result<Vec<Option<String>>> {
        let series = self.series(name)?;
        if let Some(encoding) = self.encoding(name) {
            let codes = series_u32(series)?;
            return Ok(codes
                .into_iter()
                .map(|c| c.and_then(|code| encoding.decode(code)).map(str::to_string))
                .collect());
        }
        Ok(series_strings(series)?)
    }

    /// Values as calendar dates; unparsable cells are `None`.
    pub fn dates(&self, name: &str) -> Result<Vec<Option<NaiveDate>>> {
        let series = self.series(name)?;
        match series.dtype() {
            DataType::Date => Ok(series_dates(series)?),
            DataType::String => Ok(series
                .str()?
                .into_iter()
                .map(|v| v.and_then(parse_date_string))
                .collect()),
            _ => Ok(vec![None; series.len()]),
        }
    }

    /// Missing cells in one column, as stored.
    pub fn null_count(&self, name: &str) -> Result<usize> {
        Ok(self.series(name)?.null_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestConfig;
    use crate::ingest::ingest_bytes;

    #[test]
    fn test_raw_view_parses_on_the_fly() {
        let raw = ingest_bytes(
            b"age,admitted,gender\n25,2024-01-05,Male\nold,2024-02-01,\n",
            "t.csv",
            &IngestConfig::default(),
        )
        .unwrap();
        let view = DatasetView::raw(&raw);

        assert_eq!(view.key(), DatasetKey::Raw);
        assert_eq!(view.numbers("age").unwrap(), vec![Some(25.0), None]);
        assert_eq!(
            view.dates("admitted").unwrap()[1],
            NaiveDate::from_ymd_opt(2024, 2, 1)
        );
        assert_eq!(
            view.labels("gender").unwrap(),
            vec![Some("Male".to_string()), None]
        );
        assert_eq!(view.columns_of(SemanticType::Datetime), vec!["admitted"]);
    }

    #[test]
    fn test_unknown_column_is_an_error() {
        let raw = ingest_bytes(b"a\n1\n", "t.csv", &IngestConfig::default()).unwrap();
        let err = DatasetView::raw(&raw).numbers("b").unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    }
}
