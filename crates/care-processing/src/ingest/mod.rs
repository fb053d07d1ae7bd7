//! Upload ingestion: delimited bytes to a validated [`RawDataset`].
//!
//! Every cell is read as text so nothing is lost before the pipeline's own
//! coercion stage. The header row is read as data and validated here, which
//! keeps duplicate and empty header names under our control instead of the
//! CSV reader's renaming rules.
//!
//! # Example
//!
//! ```rust,ignore
//! use care_processing::{IngestConfig, ingest::ingest_bytes};
//!
//! let raw = ingest_bytes(b"age,outcome\n25,readmitted\n", "upload.csv", &IngestConfig::default())?;
//! assert_eq!(raw.width(), 2);
//! ```

mod type_inference;

pub use type_inference::infer_semantic_type;

use polars::prelude::*;
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info};

use crate::config::IngestConfig;
use crate::dataset::RawDataset;
use crate::error::{ProcessingError, Result};
use crate::types::{ColumnSchema, SourceInfo};
use crate::utils::normalize_header;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Read a file from disk and ingest it; the file name becomes the display name.
pub fn ingest_file(path: impl AsRef<Path>, config: &IngestConfig) -> Result<RawDataset> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .map_err(|e| ProcessingError::Io(e).with_context(path.display().to_string()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    ingest_bytes(&bytes, &name, config)
}

/// Parse uploaded bytes into a [`RawDataset`].
///
/// Fails with [`ProcessingError::Format`] for empty, non-UTF-8 or malformed
/// input and for empty or duplicate header names, and with
/// [`ProcessingError::InputTooLarge`] when a ceiling is exceeded.
pub fn ingest_bytes(bytes: &[u8], name: &str, config: &IngestConfig) -> Result<RawDataset> {
    let delimiter = config.delimiter_byte()?;
    config.validate()?;

    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let text = std::str::from_utf8(body)
        .map_err(|e| ProcessingError::Format(format!("file is not UTF-8 text ({})", e)))?;
    if text.trim().is_empty() {
        return Err(ProcessingError::Format("file is empty".to_string()));
    }

    // Short records are padded with nulls by the reader; long ones are not
    // silently truncated.
    if let Some(ragged) = find_long_record(text, delimiter) {
        return Err(ProcessingError::Format(format!(
            "line {} has {} fields, but the header has {}",
            ragged.line, ragged.fields, ragged.expected
        )));
    }

    // Header line plus one row past the ceiling, so overflow is detectable
    // without reading the whole upload.
    let read_limit = config.max_rows.saturating_add(2);
    let grid = CsvReadOptions::default()
        .with_has_header(false)
        .with_infer_schema_length(Some(0))
        .with_n_rows(Some(read_limit))
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(delimiter)
                .with_quote_char(Some(b'"')),
        )
        .into_reader_with_file_handle(Cursor::new(text.as_bytes().to_vec()))
        .finish()
        .map_err(|e| {
            let detail = e.to_string();
            let first = detail.lines().next().unwrap_or_default().to_string();
            ProcessingError::Format(format!("could not parse delimited text: {}", first))
        })?;

    if grid.width() > config.max_columns {
        return Err(ProcessingError::InputTooLarge {
            dimension: "columns",
            limit: config.max_columns,
            actual: grid.width(),
        });
    }
    let row_count = grid.height().saturating_sub(1);
    if row_count > config.max_rows {
        return Err(ProcessingError::InputTooLarge {
            dimension: "rows",
            limit: config.max_rows,
            actual: row_count,
        });
    }

    let headers = read_headers(&grid, config.normalize_headers)?;
    let markers: HashSet<&str> = config.missing_markers.iter().map(String::as_str).collect();

    let mut columns: Vec<Column> = Vec::with_capacity(headers.len());
    let mut schema = Vec::with_capacity(headers.len());
    for (column, header) in grid.get_columns().iter().zip(&headers) {
        let cells = column.as_materialized_series().slice(1, row_count);
        let values: Vec<Option<&str>> = cells
            .str()?
            .into_iter()
            .map(|v| v.filter(|s| !markers.contains(s)))
            .collect();

        let semantic_type = infer_semantic_type(values.iter().copied());
        debug!("Column '{}' inferred as {}", header, semantic_type);

        schema.push(ColumnSchema::new(header.clone(), semantic_type));
        columns.push(Series::new(header.as_str().into(), values).into());
    }

    let df = DataFrame::new(columns)?;
    info!(
        "Loaded '{}': {} rows x {} columns ({} bytes)",
        name,
        df.height(),
        df.width(),
        bytes.len()
    );

    Ok(RawDataset::new(
        df,
        schema,
        SourceInfo {
            name: name.to_string(),
            size_bytes: bytes.len(),
        },
    ))
}

/// A record with more fields than the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LongRecord {
    line: usize,
    fields: usize,
    expected: usize,
}

/// Scan for the first record wider than the header row.
///
/// Quote-aware: delimiters and newlines inside double quotes do not split
/// fields or records. Blank lines are skipped. `line` is the 1-based line on
/// which the record starts.
fn find_long_record(text: &str, delimiter: u8) -> Option<LongRecord> {
    let mut expected: Option<usize> = None;
    let mut fields = 1;
    let mut in_quotes = false;
    let mut blank = true;
    let mut line = 1;
    let mut record_start = 1;

    for byte in text.bytes().chain(std::iter::once(b'\n')) {
        match byte {
            b'"' => {
                in_quotes = !in_quotes;
                blank = false;
            }
            b'\n' if !in_quotes => {
                if !blank {
                    match expected {
                        None => expected = Some(fields),
                        Some(width) if fields > width => {
                            return Some(LongRecord {
                                line: record_start,
                                fields,
                                expected: width,
                            });
                        }
                        Some(_) => {}
                    }
                }
                line += 1;
                record_start = line;
                fields = 1;
                blank = true;
            }
            b'\n' => line += 1,
            b'\r' => {}
            b if b == delimiter && !in_quotes => {
                fields += 1;
                blank = false;
            }
            _ => blank = false,
        }
    }
    None
}

/// Read, optionally normalize, and validate the first row as column names.
fn read_headers(grid: &DataFrame, normalize: bool) -> Result<Vec<String>> {
    let mut headers = Vec::with_capacity(grid.width());
    let mut seen = HashSet::with_capacity(grid.width());

    for (idx, column) in grid.get_columns().iter().enumerate() {
        let raw = column.as_materialized_series().str()?.get(0).unwrap_or("");
        let header = if normalize {
            normalize_header(raw)
        } else {
            raw.trim().to_string()
        };

        if header.is_empty() {
            return Err(ProcessingError::Format(format!(
                "header field {} is empty",
                idx + 1
            )));
        }
        if !seen.insert(header.clone()) {
            return Err(ProcessingError::Format(format!(
                "duplicate column name '{}'",
                header
            )));
        }
        headers.push(header);
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SemanticType;
    use pretty_assertions::assert_eq;

    fn ingest(text: &str) -> Result<RawDataset> {
        ingest_bytes(text.as_bytes(), "test.csv", &IngestConfig::default())
    }

    #[test]
    fn test_column_count_matches_header() {
        let raw = ingest("age,gender,outcome\n25,Male,readmitted\n40,Female,\n").unwrap();
        assert_eq!(raw.width(), 3);
        assert_eq!(raw.height(), 2);
        assert_eq!(raw.column_names(), vec!["age", "gender", "outcome"]);
    }

    #[test]
    fn test_headers_are_normalized() {
        let raw = ingest("Date of Admission,Blood-Type\n2024-01-01,A+\n").unwrap();
        assert_eq!(raw.column_names(), vec!["date_of_admission", "blood_type"]);

        let config = IngestConfig::default().with_normalize_headers(false);
        let raw = ingest_bytes(b"Blood Type\nA+\n", "t.csv", &config).unwrap();
        assert_eq!(raw.column_names(), vec!["Blood Type"]);
    }

    #[test]
    fn test_missing_markers_become_null() {
        let raw = ingest("age,name\n25,NA\n,Bob\nnull,N/A\n").unwrap();
        assert_eq!(raw.df().column("age").unwrap().null_count(), 2);
        assert_eq!(raw.df().column("name").unwrap().null_count(), 2);
    }

    #[test]
    fn test_schema_is_inferred() {
        let raw = ingest(
            "age,admitted,gender\n25,2024-01-05,Male\n40,2024-02-01,Female\n",
        )
        .unwrap();
        assert_eq!(raw.semantic_type("age"), Some(SemanticType::Numeric));
        assert_eq!(raw.semantic_type("admitted"), Some(SemanticType::Datetime));
        assert_eq!(raw.semantic_type("gender"), Some(SemanticType::Categorical));
    }

    #[test]
    fn test_bom_is_stripped() {
        let raw = ingest_bytes(b"\xEF\xBB\xBFage\n1\n", "bom.csv", &IngestConfig::default())
            .unwrap();
        assert_eq!(raw.column_names(), vec!["age"]);
    }

    #[test]
    fn test_header_only_upload_is_accepted() {
        let raw = ingest("age,outcome\n").unwrap();
        assert_eq!(raw.width(), 2);
        assert_eq!(raw.height(), 0);
    }

    #[test]
    fn test_empty_input_is_format_error() {
        assert_eq!(ingest("").unwrap_err().error_code(), "FORMAT_ERROR");
        assert_eq!(ingest("  \n\n").unwrap_err().error_code(), "FORMAT_ERROR");
    }

    #[test]
    fn test_invalid_utf8_is_format_error() {
        let err = ingest_bytes(&[0x61, 0x0A, 0xFF, 0xFE], "bin.csv", &IngestConfig::default())
            .unwrap_err();
        assert_eq!(err.error_code(), "FORMAT_ERROR");
    }

    #[test]
    fn test_duplicate_and_empty_headers_rejected() {
        let err = ingest("Age,age\n1,2\n").unwrap_err();
        assert!(err.to_string().contains("duplicate column name 'age'"));

        let err = ingest("age,,outcome\n1,2,3\n").unwrap_err();
        assert!(err.to_string().contains("header field 2 is empty"));
    }

    #[test]
    fn test_row_ceiling() {
        let config = IngestConfig::default().with_max_rows(2);
        assert!(ingest_bytes(b"a\n1\n2\n", "ok.csv", &config).is_ok());

        let err = ingest_bytes(b"a\n1\n2\n3\n", "big.csv", &config).unwrap_err();
        assert_eq!(err.error_code(), "INPUT_TOO_LARGE");
    }

    #[test]
    fn test_column_ceiling() {
        let config = IngestConfig::default().with_max_columns(2);
        let err = ingest_bytes(b"a,b,c\n1,2,3\n", "wide.csv", &config).unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::InputTooLarge {
                dimension: "columns",
                limit: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_custom_delimiter() {
        let config = IngestConfig::default().with_delimiter(';');
        let raw = ingest_bytes(b"age;outcome\n25;readmitted\n", "semi.csv", &config).unwrap();
        assert_eq!(raw.width(), 2);
    }

    #[test]
    fn test_long_row_names_the_line() {
        let err = ingest("a,b\n1,2\n3,4,5\n").unwrap_err();
        assert_eq!(err.error_code(), "FORMAT_ERROR");
        let message = err.to_string();
        assert!(message.contains("line 3 has 3 fields, but the header has 2"));
        assert!(!message.contains("truncate_ragged_lines"));
    }

    #[test]
    fn test_short_row_is_padded_with_nulls() {
        let raw = ingest("a,b\n1,2\n3\n").unwrap();
        assert_eq!(raw.height(), 2);
        let b = raw.df().column("b").unwrap().as_materialized_series().clone();
        assert_eq!(b.str().unwrap().get(0), Some("2"));
        assert_eq!(b.str().unwrap().get(1), None);
    }

    #[test]
    fn test_long_record_scan_respects_quotes() {
        assert_eq!(find_long_record("a,b\n\"x,y\",2\n", b','), None);
        assert_eq!(find_long_record("a,b\n\"multi\nline\",2\n\n4,5\n", b','), None);
        assert_eq!(
            find_long_record("a;b\r\n1;2\r\n\r\n3;4;5\r\n", b';'),
            Some(LongRecord {
                line: 4,
                fields: 3,
                expected: 2
            })
        );
    }

    #[test]
    fn test_quoted_fields_keep_delimiters() {
        let raw = ingest("name,condition\n\"Smith, John\",Asthma\n").unwrap();
        let names = raw.df().column("name").unwrap().as_materialized_series().clone();
        assert_eq!(names.str().unwrap().get(0), Some("Smith, John"));
    }
}
