//! Shared helpers for parsing cell text and moving values in and out of Series.
//!
//! Ingestion keeps every cell as text; the pipeline and the pages convert
//! through the functions here so that numeric and date parsing agree
//! everywhere.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};

// =============================================================================
// Missing Markers
// =============================================================================

/// Cell values treated as missing on upload.
pub const DEFAULT_MISSING_MARKERS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

// =============================================================================
// Header Normalization
// =============================================================================

static HEADER_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s\-]+").expect("Invalid regex: header separators"));

/// Normalize a header: `" Date of-Admission "` becomes `"date_of_admission"`.
pub fn normalize_header(raw: &str) -> String {
    HEADER_SEPARATORS
        .replace_all(raw.trim(), "_")
        .to_lowercase()
}

// =============================================================================
// Numeric Parsing
// =============================================================================

/// Characters commonly used in numeric formatting that should be stripped.
pub const NUMERIC_FORMAT_CHARS: [char; 6] = [',', '$', '%', '€', '£', ' '];

/// Clean a string for numeric parsing by removing formatting characters.
pub fn clean_numeric_string(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| !NUMERIC_FORMAT_CHARS.contains(c))
        .collect()
}

/// Parse a cell as a finite number, tolerating currency and thousands separators.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    let cleaned = clean_numeric_string(s);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

// =============================================================================
// Date Parsing
// =============================================================================

/// Accepted date-only formats, tried in order.
pub const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

/// Accepted date-time formats; the time part is discarded.
pub const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

static DATE_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{1,4}[-/.]\d{1,2}[-/.]\d{1,4}([ T]\d{2}:\d{2}:\d{2})?$")
        .expect("Invalid regex: date shape")
});

/// True when a cell is shaped like a date, whether or not it is a real one.
pub fn looks_like_date(s: &str) -> bool {
    DATE_SHAPE.is_match(s.trim())
}

/// Parse a cell as a calendar date using the fixed format list.
pub fn parse_date_string(s: &str) -> Option<NaiveDate> {
    let trimmed = s.trim();
    if !DATE_SHAPE.is_match(trimmed) {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// `num_days_from_ce` of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Days since 1970-01-01, the physical representation of a polars `Date`.
pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

// =============================================================================
// Series Conversion
// =============================================================================

/// Values of any Series as text, nulls preserved.
pub fn series_strings(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let as_str = series.cast(&DataType::String)?;
    Ok(as_str
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

pub fn series_f64(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let as_f64 = series.cast(&DataType::Float64)?;
    Ok(as_f64.f64()?.into_iter().collect())
}

pub fn series_u32(series: &Series) -> PolarsResult<Vec<Option<u32>>> {
    let as_u32 = series.cast(&DataType::UInt32)?;
    Ok(as_u32.u32()?.into_iter().collect())
}

/// Values of a `Date` Series as calendar dates.
pub fn series_dates(series: &Series) -> PolarsResult<Vec<Option<NaiveDate>>> {
    let days = series.cast(&DataType::Int32)?;
    Ok(days
        .i32()?
        .into_iter()
        .map(|d| d.and_then(days_to_date))
        .collect())
}

/// Build a polars `Date` Series from calendar dates.
pub fn date_series(name: &str, values: &[Option<NaiveDate>]) -> PolarsResult<Series> {
    let days: Vec<Option<i32>> = values.iter().map(|d| d.map(date_to_days)).collect();
    Series::new(name.into(), days).cast(&DataType::Date)
}

/// `true` for each row that is not an exact copy of an earlier row.
pub fn first_occurrence_mask(df: &DataFrame) -> PolarsResult<Vec<bool>> {
    let columns = df
        .get_columns()
        .iter()
        .map(|c| series_strings(c.as_materialized_series()))
        .collect::<PolarsResult<Vec<_>>>()?;

    let mut seen: HashSet<Vec<Option<&str>>> = HashSet::with_capacity(df.height());
    let mask = (0..df.height())
        .map(|row| {
            let key: Vec<Option<&str>> = columns.iter().map(|c| c[row].as_deref()).collect();
            seen.insert(key)
        })
        .collect();
    Ok(mask)
}

// =============================================================================
// Frequencies
// =============================================================================

/// Count occurrences, sorted by count descending then value ascending.
pub fn value_counts<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    let mut sorted: Vec<(String, usize)> =
        counts.into_iter().map(|(v, c)| (v.to_string(), c)).collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted
}

/// Most frequent value; ties go to the lexicographically smallest.
pub fn string_mode<'a>(values: impl IntoIterator<Item = &'a str>) -> Option<String> {
    value_counts(values).into_iter().next().map(|(v, _)| v)
}

/// Most frequent number; ties go to the smallest.
pub fn numeric_mode(values: &[f64]) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut best: Option<(f64, usize)> = None;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i + 1;
        while j < sorted.len() && sorted[j] == sorted[i] {
            j += 1;
        }
        let run = j - i;
        if best.is_none_or(|(_, count)| run > count) {
            best = Some((sorted[i], run));
        }
        i = j;
    }
    best.map(|(v, _)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("Date of Admission"), "date_of_admission");
        assert_eq!(normalize_header(" Blood-Type "), "blood_type");
        assert_eq!(normalize_header("Billing  Amount"), "billing_amount");
        assert_eq!(normalize_header("age"), "age");
    }

    #[test]
    fn test_clean_numeric_string() {
        assert_eq!(clean_numeric_string("$1,234.56"), "1234.56");
        assert_eq!(clean_numeric_string("  42%  "), "42");
        assert_eq!(clean_numeric_string("€100"), "100");
    }

    #[test]
    fn test_parse_numeric_string() {
        assert_eq!(parse_numeric_string("42"), Some(42.0));
        assert_eq!(parse_numeric_string("$1,234.56"), Some(1234.56));
        assert_eq!(parse_numeric_string("-100"), Some(-100.0));
        assert_eq!(parse_numeric_string(""), None);
        assert_eq!(parse_numeric_string("inf"), None);
        assert_eq!(parse_numeric_string("Cancer"), None);
    }

    #[test]
    fn test_parse_date_string() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15);
        assert_eq!(parse_date_string("2024-03-15"), expected);
        assert_eq!(parse_date_string("2024/03/15"), expected);
        assert_eq!(parse_date_string("03/15/2024"), expected);
        assert_eq!(parse_date_string("15.03.2024"), expected);
        assert_eq!(parse_date_string("2024-03-15 08:30:00"), expected);
        assert_eq!(parse_date_string("2024-03-15T08:30:00"), expected);
        assert_eq!(parse_date_string("2024-13-45"), None);
        assert_eq!(parse_date_string("March 15"), None);
        assert_eq!(parse_date_string("42"), None);
    }

    #[test]
    fn test_date_days_conversion() {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(date_to_days(epoch), 0);
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(days_to_date(date_to_days(date)), Some(date));
    }

    #[test]
    fn test_date_series() {
        let dates = vec![NaiveDate::from_ymd_opt(2023, 1, 2), None];
        let series = date_series("admitted", &dates).unwrap();
        assert_eq!(series.dtype(), &DataType::Date);
        assert_eq!(series_dates(&series).unwrap(), dates);
    }

    #[test]
    fn test_first_occurrence_mask() {
        let df = df![
            "a" => [Some("x"), Some("x"), Some("y"), None, None],
            "b" => [1, 1, 1, 2, 2],
        ]
        .unwrap();
        assert_eq!(
            first_occurrence_mask(&df).unwrap(),
            vec![true, false, true, true, false]
        );
    }

    #[test]
    fn test_modes_break_ties_deterministically() {
        assert_eq!(string_mode(["b", "a", "b", "a"]), Some("a".to_string()));
        assert_eq!(string_mode(["x", "y", "y"]), Some("y".to_string()));
        assert_eq!(string_mode(Vec::<&str>::new()), None);
        assert_eq!(numeric_mode(&[3.0, 1.0, 3.0, 1.0, 2.0]), Some(1.0));
        assert_eq!(numeric_mode(&[5.0, 2.0, 5.0]), Some(5.0));
        assert_eq!(numeric_mode(&[]), None);
    }

    #[test]
    fn test_value_counts_order() {
        let counts = value_counts(["Male", "Female", "Female", "Other"]);
        assert_eq!(counts[0], ("Female".to_string(), 2));
        assert_eq!(counts[1], ("Male".to_string(), 1));
        assert_eq!(counts[2], ("Other".to_string(), 1));
    }
}
