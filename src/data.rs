//! Raw cells, rows and tables as they arrive from an ingestion source.
//!
//! A [`RawTable`] is an ordered header list plus rows keyed by column name.
//! Cells stay close to what the source delivered: spreadsheet numbers become
//! [`Cell::Number`], everything textual stays [`Cell::Text`] and blanks become
//! [`Cell::Empty`]. Numeric and date interpretation happens lazily through the
//! parsing helpers in this module so the same cell can be read as a label by
//! one query and as an amount by another.

use std::{borrow::Cow, collections::BTreeMap, fmt};

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A single spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    #[default]
    Empty,
}

/// One row of a [`RawTable`], keyed by column name.
pub type RawRow = BTreeMap<String, Cell>;

impl Cell {
    /// Builds a cell from raw text, trimming whitespace and mapping blanks to
    /// [`Cell::Empty`].
    pub fn from_raw(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(trimmed.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(text) => text.trim().is_empty(),
            Cell::Number(value) => value.is_nan(),
        }
    }

    /// Numeric reading of the cell. `None` for blanks and anything that does
    /// not parse as a finite number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(value) if value.is_finite() => Some(*value),
            Cell::Number(_) | Cell::Empty => None,
            Cell::Text(text) => parse_number(text),
        }
    }

    /// Numeric reading with malformed and missing values coerced to zero.
    pub fn number_or_zero(&self) -> f64 {
        self.as_number().unwrap_or(0.0)
    }

    /// Textual reading of the cell, `None` when blank.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Cell::Text(text) => {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then_some(Cow::Borrowed(trimmed))
            }
            Cell::Number(value) if !value.is_nan() => Some(Cow::Owned(format_number(*value))),
            Cell::Number(_) | Cell::Empty => None,
        }
    }

    pub fn as_display(&self) -> String {
        self.as_text().map(Cow::into_owned).unwrap_or_default()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::from_raw(value)
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::from_raw(&value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Number(value as f64)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Empty)
    }
}

/// An ingested table: header names in declaration order plus the rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<RawRow>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<RawRow>) -> Self {
        Self { headers, rows }
    }

    /// Builds a table from rows of `(column, cell)` pairs. Header order is the
    /// order in which column names are first seen across all rows.
    pub fn from_records<I, R, K, V>(records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Cell>,
    {
        let mut headers: Vec<String> = Vec::new();
        let mut rows = Vec::new();
        for record in records {
            let mut row = RawRow::new();
            for (key, value) in record {
                let key = key.into();
                if !headers.contains(&key) {
                    headers.push(key.clone());
                }
                row.insert(key, value.into());
            }
            rows.push(row);
        }
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[RawRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The first `limit` rows, or every row when the table is smaller.
    pub fn sample(&self, limit: usize) -> &[RawRow] {
        &self.rows[..self.rows.len().min(limit)]
    }

    /// Values of `column` across the first `limit` rows. Rows lacking the
    /// column contribute [`Cell::Empty`].
    pub fn column_sample(&self, column: &str, limit: usize) -> Vec<Cell> {
        self.sample(limit)
            .iter()
            .map(|row| row.get(column).cloned().unwrap_or_default())
            .collect()
    }
}

/// True when every cell in the row is blank.
pub fn row_is_blank(row: &RawRow) -> bool {
    row.values().all(Cell::is_empty)
}

/// Locale-agnostic number parsing. The trimmed text must be a complete
/// decimal literal; `NaN` and infinity spellings are rejected.
pub fn parse_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    let unsigned = trimmed
        .strip_prefix(['+', '-'])
        .unwrap_or(trimmed);
    match unsigned.chars().next() {
        Some(c) if c.is_ascii_digit() || c == '.' => {}
        _ => return None,
    }
    trimmed.parse::<f64>().ok().filter(|parsed| parsed.is_finite())
}

pub fn parse_naive_date(value: &str) -> Option<NaiveDate> {
    const DATE_FORMATS: &[&str] = &[
        "%Y-%m-%d",
        "%m/%d/%Y",
        "%d/%m/%Y",
        "%Y/%m/%d",
        "%d-%m-%Y",
        "%d.%m.%Y",
        "%b %d, %Y",
        "%B %d, %Y",
        "%d %b %Y",
        "%d %B %Y",
        "%d-%b-%y",
        "%d-%b-%Y",
        "%b %d %Y",
        "%B %d %Y",
    ];
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

pub fn parse_naive_datetime(value: &str) -> Option<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%m/%d/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%m/%d/%Y %H:%M",
        "%m/%d/%Y %I:%M %p",
        "%m/%d/%Y %I:%M:%S %p",
    ];
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

/// Spreadsheet serial day numbers (days since 1899-12-30) in this range are
/// read as dates when a date column holds plain numbers.
const SERIAL_DAY_RANGE: std::ops::RangeInclusive<f64> = 1.0..=2_958_465.0;

/// Reads a cell as a calendar date. Accepts ISO-8601/RFC 3339 timestamps,
/// the common day/month/year layouts and spreadsheet serial day numbers,
/// whether stored as numbers or as their text.
pub fn parse_cell_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Number(serial) if SERIAL_DAY_RANGE.contains(serial) => {
            spreadsheet_serial_date(*serial)
        }
        Cell::Number(_) | Cell::Empty => None,
        Cell::Text(text) => parse_date_text(text.trim()),
    }
}

fn parse_date_text(value: &str) -> Option<NaiveDate> {
    if value.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.date_naive());
    }
    parse_naive_date(value)
        .or_else(|| parse_naive_datetime(value).map(|dt| dt.date()))
        .or_else(|| parse_month_only(value))
        .or_else(|| {
            parse_number(value)
                .filter(|serial| SERIAL_DAY_RANGE.contains(serial))
                .and_then(spreadsheet_serial_date)
        })
}

/// Month-only values such as `2024-01` or `Jan 2024` land on the first of the
/// month.
fn parse_month_only(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("1 {value}"), "%d %b %Y"))
        .or_else(|_| NaiveDate::parse_from_str(&format!("1 {value}"), "%d %B %Y"))
        .ok()
}

fn spreadsheet_serial_date(serial: f64) -> Option<NaiveDate> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

/// Calendar month bucket used by time series, e.g. `Jan 2024`.
pub fn month_label(date: NaiveDate) -> String {
    date.format("%b %Y").to_string()
}

/// `(year, month)` key for chronological ordering of month buckets.
pub fn month_key(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

/// Renders a number without a trailing `.0` for whole values.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}
