//! Loading raw tables from delimited files and JSON exports.
//!
//! This is the file-acquisition edge of the crate. It provides:
//!
//! - **Delimiter resolution**: extension-based auto-detection (`.tsv` → tab,
//!   everything else → comma) with manual override support.
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8.
//! - **JSON ingestion**: an array of row objects, or a spreadsheet-API style
//!   array of value rows whose first row holds the headers.
//! - **stdin/stdout**: the `-` path convention routes through standard streams.
//!
//! Header cells are trimmed; blank headers get a positional `field_N` name and
//! repeated headers get a numeric suffix so every column keeps its own key.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use itertools::Itertools;
use log::debug;
use serde_json::Value as JsonValue;

use crate::{
    data::{Cell, RawRow, RawTable},
    error::IngestError,
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn is_json_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    if is_dash(path) {
        Ok(Box::new(std::io::stdin().lock()))
    } else {
        Ok(Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        )))
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_writer(path: Option<&Path>, delimiter: u8) -> Result<csv::Writer<Box<dyn Write>>> {
    let writer: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout()),
    };
    let mut builder = csv::WriterBuilder::new();
    builder.delimiter(delimiter).double_quote(true);
    Ok(builder.from_writer(writer))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

/// Trims header names and makes them unique and non-empty.
pub fn sanitize_headers<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut headers: Vec<String> = Vec::new();
    for (idx, header) in raw.into_iter().enumerate() {
        let trimmed = header.as_ref().trim();
        let base = if trimmed.is_empty() {
            format!("field_{idx}")
        } else {
            trimmed.to_string()
        };
        let mut candidate = base.clone();
        let mut suffix = 1;
        while headers.contains(&candidate) {
            candidate = format!("{base}_{suffix}");
            suffix += 1;
        }
        headers.push(candidate);
    }
    headers
}

/// Reads a delimited file with a header row into a [`RawTable`]. Short rows
/// are padded with empty cells and surplus cells are ignored.
pub fn read_csv_table(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<RawTable> {
    let mut reader = open_csv_reader(open_input(path)?, delimiter);
    let header_record = reader
        .byte_headers()
        .with_context(|| format!("Reading headers from {path:?}"))?
        .clone();
    let headers = sanitize_headers(decode_record(&header_record, encoding)?);

    let mut rows = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
        let decoded = decode_record(&record, encoding)
            .with_context(|| format!("Decoding row {}", row_idx + 2))?;
        let row: RawRow = headers
            .iter()
            .enumerate()
            .map(|(idx, header)| {
                let cell = decoded.get(idx).map(|raw| Cell::from_raw(raw)).unwrap_or_default();
                (header.clone(), cell)
            })
            .collect();
        rows.push(row);
    }
    debug!(
        "Read {} row(s) across {} column(s) from {path:?}",
        rows.len(),
        headers.len()
    );
    Ok(RawTable::new(headers, rows))
}

pub fn read_json_table(path: &Path) -> Result<RawTable> {
    let value: JsonValue = serde_json::from_reader(open_input(path)?)
        .with_context(|| format!("Parsing JSON from {path:?}"))?;
    let table = table_from_json(&value).with_context(|| format!("Reading rows from {path:?}"))?;
    Ok(table)
}

/// Loads `path` as JSON when it has a `.json` extension, otherwise as a
/// delimited file.
pub fn read_table(
    path: &Path,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<RawTable> {
    if is_json_path(path) {
        read_json_table(path)
    } else {
        read_csv_table(path, resolve_input_delimiter(path, delimiter), encoding)
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn json_cell(value: &JsonValue, row: usize, column: &str) -> Result<Cell, IngestError> {
    match value {
        JsonValue::Null => Ok(Cell::Empty),
        JsonValue::Bool(b) => Ok(Cell::Text(b.to_string())),
        JsonValue::Number(n) => Ok(n.as_f64().map(Cell::Number).unwrap_or_default()),
        JsonValue::String(s) => Ok(Cell::from_raw(s)),
        JsonValue::Array(_) | JsonValue::Object(_) => Err(IngestError::NestedValue {
            row,
            column: column.to_string(),
            found: json_kind(value),
        }),
    }
}

/// Converts a JSON document into a [`RawTable`].
///
/// Accepts either `[{"col": value, ...}, ...]`, where header order is the
/// order keys are first seen, or `[["col", ...], [value, ...], ...]`, where
/// the first row names the columns.
pub fn table_from_json(value: &JsonValue) -> Result<RawTable, IngestError> {
    let rows = value.as_array().ok_or(IngestError::NotAnArray {
        found: json_kind(value),
    })?;
    match rows.first() {
        None => Ok(RawTable::default()),
        Some(JsonValue::Array(_)) => table_from_value_rows(rows),
        Some(JsonValue::Object(_)) => table_from_object_rows(rows),
        Some(other) => Err(IngestError::InvalidRow {
            row: 1,
            found: json_kind(other),
        }),
    }
}

fn table_from_object_rows(rows: &[JsonValue]) -> Result<RawTable, IngestError> {
    let mut objects = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        match row {
            JsonValue::Object(object) => objects.push(object),
            JsonValue::Array(_) => return Err(IngestError::MixedRowShapes),
            other => {
                return Err(IngestError::InvalidRow {
                    row: idx + 1,
                    found: json_kind(other),
                });
            }
        }
    }

    let keys: Vec<&String> = objects
        .iter()
        .flat_map(|object| object.keys())
        .unique()
        .collect();
    let headers = sanitize_headers(&keys);

    let mut table_rows = Vec::with_capacity(objects.len());
    for (idx, object) in objects.iter().enumerate() {
        let mut raw = RawRow::new();
        for (key, header) in keys.iter().zip(&headers) {
            let cell = match object.get(key.as_str()) {
                Some(value) => json_cell(value, idx + 1, header)?,
                None => Cell::Empty,
            };
            raw.insert(header.clone(), cell);
        }
        table_rows.push(raw);
    }
    Ok(RawTable::new(headers, table_rows))
}

fn table_from_value_rows(rows: &[JsonValue]) -> Result<RawTable, IngestError> {
    let header_row = rows
        .first()
        .and_then(JsonValue::as_array)
        .ok_or(IngestError::MissingHeader)?;
    let header_text = header_row
        .iter()
        .map(|cell| match cell {
            JsonValue::String(s) => s.clone(),
            JsonValue::Null => String::new(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>();
    let headers = sanitize_headers(&header_text);

    let mut table_rows = Vec::with_capacity(rows.len().saturating_sub(1));
    for (idx, row) in rows.iter().enumerate().skip(1) {
        let values = match row {
            JsonValue::Array(values) => values,
            JsonValue::Object(_) => return Err(IngestError::MixedRowShapes),
            other => {
                return Err(IngestError::InvalidRow {
                    row: idx + 1,
                    found: json_kind(other),
                });
            }
        };
        let mut raw = RawRow::new();
        for (col_idx, header) in headers.iter().enumerate() {
            let cell = match values.get(col_idx) {
                Some(value) => json_cell(value, idx + 1, header)?,
                None => Cell::Empty,
            };
            raw.insert(header.clone(), cell);
        }
        table_rows.push(raw);
    }
    Ok(RawTable::new(headers, table_rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Role;
    use serde_json::json;

    #[test]
    fn resolves_delimiter_from_extension() {
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), None), b'\t');
        assert_eq!(resolve_input_delimiter(Path::new("a.TSV"), None), b'\t');
        assert_eq!(resolve_input_delimiter(Path::new("a.csv"), None), b',');
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), Some(b';')), b';');
    }

    #[test]
    fn sanitize_headers_names_blanks_and_suffixes_duplicates() {
        let headers = sanitize_headers([" Region ", "", "Qty", "Qty", "Qty"]);
        assert_eq!(headers, vec!["Region", "field_1", "Qty", "Qty_1", "Qty_2"]);
    }

    #[test]
    fn object_rows_keep_first_seen_key_order() {
        let table = table_from_json(&json!([
            {"Region": "Afar", "Total_Sales": 0, "Quantity": "5"},
            {"Region": null, "Extra": true}
        ]))
        .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.headers(),
            &["Region", "Total_Sales", "Quantity", "Extra"]
        );
        assert_eq!(table.rows()[0]["Total_Sales"], Cell::Number(0.0));
        assert_eq!(table.rows()[0]["Extra"], Cell::Empty);
        assert_eq!(table.rows()[1]["Region"], Cell::Empty);
        assert_eq!(table.rows()[1]["Extra"], Cell::from("true"));
    }

    #[test]
    fn object_key_order_decides_which_column_maps_first() {
        let table = table_from_json(&json!([
            {"Unit Price": 5, "List Price": 6, "Zone": "A", "City": "B"}
        ]))
        .unwrap();
        assert_eq!(
            table.headers(),
            &["Unit Price", "List Price", "Zone", "City"]
        );
        let schema = crate::schema::infer_schema(&table);
        assert_eq!(schema.mapping.get(Role::Revenue), Some("Unit Price"));
    }

    #[test]
    fn object_keys_are_sanitized_without_losing_values() {
        let table = table_from_json(&json!([{"Qty": 1, "Qty ": 2, "": "x"}])).unwrap();
        assert_eq!(table.headers(), &["Qty", "Qty_1", "field_2"]);
        let row = &table.rows()[0];
        assert_eq!(row["Qty"], Cell::Number(1.0));
        assert_eq!(row["Qty_1"], Cell::Number(2.0));
        assert_eq!(row["field_2"], Cell::from("x"));
    }

    #[test]
    fn value_rows_use_first_row_as_headers() {
        let table = table_from_json(&json!([
            ["Product Name", "Qty"],
            ["Widget", 3],
            ["Gadget"]
        ]))
        .unwrap();
        assert_eq!(table.headers(), &["Product Name", "Qty"]);
        assert_eq!(table.rows()[0]["Qty"], Cell::Number(3.0));
        assert_eq!(table.rows()[1]["Qty"], Cell::Empty);
    }

    #[test]
    fn rejects_structurally_invalid_json() {
        assert_eq!(
            table_from_json(&json!({"rows": []})).unwrap_err(),
            IngestError::NotAnArray { found: "object" }
        );
        assert_eq!(
            table_from_json(&json!([1, 2])).unwrap_err(),
            IngestError::InvalidRow { row: 1, found: "number" }
        );
        assert_eq!(
            table_from_json(&json!([{"a": 1}, ["a"]])).unwrap_err(),
            IngestError::MixedRowShapes
        );
        assert!(matches!(
            table_from_json(&json!([{"a": {"b": 1}}])).unwrap_err(),
            IngestError::NestedValue { row: 1, .. }
        ));
    }

    #[test]
    fn empty_json_array_is_an_empty_table() {
        let table = table_from_json(&json!([])).unwrap();
        assert!(table.is_empty());
        assert!(table.headers().is_empty());
    }
}
