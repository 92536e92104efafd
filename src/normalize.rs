//! Record normalization: raw rows plus a [`ColumnMapping`] become
//! [`CanonicalRecord`]s.
//!
//! Every original column is carried along untouched in
//! [`CanonicalRecord::fields`]; the canonical fields sit beside it in a fixed
//! struct. Numeric coercion never fails (malformed amounts read as zero) and
//! unmapped or blank text fields take a sentinel fallback.

use std::fmt;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    classify::Role,
    config::AnalysisConfig,
    data::{Cell, RawRow, RawTable, row_is_blank},
    schema::ColumnMapping,
};

pub const UNKNOWN: &str = "Unknown";
pub const UNCATEGORIZED: &str = "Uncategorized";
pub const GENERAL: &str = "General";
pub const UNSPECIFIED: &str = "Unspecified";

/// Placeholder values that carry no information about the underlying sale.
pub const SENTINELS: &[&str] = &[UNKNOWN, UNCATEGORIZED, GENERAL, UNSPECIFIED];

/// Which rows survive normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizeMode {
    /// Drops rows that carry neither a real product/category nor a positive
    /// amount, and falls back to `Walk-in` for missing customers.
    Strict,
    /// Keeps every row that has at least one non-blank cell.
    #[default]
    Lenient,
}

impl fmt::Display for NormalizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeMode::Strict => f.write_str("strict"),
            NormalizeMode::Lenient => f.write_str("lenient"),
        }
    }
}

/// A normalized sales row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Zero-based position of the source row in the raw table.
    pub row_index: usize,
    pub date: Option<String>,
    pub product: String,
    pub category: String,
    pub quantity: f64,
    pub revenue: f64,
    pub region: String,
    pub customer: String,
    /// Every original column of the source row.
    pub fields: RawRow,
}

impl CanonicalRecord {
    /// Value of a canonical field as a cell. [`Role::Other`] has no canonical
    /// field and reads as empty.
    pub fn canonical(&self, role: Role) -> Cell {
        match role {
            Role::Date => Cell::from(self.date.as_deref()),
            Role::Product => Cell::Text(self.product.clone()),
            Role::Category => Cell::Text(self.category.clone()),
            Role::Quantity => Cell::Number(self.quantity),
            Role::Revenue => Cell::Number(self.revenue),
            Role::Region => Cell::Text(self.region.clone()),
            Role::Customer => Cell::Text(self.customer.clone()),
            Role::Other => Cell::Empty,
        }
    }

    /// Original cell for `column`, if the source row had it.
    pub fn original(&self, column: &str) -> Option<&Cell> {
        self.fields.get(column)
    }
}

/// Row accounting for one normalization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeReport {
    pub total_rows: usize,
    pub empty_rows: usize,
    pub rejected_rows: usize,
    pub valid_rows: usize,
}

/// Normalizes `table` with the default fallbacks.
pub fn normalize(
    table: &RawTable,
    mapping: &ColumnMapping,
    mode: NormalizeMode,
) -> Vec<CanonicalRecord> {
    normalize_with(table, mapping, mode, &AnalysisConfig::default()).0
}

pub fn normalize_with(
    table: &RawTable,
    mapping: &ColumnMapping,
    mode: NormalizeMode,
    config: &AnalysisConfig,
) -> (Vec<CanonicalRecord>, NormalizeReport) {
    let customer_fallback = config.customer_fallback(mode);
    let mut report = NormalizeReport {
        total_rows: table.len(),
        ..NormalizeReport::default()
    };
    let mut records = Vec::with_capacity(table.len());

    for (row_index, row) in table.rows().iter().enumerate() {
        if row_is_blank(row) {
            report.empty_rows += 1;
            continue;
        }
        let mapped = MappedRow { row, mapping };
        if mode == NormalizeMode::Strict && !mapped.passes_strict_gate() {
            debug!("Row {} rejected by strict validity gate", row_index + 1);
            report.rejected_rows += 1;
            continue;
        }
        records.push(mapped.into_record(row_index, customer_fallback));
    }

    report.valid_rows = records.len();
    info!(
        "Normalized {} of {} row(s) in {mode} mode ({} empty, {} rejected)",
        report.valid_rows, report.total_rows, report.empty_rows, report.rejected_rows
    );
    (records, report)
}

struct MappedRow<'a> {
    row: &'a RawRow,
    mapping: &'a ColumnMapping,
}

impl MappedRow<'_> {
    /// The mapped source cell for `role`, ignoring blanks.
    fn cell(&self, role: Role) -> Option<&Cell> {
        let column = self.mapping.get(role)?;
        self.row.get(column).filter(|cell| !cell.is_empty())
    }

    fn text(&self, role: Role) -> Option<String> {
        self.cell(role)
            .and_then(Cell::as_text)
            .map(|text| text.into_owned())
    }

    fn number(&self, role: Role) -> f64 {
        self.cell(role).map(Cell::number_or_zero).unwrap_or(0.0)
    }

    /// Evaluated on the mapped source values before any fallback applies, so a
    /// missing product does not count as a real one.
    fn passes_strict_gate(&self) -> bool {
        self.text(Role::Product).is_some_and(|p| p != UNKNOWN)
            || self.number(Role::Revenue) > 0.0
            || self.number(Role::Quantity) > 0.0
            || self.text(Role::Category).is_some_and(|c| c != GENERAL)
    }

    fn into_record(self, row_index: usize, customer_fallback: &str) -> CanonicalRecord {
        let category = self.text(Role::Category);
        let product = self
            .text(Role::Product)
            .or_else(|| category.clone())
            .unwrap_or_else(|| UNCATEGORIZED.to_string());
        CanonicalRecord {
            row_index,
            date: self.text(Role::Date),
            product,
            category: category.unwrap_or_else(|| GENERAL.to_string()),
            quantity: self.number(Role::Quantity),
            revenue: self.number(Role::Revenue),
            region: self
                .text(Role::Region)
                .unwrap_or_else(|| UNSPECIFIED.to_string()),
            customer: self
                .text(Role::Customer)
                .unwrap_or_else(|| customer_fallback.to_string()),
            fields: self.row.clone(),
        }
    }
}

/// Header row for tabular output: the canonical fields, then every original
/// column. An original whose name collides with a canonical field is
/// suffixed with `_source`.
pub fn output_headers(columns: &[String]) -> Vec<String> {
    Role::CANONICAL
        .iter()
        .map(|role| role.as_str().to_string())
        .chain(columns.iter().map(|column| {
            if Role::CANONICAL.iter().any(|role| role.as_str() == column) {
                format!("{column}_source")
            } else {
                column.clone()
            }
        }))
        .collect()
}

/// Cells of `record` in [`output_headers()`] order.
pub fn output_row(record: &CanonicalRecord, columns: &[String]) -> Vec<String> {
    Role::CANONICAL
        .iter()
        .map(|role| record.canonical(*role).as_display())
        .chain(columns.iter().map(|column| {
            record
                .original(column)
                .map(Cell::as_display)
                .unwrap_or_default()
        }))
        .collect()
}
