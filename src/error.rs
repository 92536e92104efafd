use thiserror::Error;

/// Input that cannot be read as a table at all. Problems inside individual
/// cells are never errors; they degrade to fallbacks during normalization.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("expected a JSON array of rows, found {found}")]
    NotAnArray { found: &'static str },
    #[error("row {row} must be a JSON object or array, found {found}")]
    InvalidRow { row: usize, found: &'static str },
    #[error("value rows require a header row as their first element")]
    MissingHeader,
    #[error("row {row}, column '{column}' holds a nested {found}")]
    NestedValue {
        row: usize,
        column: String,
        found: &'static str,
    },
    #[error("cannot mix object rows and value rows")]
    MixedRowShapes,
}
