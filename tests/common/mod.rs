#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use sales_lens::{
    data::RawTable,
    normalize::{CanonicalRecord, NormalizeMode, normalize},
    schema::{SchemaReport, infer_schema},
};
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }
}

/// Builds a table from `(column, value)` rows.
pub fn table(rows: &[&[(&str, &str)]]) -> RawTable {
    RawTable::from_records(rows.iter().map(|row| row.iter().copied()))
}

/// Infers the schema of `table` and normalizes it leniently.
pub fn analyze(table: &RawTable) -> (SchemaReport, Vec<CanonicalRecord>) {
    let schema = infer_schema(table);
    let records = normalize(table, &schema.mapping, NormalizeMode::Lenient);
    (schema, records)
}
