//! Schema inference over a whole [`RawTable`].
//!
//! Every column is classified in header order from a bounded row sample. The
//! resulting [`ColumnMapping`] keeps, for each canonical role, the first
//! column that claimed it; later claimants stay visible in
//! [`SchemaReport::per_column`] so callers can surface the ambiguity.

use std::collections::BTreeMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    classify::{self, DataType, Role, Thresholds},
    config::AnalysisConfig,
    data::{Cell, RawTable},
};

/// Result of classifying a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInference {
    pub column_name: String,
    pub inferred_role: Role,
    pub data_type: DataType,
    pub sample_values: Vec<Cell>,
}

/// Canonical role to source column, at most one column per role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping {
    columns: BTreeMap<Role, String>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `column` for `role` unless the role is already mapped or is
    /// [`Role::Other`]. Returns whether the mapping changed.
    pub fn insert_first(&mut self, role: Role, column: &str) -> bool {
        if !role.is_canonical() || self.columns.contains_key(&role) {
            return false;
        }
        self.columns.insert(role, column.to_string());
        true
    }

    /// Sets `role` to `column`, replacing any previous choice.
    pub fn assign(&mut self, role: Role, column: impl Into<String>) {
        if role.is_canonical() {
            self.columns.insert(role, column.into());
        }
    }

    pub fn get(&self, role: Role) -> Option<&str> {
        self.columns.get(&role).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, &str)> {
        self.columns.iter().map(|(role, column)| (*role, column.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceStats {
    pub total_rows: usize,
    pub sampled_rows: usize,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaReport {
    pub mapping: ColumnMapping,
    pub per_column: Vec<ColumnInference>,
    pub stats: InferenceStats,
}

impl SchemaReport {
    pub fn column(&self, name: &str) -> Option<&ColumnInference> {
        self.per_column.iter().find(|c| c.column_name == name)
    }

    /// Roles claimed by more than one column, with every claimant in table
    /// order. The first claimant is the mapped one.
    pub fn ambiguous_roles(&self) -> Vec<(Role, Vec<&str>)> {
        let mut claimants: BTreeMap<Role, Vec<&str>> = BTreeMap::new();
        for inference in &self.per_column {
            if inference.inferred_role.is_canonical() {
                claimants
                    .entry(inference.inferred_role)
                    .or_default()
                    .push(inference.column_name.as_str());
            }
        }
        claimants
            .into_iter()
            .filter(|(_, columns)| columns.len() > 1)
            .collect()
    }

    /// Canonical roles no column was classified into.
    pub fn unmapped_roles(&self) -> Vec<Role> {
        Role::CANONICAL
            .into_iter()
            .filter(|role| self.mapping.get(*role).is_none())
            .collect()
    }
}

/// Infers the schema of `table` with the default configuration.
pub fn infer_schema(table: &RawTable) -> SchemaReport {
    infer_schema_with(table, &AnalysisConfig::default())
}

pub fn infer_schema_with(table: &RawTable, config: &AnalysisConfig) -> SchemaReport {
    if table.is_empty() {
        debug!("Schema inference skipped: table has no rows");
        return SchemaReport::default();
    }

    let thresholds = Thresholds {
        role_ratio: config.numeric_role_ratio,
        type_ratio: config.numeric_type_ratio,
    };
    let sampled_rows = table.len().min(config.sample_rows);

    let per_column = table
        .headers()
        .iter()
        .map(|column| {
            let sample = table.column_sample(column, config.sample_rows);
            let inferred_role = classify::classify_with(column, &sample, &thresholds);
            let data_type = classify::detect_data_type_with(&sample, thresholds.type_ratio);
            debug!("{column} → {inferred_role} ({data_type})");
            ColumnInference {
                column_name: column.clone(),
                inferred_role,
                data_type,
                sample_values: sample.into_iter().take(config.sample_values).collect(),
            }
        })
        .collect::<Vec<_>>();

    let mut mapping = ColumnMapping::new();
    for inference in &per_column {
        mapping.insert_first(inference.inferred_role, &inference.column_name);
    }

    let report = SchemaReport {
        mapping,
        per_column,
        stats: InferenceStats {
            total_rows: table.len(),
            sampled_rows,
            columns: table.headers().to_vec(),
        },
    };
    for (role, columns) in report.ambiguous_roles() {
        warn!(
            "Role '{role}' claimed by {} columns; using '{}'",
            columns.len(),
            columns[0]
        );
    }
    report
}
