//! Tunable thresholds and fallbacks for inference and normalization.
//!
//! Every field has a default matching the documented behavior; a YAML file
//! passed with `--config` may override any subset of them.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::normalize::NormalizeMode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Rows sampled per column for role and type detection.
    pub sample_rows: usize,
    /// Share of sampled cells that must be numeric for a `number` column.
    pub numeric_type_ratio: f64,
    /// Share of non-empty sampled cells that must be numeric before a
    /// quantity or revenue name is accepted.
    pub numeric_role_ratio: f64,
    /// Number of sample values retained per column for diagnostics.
    pub sample_values: usize,
    /// Customer fallback used by lenient normalization.
    pub lenient_customer_fallback: String,
    /// Customer fallback used by strict normalization.
    pub strict_customer_fallback: String,
    /// Entries kept in summary top lists.
    pub summary_top: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rows: 100,
            numeric_type_ratio: 0.7,
            numeric_role_ratio: 0.5,
            sample_values: 5,
            lenient_customer_fallback: "General".to_string(),
            strict_customer_fallback: "Walk-in".to_string(),
            summary_top: 10,
        }
    }
}

impl AnalysisConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: AnalysisConfig = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config file {path:?}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: AnalysisConfig =
            serde_yaml::from_str(contents).context("Parsing config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.sample_rows > 0, "sample_rows must be greater than zero");
        ensure!(
            (0.0..=1.0).contains(&self.numeric_type_ratio),
            "numeric_type_ratio must be between 0 and 1"
        );
        ensure!(
            (0.0..=1.0).contains(&self.numeric_role_ratio),
            "numeric_role_ratio must be between 0 and 1"
        );
        Ok(())
    }

    pub fn customer_fallback(&self, mode: NormalizeMode) -> &str {
        match mode {
            NormalizeMode::Strict => &self.strict_customer_fallback,
            NormalizeMode::Lenient => &self.lenient_customer_fallback,
        }
    }
}
