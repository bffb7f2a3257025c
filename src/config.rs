use crate::chart::ChartOptions;
use crate::csv_reader::{EncodingCandidate, DEFAULT_ENCODINGS};
use crate::error::ConfigError;
use crate::normalize::{RenameMap, SEOUL_SALES_RENAMES};
use crate::schema::{MeasureMatcher, DEFAULT_MEASURE_TOKENS};
use crate::RenderOptions;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Everything the dashboard core reads from configuration. Every field has a
/// default, so an empty JSON object is a valid config.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DashboardConfig {
    /// CSV read when no input is given on the command line.
    #[serde(default)]
    pub default_input: Option<PathBuf>,
    #[serde(default = "default_encodings")]
    pub encodings: Vec<EncodingCandidate>,
    /// Source header → display name. `None` uses the built-in Seoul map.
    #[serde(default)]
    pub renames: Option<BTreeMap<String, String>>,
    #[serde(default = "default_measure_tokens")]
    pub measure_tokens: Vec<String>,
    /// Initial selections; columns not listed start with every value selected.
    #[serde(default)]
    pub default_filters: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_categorical_threshold")]
    pub categorical_threshold: usize,
    #[serde(default = "default_max_categories")]
    pub max_chart_categories: usize,
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default)]
    pub render: RenderOptions,
}

fn default_encodings() -> Vec<EncodingCandidate> { DEFAULT_ENCODINGS.to_vec() }
fn default_measure_tokens() -> Vec<String> {
    DEFAULT_MEASURE_TOKENS.iter().map(|s| s.to_string()).collect()
}
fn default_categorical_threshold() -> usize { 50 }
fn default_max_categories() -> usize { 200 }
fn default_preview_rows() -> usize { 10 }
fn default_cache_capacity() -> usize { 8 }

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            default_input: None,
            encodings: default_encodings(),
            renames: None,
            measure_tokens: default_measure_tokens(),
            default_filters: BTreeMap::new(),
            categorical_threshold: default_categorical_threshold(),
            max_chart_categories: default_max_categories(),
            preview_rows: default_preview_rows(),
            cache_capacity: default_cache_capacity(),
            render: RenderOptions::default(),
        }
    }
}

impl DashboardConfig {
    /// Read a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config '{}'", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config '{}'", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.encodings.is_empty() {
            return Err(ConfigError::NoEncodings);
        }
        self.rename_map()?;
        Ok(())
    }

    pub fn rename_map(&self) -> Result<RenameMap, ConfigError> {
        match &self.renames {
            Some(map) => RenameMap::new(map),
            None => Ok(SEOUL_SALES_RENAMES.clone()),
        }
    }

    pub fn measure_matcher(&self) -> MeasureMatcher {
        MeasureMatcher::new(&self.measure_tokens)
    }

    pub fn chart_options(&self) -> ChartOptions {
        ChartOptions {
            max_categories: self.max_chart_categories,
            measures: self.measure_matcher(),
            title: None,
        }
    }
}
