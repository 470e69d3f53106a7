//! Cleaning of raw tab-delimited tables into JSON record files

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::application::{ApplicationResult, IoResultExt, JsonResultExt};
use crate::config::{DatasetConfig, Settings};
use crate::domain::clean_table;
use crate::infrastructure::traits::FileSystem;

/// Result of converting one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedDataset {
    pub name: String,
    pub output: PathBuf,
    pub records: usize,
    /// Configured columns missing from the source header
    pub missing_columns: Vec<String>,
}

/// Converts configured datasets from `raw_dir` into `cleaned_dir`.
pub struct ConvertService {
    fs: Arc<dyn FileSystem>,
    settings: Arc<Settings>,
}

impl ConvertService {
    pub fn new(fs: Arc<dyn FileSystem>, settings: Arc<Settings>) -> Self {
        Self { fs, settings }
    }

    /// Convert all configured datasets, or only those named in `only`.
    pub fn convert_all(&self, only: &[String]) -> ApplicationResult<Vec<ConvertedDataset>> {
        let selected: Vec<&DatasetConfig> = self
            .settings
            .datasets
            .iter()
            .filter(|d| only.is_empty() || only.contains(&d.name))
            .collect();
        debug!("convert_all: {} datasets selected", selected.len());

        for name in only {
            if !self.settings.datasets.iter().any(|d| &d.name == name) {
                warn!("no dataset named {} in configuration", name);
            }
        }

        selected.into_iter().map(|d| self.convert(d)).collect()
    }

    /// Clean one dataset and write `<cleaned_dir>/<name>.json`.
    #[instrument(level = "debug", skip(self, dataset), fields(dataset = %dataset.name))]
    pub fn convert(&self, dataset: &DatasetConfig) -> ApplicationResult<ConvertedDataset> {
        let source = self.settings.raw_dir().join(&dataset.source);
        let output = self
            .settings
            .cleaned_dir()
            .join(format!("{}.json", dataset.name));

        let content = self
            .fs
            .read_to_string(&source)
            .with_path_context("read table", &source)?;
        let table = clean_table(&content, &dataset.columns, &source)?;

        let missing_columns: Vec<String> = dataset
            .columns
            .iter()
            .filter(|c| !table.columns.contains(c))
            .cloned()
            .collect();
        if !missing_columns.is_empty() {
            warn!(
                "{}: columns not in source header: {}",
                source.display(),
                missing_columns.join(", ")
            );
        }

        let records = table.records.len();
        let json = serde_json::to_string_pretty(&Value::Array(table.records))
            .with_path_context("serialize records", &output)?;
        self.fs
            .write_all_dirs(&output, &json)
            .with_path_context("write cleaned data", &output)?;

        info!("{} -> {} ({} records)", source.display(), output.display(), records);
        Ok(ConvertedDataset {
            name: dataset.name.clone(),
            output,
            records,
            missing_columns,
        })
    }
}
