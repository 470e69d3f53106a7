//! Loading cleaned JSON files into the document store

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::application::{ApplicationError, ApplicationResult, IoResultExt, JsonResultExt};
use crate::config::Settings;
use crate::infrastructure::store::DocumentStore;
use crate::infrastructure::traits::FileSystem;

/// What happened to one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// Collection replaced with this many documents
    Loaded(usize),
    /// No `<collection>.json` in the cleaned directory
    Missing,
    /// File holds an empty array, empty object or null
    Empty,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub collections: Vec<(String, LoadStatus)>,
}

impl LoadSummary {
    pub fn documents(&self) -> usize {
        self.collections
            .iter()
            .map(|(_, status)| match status {
                LoadStatus::Loaded(n) => *n,
                _ => 0,
            })
            .sum()
    }
}

/// Replaces store collections with the content of cleaned JSON files.
pub struct LoadService {
    fs: Arc<dyn FileSystem>,
    store: Arc<dyn DocumentStore>,
    settings: Arc<Settings>,
}

impl LoadService {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        store: Arc<dyn DocumentStore>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            fs,
            store,
            settings,
        }
    }

    /// Load every configured collection from `cleaned_dir`.
    pub fn load_all(&self) -> ApplicationResult<LoadSummary> {
        self.store.ping()?;
        let dir = self.settings.cleaned_dir();
        debug!("load_all: cleaned_dir={}", dir.display());

        let mut summary = LoadSummary::default();
        for collection in &self.settings.collections {
            let path = dir.join(format!("{collection}.json"));
            let status = self.load_file(collection, &path)?;
            summary.collections.push((collection.clone(), status));
        }
        Ok(summary)
    }

    /// Replace `collection` with the documents in `path`.
    pub fn load_file(&self, collection: &str, path: &Path) -> ApplicationResult<LoadStatus> {
        if !self.fs.is_file(path) {
            warn!("file not found, skipping: {}", path.display());
            return Ok(LoadStatus::Missing);
        }

        let content = self
            .fs
            .read_to_string(path)
            .with_path_context("read cleaned data", path)?;
        let data: Value =
            serde_json::from_str(&content).with_path_context("parse cleaned data", path)?;

        let docs = match data {
            Value::Array(docs) if !docs.is_empty() => docs,
            Value::Object(map) if !map.is_empty() => vec![Value::Object(map)],
            Value::Array(_) | Value::Object(_) | Value::Null => {
                warn!("file is empty, skipping: {}", path.display());
                return Ok(LoadStatus::Empty);
            }
            _ => {
                return Err(ApplicationError::InvalidInput {
                    path: path.to_path_buf(),
                    message: "expected a JSON array or object".to_string(),
                })
            }
        };

        let count = self.store.replace_collection(collection, docs)?;
        info!("{} -> {} ({} documents)", path.display(), collection, count);
        Ok(LoadStatus::Loaded(count))
    }
}
