//! Rendering of a single JSON document for inspection

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::application::stylesheet::{HtmlStylesheet, Stylesheet};
use crate::application::{ApplicationResult, IoResultExt, JsonResultExt};
use crate::config::Settings;
use crate::domain::{to_xml, DomainError, MarkupOptions, TreeBuilder};
use crate::infrastructure::traits::FileSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderFormat {
    #[default]
    Xml,
    Tree,
    Html,
}

/// Shows how a JSON file maps onto a result tree.
pub struct RenderService {
    fs: Arc<dyn FileSystem>,
    settings: Arc<Settings>,
}

impl RenderService {
    pub fn new(fs: Arc<dyn FileSystem>, settings: Arc<Settings>) -> Self {
        Self { fs, settings }
    }

    pub fn render_file(&self, path: &Path, format: RenderFormat) -> ApplicationResult<String> {
        let content = self
            .fs
            .read_to_string(path)
            .with_path_context("read document", path)?;
        let value: Value = serde_json::from_str(&content).with_path_context("parse document", path)?;
        debug!("render_file: {} as {:?}", path.display(), format);

        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.render(&title, &value, format)
    }

    pub fn render(&self, title: &str, value: &Value, format: RenderFormat) -> ApplicationResult<String> {
        let tree = TreeBuilder::new()
            .with_element_label(&self.settings.tree.element_label)
            .build(value);

        let out = match format {
            RenderFormat::Xml => {
                let options = MarkupOptions {
                    kind_attribute: self.settings.tree.kind_attribute.clone(),
                    ..MarkupOptions::default()
                };
                to_xml(&tree, &options).map_err(DomainError::from)?
            }
            RenderFormat::Tree => tree.to_termtree().to_string(),
            RenderFormat::Html => HtmlStylesheet.render(title, &tree),
        };
        Ok(out)
    }
}
