//! Export of store collections as an RDF graph in Turtle

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::application::{ApplicationResult, IoResultExt};
use crate::config::Settings;
use crate::domain::{Graph, RdfMapper};
use crate::infrastructure::store::DocumentStore;
use crate::infrastructure::traits::FileSystem;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdfSummary {
    pub collections: Vec<String>,
    pub documents: usize,
    pub triples: usize,
    pub output: PathBuf,
}

/// Maps store documents into RDF triples.
pub struct RdfService {
    fs: Arc<dyn FileSystem>,
    store: Arc<dyn DocumentStore>,
    settings: Arc<Settings>,
}

impl RdfService {
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

    fn mapper(&self) -> RdfMapper {
        let rdf = &self.settings.rdf;
        RdfMapper::new(&rdf.vocab_ns, &rdf.base_ns).with_known_classes(rdf.known_classes.iter())
    }

    /// Collections to export: explicit selection, else configured, else all in the store.
    pub fn selected_collections(&self, selection: &[String]) -> ApplicationResult<Vec<String>> {
        if !selection.is_empty() {
            return Ok(selection.to_vec());
        }
        if !self.settings.rdf.collections.is_empty() {
            return Ok(self.settings.rdf.collections.clone());
        }
        Ok(self.store.list_collections()?)
    }

    /// Build the graph of the selected collections.
    pub fn build_graph(&self, selection: &[String]) -> ApplicationResult<(Graph, Vec<String>, usize)> {
        self.store.ping()?;
        let collections = self.selected_collections(selection)?;
        let mapper = self.mapper();
        let mut graph = mapper.new_graph();
        let mut documents = 0;

        for collection in &collections {
            let docs = self.store.documents(collection)?;
            if docs.is_empty() {
                warn!("collection {} is empty or missing", collection);
            }
            for doc in &docs {
                match doc {
                    Value::Object(map) => {
                        mapper.add_document(&mut graph, collection, map);
                        documents += 1;
                    }
                    other => warn!("{}: skipping non-object document {}", collection, other),
                }
            }
            debug!("{}: {} documents, graph now {} triples", collection, docs.len(), graph.len());
        }

        Ok((graph, collections, documents))
    }

    /// Build the graph and write it as Turtle to `output`.
    pub fn export(&self, selection: &[String], output: &Path) -> ApplicationResult<RdfSummary> {
        let (graph, collections, documents) = self.build_graph(selection)?;
        self.fs
            .write_all_dirs(output, &graph.to_turtle())
            .with_path_context("write turtle", output)?;

        info!("{} triples -> {}", graph.len(), output.display());
        Ok(RdfSummary {
            collections,
            documents,
            triples: graph.len(),
            output: output.to_path_buf(),
        })
    }
}
