//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::Arc;

use crate::application::services::{
    ConvertService, LoadService, RdfService, RenderService, ReportService, SparqlService,
};
use crate::config::Settings;
use crate::infrastructure::store::{DocumentStore, JsonDirStore};
use crate::infrastructure::traits::{FileSystem, RealFileSystem};

/// Container holding all application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Document store
    pub store: Arc<dyn DocumentStore>,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    ///
    /// The store is opened at the configured `store_dir`; it is not created here,
    /// so an absent store surfaces as a connection error on first use.
    pub fn new(settings: Settings) -> Self {
        let store = JsonDirStore::new(settings.store_dir());
        Self::with_deps(settings, Arc::new(RealFileSystem), Arc::new(store))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        let settings = Arc::new(settings);

        Self {
            settings,
            fs,
            store,
        }
    }

    pub fn convert_service(&self) -> ConvertService {
        ConvertService::new(self.fs.clone(), self.settings.clone())
    }

    pub fn load_service(&self) -> LoadService {
        LoadService::new(self.fs.clone(), self.store.clone(), self.settings.clone())
    }

    pub fn report_service(&self) -> ReportService {
        ReportService::new(self.fs.clone(), self.store.clone(), self.settings.clone())
    }

    pub fn rdf_service(&self) -> RdfService {
        RdfService::new(self.fs.clone(), self.store.clone(), self.settings.clone())
    }

    pub fn sparql_service(&self) -> SparqlService {
        SparqlService::new(self.fs.clone())
    }

    pub fn render_service(&self) -> RenderService {
        RenderService::new(self.fs.clone(), self.settings.clone())
    }
}
