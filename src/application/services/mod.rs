//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (FileSystem, DocumentStore)
//! but are themselves concrete structs, not traits.

mod convert;
mod load;
mod rdf;
mod render;
mod report;
mod sparql;

pub use convert::{ConvertService, ConvertedDataset};
pub use load::{LoadService, LoadStatus, LoadSummary};
pub use rdf::{RdfService, RdfSummary};
pub use render::{RenderFormat, RenderService};
pub use report::{QueryFailure, QueryReport, ReportService, ReportSummary};
pub use sparql::{SparqlFailure, SparqlOutput, SparqlResultKind, SparqlService, SparqlSummary};
