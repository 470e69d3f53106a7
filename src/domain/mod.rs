//! Domain layer: pure transforms over documents
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod error;
pub mod filter;
pub mod key;
pub mod markup;
pub mod query;
pub mod rdf;
pub mod sparql;
pub mod table;
pub mod tree;

pub use error::{DomainError, FilterError, MarkupError, QueryParseError};
pub use key::normalize_key;
pub use markup::{from_xml, to_xml, MarkupOptions};
pub use query::{load_queries, parse_query, NamedQuery, ParsedQuery, QueryOperation};
pub use rdf::{Graph, RdfMapper, Term};
pub use sparql::{split_sparql_queries, SparqlQuery};
pub use table::{clean_table, CleanedTable};
pub use tree::{build, NodeKind, TreeBuilder, TreeNode, ROOT_LABEL};
