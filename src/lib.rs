//! bioetl: biomedical ETL pipeline
//!
//! Raw tab-delimited tables are cleaned into JSON, loaded into a document
//! store, queried into XML/HTML reports and exported as RDF.
//!
//! Layers, innermost first: [`domain`] (pure transforms), [`application`]
//! (services), [`infrastructure`] (store, filesystem, wiring), [`cli`].

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
