//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

/// Biomedical ETL: raw tables to JSON, document store, XML/HTML reports and RDF
#[derive(Parser, Debug)]
#[command(name = "bioetl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity: -d info, -dd debug, -ddd trace
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub debug: u8,

    /// Project directory (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Clean raw tab-delimited tables into JSON
    Convert {
        /// Datasets to convert (default: all configured)
        datasets: Vec<String>,
    },

    /// Load cleaned JSON files into the document store
    Load,

    /// Run named queries and write XML/HTML reports
    Report {
        /// Query file (default: configured queries_file)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        queries: Option<PathBuf>,
        /// Output directory (default: configured report_dir)
        #[arg(short, long, value_hint = ValueHint::DirPath)]
        outdir: Option<PathBuf>,
    },

    /// Export store collections as RDF (Turtle)
    Rdf {
        /// Collections to export (default: configured, else all)
        collections: Vec<String>,
        /// Output file (default: configured rdf_out)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },

    /// Run SPARQL queries over the exported graph
    Sparql {
        /// Query file with `# Query N` blocks (default: configured sparql_queries)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        queries: Option<PathBuf>,
        /// Turtle graph (default: configured rdf_out)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        graph: Option<PathBuf>,
        /// Output directory (default: configured sparql_dir)
        #[arg(short, long, value_hint = ValueHint::DirPath)]
        outdir: Option<PathBuf>,
    },

    /// Convert, load and report in one go
    Run {
        /// Query file (default: configured queries_file)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        queries: Option<PathBuf>,
    },

    /// Show the result tree of a JSON file
    Render {
        /// JSON file
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Show as indented tree
        #[arg(long, conflicts_with = "html")]
        tree: bool,
        /// Show as HTML
        #[arg(long)]
        html: bool,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Create config template
    Init {
        /// Create global config
        #[arg(short, long)]
        global: bool,
    },

    /// Show config paths
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn given_repeated_debug_flag_when_parsing_then_counts() {
        let cli = Cli::parse_from(["bioetl", "-ddd", "load"]);
        assert_eq!(cli.debug, 3);
        assert!(matches!(cli.command, Some(Commands::Load)));
    }

    #[test]
    fn given_sparql_paths_when_parsing_then_captured() {
        let cli = Cli::parse_from(["bioetl", "sparql", "-q", "q.sparql", "-g", "g.ttl"]);
        match cli.command {
            Some(Commands::Sparql {
                queries,
                graph,
                outdir,
            }) => {
                assert_eq!(queries, Some(PathBuf::from("q.sparql")));
                assert_eq!(graph, Some(PathBuf::from("g.ttl")));
                assert!(outdir.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn given_tree_and_html_when_parsing_then_rejected() {
        let res = Cli::try_parse_from(["bioetl", "render", "x.json", "--tree", "--html"]);
        assert!(res.is_err());
    }
}
