//! Command dispatch: settings → service container → services → terminal output

use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::application::services::{
    LoadStatus, RenderFormat, ReportSummary, SparqlResultKind, SparqlSummary,
};
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, local_config_path, Settings};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Err(CliError::Usage(
            "no command given, see `bioetl --help`".to_string(),
        ));
    };

    if let Commands::Completion { shell } = command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(*shell, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }

    let settings = Settings::load(cli.project_dir.as_deref())?;
    debug!("project_dir: {}", settings.project_dir.display());

    if let Commands::Config { command } = command {
        return cmd_config(command, &settings, cli.project_dir.as_deref());
    }

    let container = ServiceContainer::new(settings);
    match command {
        Commands::Convert { datasets } => cmd_convert(&container, datasets),
        Commands::Load => cmd_load(&container),
        Commands::Report { queries, outdir } => {
            cmd_report(&container, queries.as_deref(), outdir.as_deref())
        }
        Commands::Rdf {
            collections,
            output,
        } => cmd_rdf(&container, collections, output.as_deref()),
        Commands::Sparql {
            queries,
            graph,
            outdir,
        } => cmd_sparql(&container, queries.as_deref(), graph.as_deref(), outdir.as_deref()),
        Commands::Run { queries } => cmd_run(&container, queries.as_deref()),
        Commands::Render { file, tree, html } => cmd_render(&container, file, *tree, *html),
        Commands::Config { .. } | Commands::Completion { .. } => Ok(()),
    }
}

#[instrument(level = "debug", skip(container))]
fn cmd_convert(container: &ServiceContainer, datasets: &[String]) -> CliResult<()> {
    let converted = container.convert_service().convert_all(datasets)?;
    if converted.is_empty() {
        output::warning("no datasets converted");
    }
    for dataset in &converted {
        output::success(&format!(
            "{}: {} records -> {}",
            dataset.name,
            dataset.records,
            dataset.output.display()
        ));
        for column in &dataset.missing_columns {
            output::skipped(&format!("column not in source: {column}"));
        }
    }
    Ok(())
}

/// Create the store directory; loading is what brings a store into existence.
fn ensure_store(container: &ServiceContainer) -> CliResult<()> {
    let dir = container.settings.store_dir();
    container
        .fs
        .create_dir_all(&dir)
        .map_err(|e| InfraError::io(format!("create store {}", dir.display()), e))?;
    Ok(())
}

#[instrument(level = "debug", skip(container))]
fn cmd_load(container: &ServiceContainer) -> CliResult<()> {
    ensure_store(container)?;
    let summary = container.load_service().load_all()?;

    output::header(&format!(
        "Loaded {} documents into {}",
        summary.documents(),
        container.settings.store_dir().display()
    ));
    for (collection, status) in &summary.collections {
        match status {
            LoadStatus::Loaded(n) => output::success_detail(&format!("{collection}: {n} documents")),
            LoadStatus::Missing => output::skipped(&format!("{collection}: file not found")),
            LoadStatus::Empty => output::skipped(&format!("{collection}: file is empty")),
        }
    }
    Ok(())
}

fn print_report_summary(summary: &ReportSummary, out_dir: &Path) {
    output::header(&format!(
        "Reports in {}: {} written, {} failed",
        out_dir.display(),
        summary.succeeded(),
        summary.failed()
    ));
    for report in &summary.reports {
        if report.documents == 0 {
            output::skipped(&format!("{}: no documents", report.name));
        } else {
            output::success_detail(&format!("{}: {} documents", report.name, report.documents));
        }
    }
    for failure in &summary.failures {
        output::failure(&format!("{}: {}", failure.name, failure.message));
    }
}

#[instrument(level = "debug", skip(container))]
fn cmd_report(
    container: &ServiceContainer,
    queries: Option<&Path>,
    outdir: Option<&Path>,
) -> CliResult<()> {
    let settings = &container.settings;
    let queries = queries
        .map(Path::to_path_buf)
        .unwrap_or_else(|| settings.queries_file());
    let out_dir = outdir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| settings.report_dir());

    let summary = container.report_service().run(&queries, &out_dir)?;
    print_report_summary(&summary, &out_dir);
    Ok(())
}

#[instrument(level = "debug", skip(container))]
fn cmd_rdf(
    container: &ServiceContainer,
    collections: &[String],
    out: Option<&Path>,
) -> CliResult<()> {
    let out: PathBuf = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| container.settings.rdf_out());

    let summary = container.rdf_service().export(collections, &out)?;
    output::success(&format!(
        "{} triples from {} documents ({}) -> {}",
        summary.triples,
        summary.documents,
        summary.collections.join(", "),
        summary.output.display()
    ));
    Ok(())
}

fn print_sparql_summary(summary: &SparqlSummary, out_dir: &Path) {
    output::header(&format!(
        "SPARQL results in {} ({} triples): {} written, {} failed",
        out_dir.display(),
        summary.triples,
        summary.outputs.len(),
        summary.failures.len()
    ));
    for out in &summary.outputs {
        let detail = match out.kind {
            SparqlResultKind::Boolean(answer) => format!("query {}: {}", out.number, answer),
            _ => format!("query {}: {}", out.number, out.path.display()),
        };
        output::success_detail(&detail);
    }
    for failure in &summary.failures {
        output::failure(&format!("query {}: {}", failure.number, failure.message));
    }
}

#[instrument(level = "debug", skip(container))]
fn cmd_sparql(
    container: &ServiceContainer,
    queries: Option<&Path>,
    graph: Option<&Path>,
    outdir: Option<&Path>,
) -> CliResult<()> {
    let settings = &container.settings;
    let queries = queries
        .map(Path::to_path_buf)
        .unwrap_or_else(|| settings.sparql_queries());
    let graph = graph
        .map(Path::to_path_buf)
        .unwrap_or_else(|| settings.rdf_out());
    let out_dir = outdir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| settings.sparql_dir());

    let summary = container.sparql_service().run(&queries, &graph, &out_dir)?;
    print_sparql_summary(&summary, &out_dir);
    Ok(())
}

#[instrument(level = "debug", skip(container))]
fn cmd_run(container: &ServiceContainer, queries: Option<&Path>) -> CliResult<()> {
    output::header("Step 1: convert");
    cmd_convert(container, &[])?;

    output::header("Step 2: load");
    cmd_load(container)?;

    output::header("Step 3: report");
    cmd_report(container, queries, None)
}

#[instrument(level = "debug", skip(container))]
fn cmd_render(container: &ServiceContainer, file: &Path, tree: bool, html: bool) -> CliResult<()> {
    let format = match (tree, html) {
        (true, _) => RenderFormat::Tree,
        (_, true) => RenderFormat::Html,
        _ => RenderFormat::Xml,
    };
    let rendered = container.render_service().render_file(file, format)?;
    print!("{rendered}");
    Ok(())
}

fn cmd_config(
    command: &ConfigCommands,
    settings: &Settings,
    project_dir: Option<&Path>,
) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            output::info(&settings.to_toml()?);
            Ok(())
        }
        ConfigCommands::Init { global } => {
            let path = if *global {
                global_config_path().ok_or_else(|| {
                    CliError::Usage("cannot determine global config directory".to_string())
                })?
            } else {
                local_config_path(project_dir.unwrap_or(Path::new(".")))
            };
            if path.exists() {
                return Err(CliError::Usage(format!(
                    "config already exists: {}",
                    path.display()
                )));
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| InfraError::io(format!("create {}", parent.display()), e))?;
            }
            std::fs::write(&path, Settings::template())
                .map_err(|e| InfraError::io(format!("write {}", path.display()), e))?;
            output::action("Created", &path.display());
            Ok(())
        }
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => output::info(&format!("global: {}", path.display())),
                None => output::info("global: (unavailable)"),
            }
            output::info(&format!(
                "local:  {}",
                local_config_path(project_dir.unwrap_or(Path::new("."))).display()
            ));
            Ok(())
        }
    }
}
