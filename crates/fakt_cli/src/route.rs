//! `fakt route`: copy a producer's artifacts into per-target consumer directories.

use fakt_config::{FaktConfig, LogLevel};
use fakt_diagnostics::DiagnosticSink;
use fakt_router::{distribute, ArtifactRouter};

use crate::pipeline::{exit_code, find_project_root, print_json, render_diagnostics, resolve_config_path};
use crate::{logging, GlobalArgs, ReportFormat, RouteArgs};

/// Loads `fakt.toml` if one applies. A project without one can still route
/// when destinations are given on the command line.
fn optional_config(global: &GlobalArgs) -> Result<Option<FaktConfig>, Box<dyn std::error::Error>> {
    if global.config.is_none() {
        let cwd = std::env::current_dir()?;
        if find_project_root(&cwd).is_err() {
            return Ok(None);
        }
    }
    let (_, file) = resolve_config_path(global)?;
    Ok(Some(fakt_config::load_config_file(&file)?))
}

/// Builds the router from command-line overrides, falling back to `[routing]`.
fn build_router(
    args: &RouteArgs,
    config: Option<&FaktConfig>,
) -> Result<ArtifactRouter, Box<dyn std::error::Error>> {
    let routing = config.and_then(|c| c.routing.as_ref());

    let destinations = if args.destinations.is_empty() {
        routing.map(|r| r.destinations.clone()).unwrap_or_default()
    } else {
        args.destinations.clone()
    };
    if destinations.is_empty() {
        return Err("no routing destinations; pass --dest or set [routing] destinations".into());
    }

    let default_destination = args
        .default_destination
        .clone()
        .or_else(|| routing.map(|r| r.default_destination.clone()))
        .ok_or("no default destination; pass --default or set [routing] default_destination")?;

    Ok(ArtifactRouter::new(destinations, default_destination))
}

/// Runs the `fakt route` command.
///
/// Reads every file under `<producer>/<node>`, routes it by its declared
/// namespace and copies it to `<consumer>/<destination>/<relative path>`.
pub fn run(args: &RouteArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = optional_config(global)?;
    logging::init(
        global,
        config.as_ref().map(|c| c.logging.level).unwrap_or(LogLevel::Info),
    );

    let router = build_router(args, config.as_ref())?;
    let sink = DiagnosticSink::new();
    let report = distribute(&router, &args.producer, &args.node, &args.consumer, &sink);

    match global.format {
        ReportFormat::Text => {
            for routed in &report.routed {
                let marker = if routed.defaulted { " (default)" } else { "" };
                println!(
                    "{} -> {}{marker}",
                    routed.source.display(),
                    routed.target.display()
                );
            }
            if !global.quiet {
                eprintln!(
                    "      Routed {} artifacts, {} skipped, {} failed",
                    report.routed.len(),
                    report.skipped.len(),
                    report.failed.len()
                );
            }
        }
        ReportFormat::Json => print_json(&report)?,
    }

    render_diagnostics(&sink, global);
    Ok(exit_code(&sink))
}
