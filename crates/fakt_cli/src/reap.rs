//! `fakt reap`: delete artifacts of contracts that no longer exist.

use std::collections::BTreeSet;
use std::sync::Arc;

use fakt_diagnostics::DiagnosticSink;

use crate::pipeline::{exit_code, print_json, render_diagnostics, Project};
use crate::{ContractArgs, GlobalArgs, ReportFormat};

/// Runs the `fakt reap` command.
///
/// Every contract recorded in the owner's store but missing from the
/// contracts file is stale. Its artifacts are deleted and its entry purged,
/// after which the store is compacted. Surviving dependents of a purged
/// contract are marked so the next plan regenerates them.
pub fn run(args: &ContractArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::load(global)?;
    let sink = Arc::new(DiagnosticSink::new());

    let location = project.locate(&args.node, &sink)?;
    let current: BTreeSet<String> = project
        .load_contracts(&args.contracts)?
        .into_iter()
        .map(|r| r.contract.name)
        .collect();

    let cache = project.open_cache(&location, Arc::clone(&sink));
    let report = cache.reap(&current);

    match global.format {
        ReportFormat::Text => {
            for name in &report.stale {
                let state = if report.retained.contains(name) {
                    "retained"
                } else {
                    "purged"
                };
                println!("{state:<9} {name}");
            }
            for path in &report.deleted_files {
                println!("{:<9} {}", "deleted", path.display());
            }
            for name in &report.invalidated {
                println!("{:<9} {name}", "marked");
            }
            if !global.quiet {
                eprintln!(
                    "      Reaped {} stale contracts, {} files deleted, {} already gone",
                    report.purged_count(),
                    report.deleted_files.len(),
                    report.already_missing.len()
                );
            }
        }
        ReportFormat::Json => print_json(&serde_json::json!({
            "stale": report.stale,
            "retained": report.retained,
            "deleted_files": report.deleted_files,
            "already_missing": report.already_missing,
            "invalidated": report.invalidated,
        }))?,
    }

    render_diagnostics(&sink, global);
    Ok(exit_code(&sink))
}
