//! `fakt resolve`: where a build node's generated output goes.

use fakt_diagnostics::DiagnosticSink;
use serde::Serialize;

use crate::pipeline::{exit_code, print_json, render_diagnostics, Project};
use crate::{GlobalArgs, ReportFormat};

#[derive(Serialize)]
struct ResolveReport<'a> {
    ancestors: &'a [String],
    #[serde(flatten)]
    location: &'a fakt_hierarchy::OutputLocation,
}

/// Runs the `fakt resolve` command.
///
/// Prints the node's ancestors (itself first), the owning node, and the
/// source and store paths its output uses.
pub fn run(node: &str, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::load(global)?;
    let sink = DiagnosticSink::new();

    let ancestors = project.resolver()?.resolve_ancestor_names(node)?;
    let location = project.locate(node, &sink)?;

    match global.format {
        ReportFormat::Text => {
            println!("node:        {}", location.node);
            println!("ancestors:   {}", ancestors.join(", "));
            println!(
                "owner:       {}{}",
                location.owner,
                if location.centralized { " (centralized)" } else { "" }
            );
            println!("source dir:  {}", location.source_dir.display());
            println!("store:       {}", location.store_path.display());
        }
        ReportFormat::Json => print_json(&ResolveReport {
            ancestors: &ancestors,
            location: &location,
        })?,
    }

    render_diagnostics(&sink, global);
    Ok(exit_code(&sink))
}
