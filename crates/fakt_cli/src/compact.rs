//! `fakt compact`: rewrite a signature store with one record per contract.

use std::sync::Arc;

use fakt_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};

use crate::pipeline::{exit_code, render_diagnostics, Project};
use crate::GlobalArgs;

/// Runs the `fakt compact` command on the store owning `node`'s output.
///
/// A failed rewrite is reported as a `G402` error and exits with status 1.
pub fn run(node: &str, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::load(global)?;
    let sink = Arc::new(DiagnosticSink::new());

    let location = project.locate(node, &sink)?;
    let cache = project.open_cache(&location, Arc::clone(&sink));
    if !cache.is_enabled() {
        if !global.quiet {
            eprintln!("warning: caching is disabled; nothing to compact");
        }
        render_diagnostics(&sink, global);
        return Ok(exit_code(&sink));
    }

    match cache.compact() {
        Ok(()) => {
            if !global.quiet {
                eprintln!(
                    "   Compacted {} ({} contracts)",
                    location.store_path.display(),
                    cache.store().len()
                );
            }
        }
        Err(e) => sink.emit(
            Diagnostic::error(
                DiagnosticCode::COMPACTION_FAILED,
                "signature store could not be compacted",
            )
            .with_path(&location.store_path)
            .with_note(e.to_string())
            .with_help("the existing log is left in place"),
        ),
    }

    render_diagnostics(&sink, global);
    Ok(exit_code(&sink))
}
