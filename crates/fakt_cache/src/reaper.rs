//! Stale artifact reclamation.
//!
//! A contract recorded in the store but absent from the current pass is
//! stale: its generated files are deleted and its store and dependency entries
//! are purged. A file that is already gone counts as reclaimed. Surviving
//! contracts that depended on a purged one are marked invalidated in the
//! store, so a later plan still regenerates them.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use fakt_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};

use crate::deps::DependencyGraph;
use crate::store::SignatureStore;

/// What one reaping run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Contracts that were recorded but are no longer current, sorted.
    pub stale: Vec<String>,

    /// Files that were deleted.
    pub deleted_files: Vec<PathBuf>,

    /// Files that were already missing.
    pub already_missing: Vec<PathBuf>,

    /// Contracts kept in the store because a file could not be deleted.
    pub retained: Vec<String>,

    /// Surviving contracts marked for regeneration because a dependency was purged, sorted.
    pub invalidated: Vec<String>,
}

impl ReapReport {
    /// Returns the number of contracts whose entries were purged.
    pub fn purged_count(&self) -> usize {
        self.stale.len() - self.retained.len()
    }
}

/// Deletes artifacts of contracts absent from `current` and purges their entries.
///
/// Relative artifact paths are resolved against `artifact_root`. If any file
/// of a stale contract fails to delete for a reason other than not existing,
/// a `G401` warning is emitted and the contract's entry is kept so a later
/// pass retries.
///
/// Every recorded transitive dependent of a purged contract is marked
/// invalidated, except those in `fresh`: contracts already regenerated
/// after the removal was seen.
pub fn reap(
    store: &SignatureStore,
    graph: &mut DependencyGraph,
    current: &BTreeSet<String>,
    fresh: &BTreeSet<String>,
    artifact_root: &Path,
    sink: &DiagnosticSink,
) -> ReapReport {
    let mut report = ReapReport {
        stale: store
            .names()
            .into_iter()
            .filter(|name| !current.contains(name))
            .collect(),
        ..ReapReport::default()
    };

    let stale: BTreeSet<&String> = report.stale.iter().collect();
    let mut invalidated = BTreeSet::new();

    for name in &report.stale {
        let Some(entry) = store.get(name) else {
            continue;
        };

        let mut failed = false;
        for artifact in &entry.artifacts {
            let path = artifact_root.join(artifact);
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!(contract = %name, path = %path.display(), "deleted stale artifact");
                    report.deleted_files.push(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    report.already_missing.push(path);
                }
                Err(e) => {
                    failed = true;
                    sink.emit(
                        Diagnostic::warning(
                            DiagnosticCode::STALE_DELETE_FAILED,
                            format!("could not delete stale artifact of '{name}'"),
                        )
                        .with_path(&path)
                        .with_note(e.to_string())
                        .with_help("the entry is kept and deletion is retried on the next pass"),
                    );
                }
            }
        }

        if failed {
            report.retained.push(name.clone());
        } else {
            for dependent in graph.find_transitive_dependents(name) {
                if stale.contains(&dependent) || fresh.contains(&dependent) {
                    continue;
                }
                if store.invalidate(&dependent, name).is_some() {
                    invalidated.insert(dependent);
                }
            }
            store.forget(name);
            graph.remove(name);
        }
    }
    report.invalidated = invalidated.into_iter().collect();

    if !report.stale.is_empty() {
        tracing::debug!(
            stale = report.stale.len(),
            deleted = report.deleted_files.len(),
            "reaped stale contracts"
        );
    }
    report
}
