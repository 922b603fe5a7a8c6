//! Producer-to-consumer artifact distribution.
//!
//! Scans `<producer_root>/<producer>/**`, routes every file by namespace and
//! copies it to `<consumer_root>/<destination>/<relative path>`. Nothing here
//! is fatal: unreadable files, a missing producer directory, and failed copies
//! all become warnings.

use std::path::{Path, PathBuf};

use fakt_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use serde::Serialize;
use walkdir::WalkDir;

use crate::namespace::extract_namespace;
use crate::router::{ArtifactRouter, GeneratedArtifact};

/// One artifact copied into the consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutedArtifact {
    /// The file as produced.
    pub source: PathBuf,
    /// The destination node it was routed to.
    pub destination: String,
    /// Where it was copied.
    pub target: PathBuf,
    /// `true` if no destination matched and the default was used.
    pub defaulted: bool,
}

/// What one distribution run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DistributionReport {
    /// Artifacts copied successfully, sorted by relative path.
    pub routed: Vec<RoutedArtifact>,
    /// Files that could not be read and were skipped.
    pub skipped: Vec<PathBuf>,
    /// Files whose copy failed.
    pub failed: Vec<PathBuf>,
}

/// Collects every file under `<producer_root>/<producer>` with its namespace.
///
/// A missing producer directory yields no artifacts and an `R303` warning.
/// Unreadable files are skipped with an `R302` warning and listed in `skipped`.
pub fn collect_artifacts(
    producer_root: &Path,
    producer: &str,
    sink: &DiagnosticSink,
    skipped: &mut Vec<PathBuf>,
) -> Vec<GeneratedArtifact> {
    let base = producer_root.join(producer);
    if !base.is_dir() {
        sink.emit(
            Diagnostic::warning(
                DiagnosticCode::PRODUCER_MISSING,
                format!("producer output for '{producer}' does not exist; nothing to distribute"),
            )
            .with_path(&base),
        );
        return Vec::new();
    }

    let mut artifacts = Vec::new();
    for entry in WalkDir::new(&base).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| base.clone());
                warn_unreadable(sink, &path, &e.to_string());
                skipped.push(path);
                continue;
            }
        };
        // Symlinked artifacts are read through the link; a dangling one is unreadable
        let file_type = entry.file_type();
        if !file_type.is_file() && !file_type.is_symlink() {
            continue;
        }

        let path = entry.path();
        let content = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn_unreadable(sink, path, &e.to_string());
                skipped.push(path.to_path_buf());
                continue;
            }
        };
        let relative = path.strip_prefix(&base).unwrap_or(path).to_path_buf();
        artifacts.push(GeneratedArtifact {
            relative_path: relative,
            source_path: path.to_path_buf(),
            producer: producer.to_string(),
            namespace: extract_namespace(&String::from_utf8_lossy(&content)),
        });
    }
    artifacts
}

fn warn_unreadable(sink: &DiagnosticSink, path: &Path, reason: &str) {
    sink.emit(
        Diagnostic::warning(
            DiagnosticCode::ARTIFACT_UNREADABLE,
            "generated artifact could not be read and was skipped",
        )
        .with_path(path)
        .with_note(reason.to_string()),
    );
}

/// Routes and copies every artifact of `producer` into the consumer tree.
///
/// Files are copied, not moved, and existing files at the target are
/// overwritten. Intermediate directories are created as needed.
pub fn distribute(
    router: &ArtifactRouter,
    producer_root: &Path,
    producer: &str,
    consumer_root: &Path,
    sink: &DiagnosticSink,
) -> DistributionReport {
    let mut report = DistributionReport::default();
    let artifacts = collect_artifacts(producer_root, producer, sink, &mut report.skipped);
    let routes = router.route(&artifacts, sink);

    for artifact in &artifacts {
        let Some(choice) = routes.get(&artifact.relative_path) else {
            continue;
        };
        let target = consumer_root
            .join(&choice.destination)
            .join(&artifact.relative_path);

        let copied = match target.parent() {
            Some(parent) => std::fs::create_dir_all(parent),
            None => Ok(()),
        }
        .and_then(|()| std::fs::copy(&artifact.source_path, &target));

        match copied {
            Ok(_) => report.routed.push(RoutedArtifact {
                source: artifact.source_path.clone(),
                destination: choice.destination.clone(),
                target,
                defaulted: choice.is_default(),
            }),
            Err(e) => {
                sink.emit(
                    Diagnostic::warning(
                        DiagnosticCode::COPY_FAILED,
                        format!("could not copy artifact to '{}'", choice.destination),
                    )
                    .with_path(&target)
                    .with_note(e.to_string()),
                );
                report.failed.push(artifact.source_path.clone());
            }
        }
    }

    tracing::debug!(
        producer,
        routed = report.routed.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "distributed artifacts"
    );
    report
}
