//! Shared pipeline helpers for CLI commands.
//!
//! Project root and configuration discovery, build graph construction,
//! contract file loading, and diagnostic rendering.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fakt_cache::GenerationCache;
use fakt_common::Contract;
use fakt_config::{FaktConfig, CONFIG_FILE_NAME};
use fakt_diagnostics::{
    DiagnosticRenderer, DiagnosticSink, JsonRenderer, Severity, TerminalRenderer,
};
use fakt_hierarchy::{BuildGraph, HierarchyResolver, OutputLayout, OutputLocation};
use serde::{Deserialize, Serialize};

use crate::{logging, GlobalArgs, ReportFormat};

/// Walks up from `start` looking for the nearest directory containing `fakt.toml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE_NAME).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE_NAME} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Resolves the project root and configuration file from global CLI args.
///
/// `--config` may name a file (its directory is the root) or a directory
/// (which must contain `fakt.toml`). Otherwise walks up from the current
/// directory.
pub fn resolve_config_path(
    global: &GlobalArgs,
) -> Result<(PathBuf, PathBuf), Box<dyn std::error::Error>> {
    match &global.config {
        Some(config_path) => {
            let p = PathBuf::from(config_path);
            if p.is_dir() {
                Ok((p.clone(), p.join(CONFIG_FILE_NAME)))
            } else {
                let root = p
                    .parent()
                    .filter(|d| !d.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                Ok((root, p))
            }
        }
        None => {
            let root = find_project_root(&std::env::current_dir()?)?;
            let file = root.join(CONFIG_FILE_NAME);
            Ok((root, file))
        }
    }
}

/// A loaded project: root directory, configuration and build graph.
pub struct Project {
    /// Directory containing the configuration file.
    pub root: PathBuf,
    /// Parsed configuration.
    pub config: FaktConfig,
    /// Validated build hierarchy.
    pub graph: BuildGraph,
}

impl Project {
    /// Locates and loads the project, then installs logging at the configured level.
    pub fn load(global: &GlobalArgs) -> Result<Self, Box<dyn std::error::Error>> {
        let (root, config_file) = resolve_config_path(global)?;
        let config = fakt_config::load_config_file(&config_file)?;
        logging::init(global, config.logging.level);
        let graph = BuildGraph::from_edges(config.node_edges())?;
        tracing::debug!(
            project = %config.project.name,
            nodes = graph.len(),
            "loaded project"
        );
        Ok(Self {
            root,
            config,
            graph,
        })
    }

    /// Returns a resolver honoring `[hierarchy] shared_root`.
    pub fn resolver(&self) -> Result<HierarchyResolver<'_>, Box<dyn std::error::Error>> {
        let resolver = HierarchyResolver::new(&self.graph);
        match &self.config.hierarchy.shared_root {
            Some(root) => Ok(resolver.with_shared_root(root)?),
            None => Ok(resolver),
        }
    }

    /// Returns the output layout rooted at the project directory.
    pub fn layout(&self) -> OutputLayout {
        OutputLayout::new(
            self.root.join(&self.config.project.generated_dir),
            self.config.cache.store_file.clone(),
        )
    }

    /// Resolves the output location of the named node.
    pub fn locate(
        &self,
        node: &str,
        sink: &DiagnosticSink,
    ) -> Result<OutputLocation, Box<dyn std::error::Error>> {
        let resolver = self.resolver()?;
        let id = self.graph.lookup(node)?;
        Ok(resolver.resolve_output_location(id, &self.layout(), sink))
    }

    /// Opens the generation cache for a resolved location.
    ///
    /// Artifact paths are relative to the location's source directory.
    pub fn open_cache(&self, location: &OutputLocation, sink: Arc<DiagnosticSink>) -> GenerationCache {
        GenerationCache::open(&location.store_path, &location.source_dir, sink)
            .with_enabled(self.config.cache.enabled)
    }

    /// Loads a contracts file, resolving relative source paths against the project root.
    pub fn load_contracts(
        &self,
        path: &Path,
    ) -> Result<Vec<ContractRecord>, Box<dyn std::error::Error>> {
        let mut records = load_contracts(path)?;
        for record in &mut records {
            if let Some(source) = &record.contract.source {
                if source.is_relative() {
                    record.contract.source = Some(self.root.join(source));
                }
            }
        }
        Ok(records)
    }
}

/// One entry of the analyzer's contracts file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractRecord {
    /// The declared contract.
    #[serde(flatten)]
    pub contract: Contract,
    /// Files generated for the contract, relative to the output source directory.
    #[serde(default)]
    pub artifacts: Vec<PathBuf>,
}

/// Reads a JSON array of contracts.
pub fn load_contracts(path: &Path) -> Result<Vec<ContractRecord>, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read contracts file {}: {e}", path.display()))?;
    let records: Vec<ContractRecord> = serde_json::from_str(&text)
        .map_err(|e| format!("invalid contracts file {}: {e}", path.display()))?;
    Ok(records)
}

/// Renders all collected diagnostics to stderr. `--quiet` keeps only errors.
pub fn render_diagnostics(sink: &DiagnosticSink, global: &GlobalArgs) {
    let diagnostics = sink.take_all();
    match global.format {
        ReportFormat::Text => {
            let renderer = TerminalRenderer::new(global.color);
            for diag in &diagnostics {
                if global.quiet && diag.severity != Severity::Error {
                    continue;
                }
                eprint!("{}", renderer.render(diag));
            }
        }
        ReportFormat::Json => {
            let renderer = JsonRenderer;
            for diag in &diagnostics {
                eprint!("{}", renderer.render(diag));
            }
        }
    }
}

/// Prints a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Returns the process exit code for the collected diagnostics.
pub fn exit_code(sink: &DiagnosticSink) -> i32 {
    if sink.has_errors() {
        1
    } else {
        0
    }
}
