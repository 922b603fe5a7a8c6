//! Configuration types deserialized from `fakt.toml`.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// The top-level configuration parsed from `fakt.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct FaktConfig {
    /// Project metadata and output root.
    pub project: ProjectMeta,
    /// Incremental cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Default log verbosity.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Shared root designation.
    #[serde(default)]
    pub hierarchy: HierarchyConfig,
    /// Build nodes keyed by name.
    #[serde(default)]
    pub nodes: BTreeMap<String, NodeConfig>,
    /// Artifact routing destinations, if redistribution is configured.
    #[serde(default)]
    pub routing: Option<RoutingConfig>,
}

impl FaktConfig {
    /// Returns `(node, parents)` pairs in name order.
    pub fn node_edges(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.nodes
            .iter()
            .map(|(name, node)| (name.as_str(), node.depends_on.as_slice()))
    }
}

/// Core project metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// Directory, relative to the project root, that holds generated output.
    #[serde(default = "default_generated_dir")]
    pub generated_dir: String,
}

fn default_generated_dir() -> String {
    "build/generated/fakt".to_string()
}

/// Incremental generation cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// If `false`, every contract is regenerated on every pass.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// File name of the signature store inside the owner's cache directory.
    #[serde(default = "default_store_file")]
    pub store_file: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            store_file: default_store_file(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_store_file() -> String {
    "signatures.jsonl".to_string()
}

/// Logging settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Default verbosity when neither flags nor `FAKT_LOG` override it.
    #[serde(default)]
    pub level: LogLevel,
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only.
    Quiet,
    /// Warnings and summaries.
    #[default]
    Info,
    /// Cache and routing decisions.
    Debug,
    /// Everything, including per-contract planning.
    Trace,
}

impl LogLevel {
    /// Returns the tracing filter directive for this level.
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Quiet => "error",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        })
    }
}

/// Hierarchy-wide settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HierarchyConfig {
    /// Node to centralize output at whenever it is an ancestor.
    #[serde(default)]
    pub shared_root: Option<String>,
}

/// One build node declaration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeConfig {
    /// Direct parent nodes.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// Artifact routing settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    /// Destination used when no candidate matches an artifact's namespace.
    pub default_destination: String,
    /// Candidate destination names.
    #[serde(default)]
    pub destinations: Vec<String>,
}
