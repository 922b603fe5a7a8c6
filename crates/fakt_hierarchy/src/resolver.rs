//! Ancestor resolution and output centralization.
//!
//! Output for a node is written once at its shared root so every target
//! that includes the root's scope observes the same copy. The signature store
//! lives next to that output, which is how every build node sharing a root
//! converges on one store.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use fakt_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use serde::Serialize;

use crate::error::HierarchyError;
use crate::graph::BuildGraph;
use crate::ids::NodeId;

/// Directory conventions for generated output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    /// Base directory under which each owning node gets its own subdirectory.
    pub generated_dir: PathBuf,
    /// File name of the signature store inside a node's cache directory.
    pub store_file: String,
}

impl OutputLayout {
    /// Creates a layout rooted at `generated_dir`.
    pub fn new(generated_dir: impl Into<PathBuf>, store_file: impl Into<String>) -> Self {
        Self {
            generated_dir: generated_dir.into(),
            store_file: store_file.into(),
        }
    }

    /// Returns the generated source directory for `owner`.
    pub fn source_dir(&self, owner: &str) -> PathBuf {
        self.generated_dir.join(owner).join("kotlin")
    }

    /// Returns the signature store path for `owner`.
    pub fn store_path(&self, owner: &str) -> PathBuf {
        self.generated_dir
            .join(owner)
            .join("cache")
            .join(&self.store_file)
    }
}

/// Where a node's generated output goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputLocation {
    /// The node being compiled.
    pub node: String,
    /// The node that owns the output: the shared root, or `node` itself.
    pub owner: String,
    /// `true` if output is centralized at an ancestor.
    pub centralized: bool,
    /// Directory generated sources are written to.
    pub source_dir: PathBuf,
    /// Signature store file shared by every node with the same owner.
    pub store_path: PathBuf,
}

impl OutputLocation {
    /// Returns the directory holding the signature store.
    pub fn cache_dir(&self) -> &Path {
        self.store_path.parent().unwrap_or(&self.store_path)
    }
}

/// Answers hierarchy queries over a [`BuildGraph`].
#[derive(Debug, Clone)]
pub struct HierarchyResolver<'g> {
    graph: &'g BuildGraph,
    designated_root: Option<NodeId>,
}

impl<'g> HierarchyResolver<'g> {
    /// Creates a resolver without a designated shared root.
    pub fn new(graph: &'g BuildGraph) -> Self {
        Self {
            graph,
            designated_root: None,
        }
    }

    /// Designates the named node as the preferred shared root.
    pub fn with_shared_root(mut self, name: &str) -> Result<Self, HierarchyError> {
        self.designated_root = Some(self.graph.lookup(name)?);
        Ok(self)
    }

    /// Returns the underlying graph.
    pub fn graph(&self) -> &'g BuildGraph {
        self.graph
    }

    /// Returns `node` and every transitive ancestor in breadth-first order.
    ///
    /// Each node appears exactly once, even when reachable through several
    /// paths. Parents are visited in declaration order.
    pub fn resolve_ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut visited = HashSet::from([node]);
        let mut order = Vec::new();
        let mut queue = VecDeque::from([node]);
        while let Some(current) = queue.pop_front() {
            order.push(current);
            for &parent in self.graph.parents(current) {
                if visited.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }
        order
    }

    /// Like [`resolve_ancestors`](Self::resolve_ancestors), by name.
    pub fn resolve_ancestor_names(&self, node: &str) -> Result<Vec<String>, HierarchyError> {
        let id = self.graph.lookup(node)?;
        Ok(self
            .resolve_ancestors(id)
            .into_iter()
            .map(|a| self.graph.name(a).to_string())
            .collect())
    }

    /// Returns the shared root for `node`, if one can be chosen.
    ///
    /// A designated root wins when it is among the ancestors. Otherwise the
    /// sole parentless ancestor is used. With several parentless ancestors
    /// and no designation there is no shared root; an `H501` warning is
    /// emitted and output stays local.
    pub fn shared_root(&self, node: NodeId, sink: &DiagnosticSink) -> Option<NodeId> {
        let ancestors = self.resolve_ancestors(node);
        if let Some(designated) = self.designated_root {
            if ancestors.contains(&designated) {
                return Some(designated);
            }
        }

        let roots: Vec<NodeId> = ancestors
            .into_iter()
            .filter(|&a| self.graph.node(a).is_root())
            .collect();
        match roots.as_slice() {
            [only] => Some(*only),
            _ => {
                let names: Vec<&str> = roots.iter().map(|&r| self.graph.name(r)).collect();
                sink.emit(
                    Diagnostic::warning(
                        DiagnosticCode::AMBIGUOUS_SHARED_ROOT,
                        format!(
                            "build node '{}' has several root ancestors; output stays local",
                            self.graph.name(node)
                        ),
                    )
                    .with_note(format!("root ancestors: {}", names.join(", ")))
                    .with_help("set `hierarchy.shared_root` in fakt.toml to centralize output"),
                );
                None
            }
        }
    }

    /// Determines where output for `node` is written.
    pub fn resolve_output_location(
        &self,
        node: NodeId,
        layout: &OutputLayout,
        sink: &DiagnosticSink,
    ) -> OutputLocation {
        let owner_id = self.shared_root(node, sink).unwrap_or(node);
        let owner = self.graph.name(owner_id);
        let location = OutputLocation {
            node: self.graph.name(node).to_string(),
            owner: owner.to_string(),
            centralized: owner_id != node,
            source_dir: layout.source_dir(owner),
            store_path: layout.store_path(owner),
        };
        tracing::debug!(
            node = %location.node,
            owner = %location.owner,
            centralized = location.centralized,
            "resolved output location"
        );
        location
    }
}
