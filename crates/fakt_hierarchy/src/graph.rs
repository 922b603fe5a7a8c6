//! Arena-backed storage for the build node DAG.

use std::collections::HashMap;

use crate::error::HierarchyError;
use crate::ids::NodeId;

/// One compilation scope in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildNode {
    /// Node name, e.g. `jvmTest`.
    pub name: String,
    /// Direct parents in declaration order, duplicates removed.
    pub parents: Vec<NodeId>,
}

impl BuildNode {
    /// Returns `true` if the node has no parents.
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }
}

/// A validated, acyclic build hierarchy.
///
/// Nodes are appended to a dense arena and never removed, so a [`NodeId`]
/// stays valid for the lifetime of the graph.
#[derive(Debug, Clone, Default)]
pub struct BuildGraph {
    nodes: Vec<BuildNode>,
    by_name: HashMap<String, NodeId>,
}

impl BuildGraph {
    /// Builds a graph from `(node, parents)` declarations.
    ///
    /// Every node must be declared exactly once and every parent must name a
    /// declared node. Cycles are rejected.
    pub fn from_edges<N, P, I>(declarations: I) -> Result<Self, HierarchyError>
    where
        I: IntoIterator<Item = (N, P)>,
        N: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        let declared: Vec<(String, Vec<String>)> = declarations
            .into_iter()
            .map(|(name, parents)| (name.into(), parents.into_iter().map(Into::into).collect()))
            .collect();

        let mut graph = BuildGraph::default();
        for (name, _) in &declared {
            if graph.by_name.contains_key(name) {
                return Err(HierarchyError::DuplicateNode { name: name.clone() });
            }
            let id = NodeId::from_raw(graph.nodes.len() as u32);
            graph.nodes.push(BuildNode {
                name: name.clone(),
                parents: Vec::new(),
            });
            graph.by_name.insert(name.clone(), id);
        }

        for (index, (name, parents)) in declared.iter().enumerate() {
            let mut resolved = Vec::with_capacity(parents.len());
            for parent in parents {
                let id = graph
                    .by_name
                    .get(parent)
                    .copied()
                    .ok_or_else(|| HierarchyError::UnknownParent {
                        node: name.clone(),
                        parent: parent.clone(),
                    })?;
                if !resolved.contains(&id) {
                    resolved.push(id);
                }
            }
            graph.nodes[index].parents = resolved;
        }

        graph.check_acyclic()?;
        Ok(graph)
    }

    fn check_acyclic(&self) -> Result<(), HierarchyError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        for start in 0..self.nodes.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }
            // Iterative DFS; each frame is (node, next parent to visit)
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            marks[start] = Mark::InProgress;
            while let Some(frame) = stack.last_mut() {
                let (node, next) = *frame;
                match self.nodes[node].parents.get(next) {
                    Some(parent) => {
                        frame.1 += 1;
                        let p = parent.index();
                        match marks[p] {
                            Mark::Unvisited => {
                                marks[p] = Mark::InProgress;
                                stack.push((p, 0));
                            }
                            Mark::InProgress => {
                                let from = stack.iter().position(|(n, _)| *n == p).unwrap_or(0);
                                let mut path: Vec<String> = stack[from..]
                                    .iter()
                                    .map(|(n, _)| self.nodes[*n].name.clone())
                                    .collect();
                                path.push(self.nodes[p].name.clone());
                                return Err(HierarchyError::Cycle { path });
                            }
                            Mark::Done => {}
                        }
                    }
                    None => {
                        marks[node] = Mark::Done;
                        stack.pop();
                    }
                }
            }
        }
        Ok(())
    }

    /// Returns the id of the named node.
    pub fn id(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    /// Returns the id of the named node, or [`HierarchyError::UnknownNode`].
    pub fn lookup(&self, name: &str) -> Result<NodeId, HierarchyError> {
        self.id(name).ok_or_else(|| HierarchyError::UnknownNode {
            name: name.to_string(),
        })
    }

    /// Returns the node with the given id.
    ///
    /// # Panics
    ///
    /// Panics if the id was not allocated by this graph.
    pub fn node(&self, id: NodeId) -> &BuildNode {
        &self.nodes[id.index()]
    }

    /// Returns the name of the node with the given id.
    pub fn name(&self, id: NodeId) -> &str {
        &self.node(id).name
    }

    /// Returns the direct parents of a node.
    pub fn parents(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).parents
    }

    /// Returns every node without parents, in declaration order.
    pub fn roots(&self) -> Vec<NodeId> {
        self.iter()
            .filter(|(_, node)| node.is_root())
            .map(|(id, _)| id)
            .collect()
    }

    /// Iterates `(id, node)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &BuildNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId::from_raw(i as u32), n))
    }

    /// Returns the number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
