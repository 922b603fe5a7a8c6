//! Error types for hierarchy construction and lookup.

/// Errors raised while building or querying a build hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    /// A node name was declared twice.
    #[error("build node '{name}' is declared more than once")]
    DuplicateNode {
        /// The repeated name.
        name: String,
    },

    /// A depends-on edge names a node that was never declared.
    #[error("build node '{node}' depends on unknown node '{parent}'")]
    UnknownParent {
        /// The node declaring the edge.
        node: String,
        /// The undeclared parent.
        parent: String,
    },

    /// The depends-on relation contains a cycle.
    #[error("build hierarchy has a cycle: {}", path.join(" -> "))]
    Cycle {
        /// Node names along the cycle, first and last equal.
        path: Vec<String>,
    },

    /// A queried node does not exist.
    #[error("unknown build node '{name}'")]
    UnknownNode {
        /// The requested name.
        name: String,
    },
}
