//! Opaque node identifiers.

use serde::{Deserialize, Serialize};

/// Opaque, copyable index of a node in a [`BuildGraph`](crate::graph::BuildGraph).
///
/// Ids are only meaningful for the graph that allocated them.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    /// Creates an id from a raw `u32` index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw `u32` index.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}
