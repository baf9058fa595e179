//! Strongly-typed identifiers for scene nodes and graph generations.

use std::fmt;

/// Wire path reserved for the scene root.
///
/// Commands addressing this path are refused: the root is created with
/// the graph and lives until the graph is dropped.
pub const ROOT_PATH: &str = "root";

/// Handle of a node inside one scene graph.
///
/// Handles are allocated sequentially by the graph, so applying the same
/// frame sequence to two fresh graphs yields the same handles. A handle is
/// never reused within a graph, even after the node is removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Handle of the root node in every graph.
    pub const ROOT: NodeId = NodeId(0);
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Counts successfully applied frames.
///
/// Incremented exactly once per applied frame, after the whole frame has
/// been applied. Renderers compare generations to skip unchanged scenes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(pub u64);

impl Generation {
    /// The following generation.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Generation {
    fn from(v: u64) -> Self {
        Self(v)
    }
}
