//! Scene-graph change notification.

use roboview_core::NodeId;

use crate::graph::SceneGraph;

/// Net effect of one applied frame on the node set.
///
/// A node created and deleted within the same frame appears in no list.
/// A node both created and updated appears only in `added`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SceneDiff {
    /// Nodes that did not exist before the frame.
    pub added: Vec<NodeId>,
    /// Nodes that existed before the frame and no longer do.
    pub removed: Vec<NodeId>,
    /// Surviving nodes whose parent, transform or model was written.
    pub updated: Vec<NodeId>,
}

impl SceneDiff {
    /// Whether the frame touched no node.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

/// Capability of components that track the scene (content managers,
/// overlays, trackers).
///
/// Callbacks run on the render thread, synchronously, after the whole
/// frame has been applied; listeners never observe a half-applied frame.
pub trait SceneGraphListener: Send + Sync {
    /// A frame was applied to `graph`.
    fn scene_graph_changed(&self, graph: &SceneGraph, diff: &SceneDiff);

    /// `graph` replaced the previous graph wholesale (new session or a
    /// graph restored after a context reset).
    fn scene_graph_replaced(&self, graph: &SceneGraph) {
        let _ = graph;
    }
}
