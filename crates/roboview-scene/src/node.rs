//! Scene nodes.

use roboview_core::{NodeId, Transform};
use smallvec::SmallVec;

/// One object in the scene.
///
/// The parent link is a handle, not an owning pointer: the graph owns
/// every node and resolves handles through its lookup table.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneNode {
    pub(crate) id: NodeId,
    pub(crate) path: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) transform: Transform,
    pub(crate) model: Option<String>,
    pub(crate) children: SmallVec<[NodeId; 4]>,
}

impl SceneNode {
    pub(crate) fn new(id: NodeId, path: String, parent: Option<NodeId>) -> Self {
        Self {
            id,
            path,
            parent,
            transform: Transform::IDENTITY,
            model: None,
            children: SmallVec::new(),
        }
    }

    /// Handle of this node.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Wire path identifying this node.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Parent handle; `None` only for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Local transform relative to the parent.
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Visual reference (model name), if any.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Child handles in attachment order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Whether this is the root node.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}
