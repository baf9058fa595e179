//! The scene graph: a node tree with O(1) lookup by handle and by path.
//!
//! # Invariants
//!
//! - exactly one root (handle [`NodeId::ROOT`], path [`ROOT_PATH`]);
//! - every other node has exactly one parent, and appears exactly once in
//!   that parent's child list;
//! - no cycles: a reparent that would put a node under its own subtree is
//!   refused;
//! - `nodes` and `paths` always describe the same node set.
//!
//! Frame application is robust rather than strict: a reference to a path
//! that was never created synthesizes the node under the root, so lossy
//! recordings still replay.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use roboview_core::{
    Command, Frame, FrameKind, Generation, ListenerSet, NodeFields, NodeId, Transform, ROOT_PATH,
};

use crate::game_state::GameState;
use crate::listener::{SceneDiff, SceneGraphListener};
use crate::node::SceneNode;

/// Hierarchical, mutable store of scene objects.
pub struct SceneGraph {
    nodes: IndexMap<NodeId, SceneNode>,
    paths: HashMap<String, NodeId>,
    next_id: u32,
    generation: Generation,
    listeners: ListenerSet<dyn SceneGraphListener>,
}

/// Accumulates the net effect of one frame.
#[derive(Default)]
struct DiffBuilder {
    added: IndexSet<NodeId>,
    removed: IndexSet<NodeId>,
    updated: IndexSet<NodeId>,
}

impl DiffBuilder {
    fn added(&mut self, id: NodeId) {
        self.added.insert(id);
    }

    fn updated(&mut self, id: NodeId) {
        if !self.added.contains(&id) {
            self.updated.insert(id);
        }
    }

    fn removed(&mut self, id: NodeId) {
        self.updated.shift_remove(&id);
        if !self.added.shift_remove(&id) {
            self.removed.insert(id);
        }
    }

    fn finish(self) -> SceneDiff {
        SceneDiff {
            added: self.added.into_iter().collect(),
            removed: self.removed.into_iter().collect(),
            updated: self.updated.into_iter().collect(),
        }
    }
}

impl SceneGraph {
    /// A graph holding only the root.
    pub fn new() -> Self {
        let mut nodes = IndexMap::new();
        nodes.insert(
            NodeId::ROOT,
            SceneNode::new(NodeId::ROOT, ROOT_PATH.to_owned(), None),
        );
        let mut paths = HashMap::new();
        paths.insert(ROOT_PATH.to_owned(), NodeId::ROOT);
        Self {
            nodes,
            paths,
            next_id: 1,
            generation: Generation::default(),
            listeners: ListenerSet::new(),
        }
    }

    // ── Queries ─────────────────────────────────────────────────

    /// The root node.
    pub fn root(&self) -> &SceneNode {
        &self.nodes[&NodeId::ROOT]
    }

    /// Look up a node by handle.
    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    /// Look up a node by wire path.
    pub fn node_by_path(&self, path: &str) -> Option<&SceneNode> {
        self.paths.get(path).and_then(|id| self.nodes.get(id))
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph holds only the root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// All nodes, root first, then in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &SceneNode> {
        self.nodes.values()
    }

    /// Number of frames applied so far.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Transform of `id` in world space (composed along its ancestors).
    pub fn world_transform(&self, id: NodeId) -> Option<Transform> {
        let mut node = self.nodes.get(&id)?;
        let mut acc = node.transform;
        while let Some(parent) = node.parent {
            node = &self.nodes[&parent];
            acc = node.transform.compose(&acc);
        }
        Some(acc)
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(c) = cursor {
            if c == ancestor {
                return true;
            }
            cursor = self.nodes.get(&c).and_then(|n| n.parent);
        }
        false
    }

    /// Structural equality: same paths, parents, transforms and models,
    /// regardless of handle numbering or generation.
    pub fn same_content(&self, other: &SceneGraph) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.nodes.values().all(|node| {
            let Some(theirs) = other.node_by_path(&node.path) else {
                return false;
            };
            let parent_path = |g: &SceneGraph, n: &SceneNode| {
                n.parent.and_then(|p| g.node(p)).map(|p| p.path.clone())
            };
            node.transform == theirs.transform
                && node.model == theirs.model
                && parent_path(self, node) == parent_path(other, theirs)
        })
    }

    // ── Listeners ───────────────────────────────────────────────

    /// Register a change listener.
    pub fn add_listener(&self, listener: Arc<dyn SceneGraphListener>) {
        self.listeners.add(listener);
    }

    /// Remove a change listener. Returns whether it was registered.
    pub fn remove_listener(&self, listener: &Arc<dyn SceneGraphListener>) -> bool {
        self.listeners.remove(listener)
    }

    /// Move every listener registered on `other` onto this graph and tell
    /// them about the replacement.
    pub fn adopt_listeners(&self, other: &SceneGraph) {
        self.listeners.absorb(&other.listeners);
        self.listeners.notify(|l| l.scene_graph_replaced(self));
    }

    /// Move listeners without notifying them.
    pub(crate) fn steal_listeners(&self, other: &SceneGraph) {
        self.listeners.absorb(&other.listeners);
    }

    // ── Frame application ───────────────────────────────────────

    /// Apply the node commands of `frame`, then bump the generation and
    /// notify listeners with the net diff.
    ///
    /// Ball and game-state commands are ignored here; see
    /// [`GameState::apply_frame`].
    pub fn apply_frame(&mut self, frame: &Frame) -> SceneDiff {
        let mut diff = DiffBuilder::default();
        // Full frames describe the whole scene. Existing nodes start out
        // stale and are revived when the frame mentions them; whatever is
        // still stale at the end is removed.
        let mut stale: IndexSet<NodeId> = match frame.kind {
            FrameKind::Full => self
                .nodes
                .keys()
                .copied()
                .filter(|&id| id != NodeId::ROOT)
                .collect(),
            FrameKind::Delta => IndexSet::new(),
        };

        for command in &frame.commands {
            match command {
                Command::CreateNode { path, fields } => {
                    if refuse_root(path, "create") {
                        continue;
                    }
                    let id = match self.paths.get(path.as_str()) {
                        Some(&id) => {
                            if stale.shift_remove(&id) {
                                self.reset_node(id);
                            }
                            diff.updated(id);
                            id
                        }
                        None => {
                            let id = self.insert_node(path.clone(), NodeId::ROOT);
                            diff.added(id);
                            id
                        }
                    };
                    self.write_fields(id, fields, &mut stale, &mut diff);
                }
                Command::UpdateNode { path, fields } => {
                    if refuse_root(path, "update") {
                        continue;
                    }
                    let id = self.resolve_or_synthesize(path, &mut stale, &mut diff);
                    diff.updated(id);
                    self.write_fields(id, fields, &mut stale, &mut diff);
                }
                Command::DeleteNode { path } => {
                    if refuse_root(path, "delete") {
                        continue;
                    }
                    match self.paths.get(path.as_str()) {
                        Some(&id) => {
                            for removed in self.remove_subtree(id) {
                                stale.shift_remove(&removed);
                                diff.removed(removed);
                            }
                        }
                        None => log::debug!("delete of unknown node `{path}` ignored"),
                    }
                }
                Command::SetBall(_) | Command::SetGameState(_) => {}
            }
        }

        for id in stale {
            // Children revived by this frame outlive their stale parent.
            let children: Vec<NodeId> = match self.nodes.get(&id) {
                Some(node) => node.children.to_vec(),
                None => continue,
            };
            for child in children {
                self.attach(child, NodeId::ROOT);
            }
            self.remove_subtree(id);
            diff.removed(id);
        }

        self.generation = self.generation.next();
        let diff = diff.finish();
        let this: &SceneGraph = self;
        this.listeners.notify(|l| l.scene_graph_changed(this, &diff));
        diff
    }

    fn resolve_or_synthesize(
        &mut self,
        path: &str,
        stale: &mut IndexSet<NodeId>,
        diff: &mut DiffBuilder,
    ) -> NodeId {
        if let Some(&id) = self.paths.get(path) {
            stale.shift_remove(&id);
            return id;
        }
        log::debug!("synthesizing unknown node `{path}` under the root");
        let id = self.insert_node(path.to_owned(), NodeId::ROOT);
        diff.added(id);
        id
    }

    fn write_fields(
        &mut self,
        id: NodeId,
        fields: &NodeFields,
        stale: &mut IndexSet<NodeId>,
        diff: &mut DiffBuilder,
    ) {
        if let Some(parent_path) = &fields.parent {
            let parent = self.resolve_or_synthesize(parent_path, stale, diff);
            if self.is_ancestor_or_self(id, parent) {
                log::warn!(
                    "refusing to reparent `{}` under `{parent_path}`: would create a cycle",
                    self.nodes[&id].path
                );
            } else {
                self.attach(id, parent);
            }
        }
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        fields.merge_into(&mut node.transform);
        if let Some(model) = &fields.model {
            node.model = Some(model.clone());
        }
    }

    fn insert_node(&mut self, path: String, parent: NodeId) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.paths.insert(path.clone(), id);
        self.nodes.insert(id, SceneNode::new(id, path, Some(parent)));
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(id);
        }
        id
    }

    /// Restore a revived node to defaults, as if freshly created under the root.
    fn reset_node(&mut self, id: NodeId) {
        self.attach(id, NodeId::ROOT);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.transform = Transform::IDENTITY;
            node.model = None;
        }
    }

    /// Move `id` under `parent`. Caller guarantees no cycle results.
    fn attach(&mut self, id: NodeId, parent: NodeId) {
        let old = self.nodes.get(&id).and_then(|n| n.parent);
        if old == Some(parent) {
            return;
        }
        if let Some(old) = old.and_then(|p| self.nodes.get_mut(&p)) {
            old.children.retain(|c| *c != id);
        }
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(id);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = Some(parent);
        }
    }

    /// Remove `id` and its whole subtree; returns the removed handles,
    /// parents before children.
    fn remove_subtree(&mut self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.get(&next) {
                order.push(next);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        if let Some(parent) = self.nodes.get(&id).and_then(|n| n.parent) {
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.children.retain(|c| *c != id);
            }
        }
        for removed in &order {
            if let Some(node) = self.nodes.shift_remove(removed) {
                self.paths.remove(&node.path);
            }
        }
        order
    }

    // ── Snapshot synthesis ──────────────────────────────────────

    /// A full frame at `time` that recreates this scene and `game`
    /// exactly when applied to any graph.
    ///
    /// Parents are emitted before their children.
    pub fn to_full_frame(&self, time: f64, game: &GameState) -> Frame {
        let mut frame = Frame::full(time);
        let mut stack: Vec<NodeId> = self.root().children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = &self.nodes[&id];
            let parent = node
                .parent
                .filter(|&p| p != NodeId::ROOT)
                .map(|p| self.nodes[&p].path.clone());
            frame.commands.push(Command::CreateNode {
                path: node.path.clone(),
                fields: NodeFields {
                    parent,
                    position: Some(node.transform.position),
                    rotation: Some(node.transform.rotation),
                    scale: Some(node.transform.scale),
                    model: node.model.clone(),
                },
            });
            stack.extend(node.children.iter().rev().copied());
        }
        frame.commands.extend(game.to_commands());
        frame
    }
}

fn refuse_root(path: &str, what: &str) -> bool {
    if path == ROOT_PATH {
        log::warn!("refusing to {what} the root node");
        return true;
    }
    false
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Clones the scene content. Listeners are not carried over.
impl Clone for SceneGraph {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            paths: self.paths.clone(),
            next_id: self.next_id,
            generation: self.generation,
            listeners: ListenerSet::new(),
        }
    }
}

impl std::fmt::Debug for SceneGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneGraph")
            .field("nodes", &self.nodes.len())
            .field("generation", &self.generation)
            .field("listeners", &self.listeners)
            .finish()
    }
}
