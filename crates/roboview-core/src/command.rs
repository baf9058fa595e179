//! Decoded frames and the commands they carry.
//!
//! Every optional field follows the same rule: `None` means "leave the
//! current value unchanged", never "reset to zero". Merging happens when
//! the frame is applied to the scene, so a frame on its own is only
//! meaningful relative to the state it is applied on.

use glam::{Quat, Vec3};

use crate::transform::Transform;

/// Whether a frame is relative to the current scene or replaces it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Commands update the existing scene.
    Delta,
    /// The scene is cleared before the commands are applied.
    ///
    /// Full frames are self-contained and serve as seek anchors.
    Full,
}

/// One timestamped batch of scene-state commands.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Simulation time in seconds.
    pub time: f64,
    /// Delta or full.
    pub kind: FrameKind,
    /// Commands, applied in order.
    pub commands: Vec<Command>,
}

impl Frame {
    /// An empty delta frame at `time`.
    pub fn delta(time: f64) -> Self {
        Self {
            time,
            kind: FrameKind::Delta,
            commands: Vec::new(),
        }
    }

    /// An empty full frame at `time`.
    pub fn full(time: f64) -> Self {
        Self {
            time,
            kind: FrameKind::Full,
            commands: Vec::new(),
        }
    }

    /// Append a command, builder style.
    pub fn with(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    /// Whether this frame replaces the scene.
    pub fn is_full(&self) -> bool {
        self.kind == FrameKind::Full
    }
}

/// A single scene-state change.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Create a node. Creating an existing path updates it instead.
    CreateNode {
        /// Wire path of the node.
        path: String,
        /// Initial field values; absent fields take defaults.
        fields: NodeFields,
    },
    /// Update a node. An unknown path is synthesized under the root.
    UpdateNode {
        /// Wire path of the node.
        path: String,
        /// Changed fields.
        fields: NodeFields,
    },
    /// Remove a node and its whole subtree.
    DeleteNode {
        /// Wire path of the node.
        path: String,
    },
    /// Update the ball state.
    SetBall(BallUpdate),
    /// Update the game state.
    SetGameState(GameUpdate),
}

impl Command {
    /// Shorthand for a create command that only sets a position.
    pub fn create_at(path: impl Into<String>, position: Vec3) -> Self {
        Self::CreateNode {
            path: path.into(),
            fields: NodeFields {
                position: Some(position),
                ..NodeFields::default()
            },
        }
    }

    /// Shorthand for an update command that only moves a node.
    pub fn move_to(path: impl Into<String>, position: Vec3) -> Self {
        Self::UpdateNode {
            path: path.into(),
            fields: NodeFields {
                position: Some(position),
                ..NodeFields::default()
            },
        }
    }

    /// Shorthand for a delete command.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::DeleteNode { path: path.into() }
    }
}

/// Node fields carried by create and update commands.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeFields {
    /// New parent path.
    pub parent: Option<String>,
    /// New local position.
    pub position: Option<Vec3>,
    /// New local orientation.
    pub rotation: Option<Quat>,
    /// New local scale.
    pub scale: Option<Vec3>,
    /// New visual reference (model name).
    pub model: Option<String>,
}

impl NodeFields {
    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        self.parent.is_none()
            && self.position.is_none()
            && self.rotation.is_none()
            && self.scale.is_none()
            && self.model.is_none()
    }

    /// Merge the transform fields that are present into `transform`.
    pub fn merge_into(&self, transform: &mut Transform) {
        if let Some(p) = self.position {
            transform.position = p;
        }
        if let Some(r) = self.rotation {
            transform.rotation = r;
        }
        if let Some(s) = self.scale {
            transform.scale = s;
        }
    }
}

/// Ball fields.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BallUpdate {
    /// New ball position.
    pub position: Option<Vec3>,
    /// New ball velocity.
    pub velocity: Option<Vec3>,
}

/// Game-state fields.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GameUpdate {
    /// Play mode name, already resolved through the play-mode table.
    pub play_mode: Option<String>,
    /// Replacement play-mode table.
    pub play_modes: Option<Vec<String>>,
    /// Match clock in seconds.
    pub match_time: Option<f64>,
    /// Current half (1 or 2; extra time continues counting).
    pub half: Option<u8>,
    /// Score as `(left, right)`.
    pub score: Option<(u32, u32)>,
    /// Left team name.
    pub team_left: Option<String>,
    /// Right team name.
    pub team_right: Option<String>,
}

impl GameUpdate {
    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_absent_fields() {
        let mut t = Transform::from_position(Vec3::new(1.0, 2.0, 3.0));
        let fields = NodeFields {
            scale: Some(Vec3::splat(2.0)),
            ..NodeFields::default()
        };
        fields.merge_into(&mut t);
        assert_eq!(t.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(t.scale, Vec3::splat(2.0));
        assert_eq!(t.rotation, Quat::IDENTITY);
    }

    #[test]
    fn builder_appends_in_order() {
        let frame = Frame::delta(1.5)
            .with(Command::create_at("ball", Vec3::ZERO))
            .with(Command::delete("ball"));
        assert_eq!(frame.commands.len(), 2);
        assert!(!frame.is_full());
        assert!(matches!(frame.commands[1], Command::DeleteNode { .. }));
    }

    #[test]
    fn empty_updates() {
        assert!(NodeFields::default().is_empty());
        assert!(GameUpdate::default().is_empty());
        let g = GameUpdate {
            half: Some(2),
            ..GameUpdate::default()
        };
        assert!(!g.is_empty());
    }
}
