//! Canned frame sequences.
//!
//! - [`ball_scenario`]: create, move, delete a single "ball" node.
//! - [`walking_agent`]: one agent with a child head, moving every frame.
//! - [`moving_team`]: several agents, a full frame every few frames, with
//!   game-state and ball commands mixed in.

use glam::{Quat, Vec3};
use roboview_core::{BallUpdate, Command, Frame, GameUpdate, NodeFields};

/// Play modes announced by [`play_mode_table`].
pub const TEAM_PLAY_MODES: [&str; 4] = ["BeforeKickOff", "KickOff_Left", "PlayOn", "Goal_Left"];

/// Three frames: create "ball" at the origin, move it to (1,0,0), delete it.
pub fn ball_scenario() -> Vec<Frame> {
    vec![
        Frame::delta(0.0).with(Command::create_at("ball", Vec3::ZERO)),
        Frame::delta(0.02).with(Command::move_to("ball", Vec3::X)),
        Frame::delta(0.04).with(Command::delete("ball")),
    ]
}

/// A game command carrying the whole play-mode table.
pub fn play_mode_table() -> Command {
    Command::SetGameState(GameUpdate {
        play_modes: Some(TEAM_PLAY_MODES.iter().map(|m| m.to_string()).collect()),
        play_mode: Some(TEAM_PLAY_MODES[0].to_owned()),
        ..GameUpdate::default()
    })
}

/// `n` delta frames of a single agent walking along x.
pub fn walking_agent(n: usize) -> Vec<Frame> {
    let mut frames = Vec::with_capacity(n);
    for i in 0..n {
        let t = i as f64 * 0.02;
        let x = i as f32 * 0.1;
        let frame = if i == 0 {
            Frame::delta(t)
                .with(Command::CreateNode {
                    path: "agent".into(),
                    fields: NodeFields {
                        position: Some(Vec3::new(x, 0.0, 0.0)),
                        model: Some("nao".into()),
                        ..NodeFields::default()
                    },
                })
                .with(Command::CreateNode {
                    path: "agent/head".into(),
                    fields: NodeFields {
                        parent: Some("agent".into()),
                        position: Some(Vec3::new(0.0, 0.0, 0.5)),
                        ..NodeFields::default()
                    },
                })
        } else {
            Frame::delta(t)
                .with(Command::move_to("agent", Vec3::new(x, 0.0, 0.0)))
                .with(Command::UpdateNode {
                    path: "agent/head".into(),
                    fields: NodeFields {
                        rotation: Some(Quat::from_rotation_z(i as f32 * 0.05)),
                        ..NodeFields::default()
                    },
                })
        };
        frames.push(frame);
    }
    frames
}

/// `n` frames of `agents` agents. Every `full_every`-th frame (when
/// non-zero) is a full frame restating the scene; the others are deltas.
///
/// Also drives the ball, the match clock and the score, and deletes and
/// recreates one agent periodically so replays cover removal.
pub fn moving_team(n: usize, agents: usize, full_every: usize) -> Vec<Frame> {
    let mut frames = Vec::with_capacity(n);
    for i in 0..n {
        let t = i as f64 * 0.02;
        let full = i == 0 || (full_every > 0 && i % full_every == 0);
        let mut frame = if full { Frame::full(t) } else { Frame::delta(t) };
        if full {
            frame.commands.push(play_mode_table());
        }
        for a in 0..agents {
            let path = format!("team/agent{a}");
            let pos = Vec3::new(a as f32, (i as f32 * 0.05).sin(), 0.0);
            // agent0 drops out for frames 7..10 of every 20.
            let absent = a == 0 && (7..10).contains(&(i % 20));
            if absent {
                if i % 20 == 7 && !full {
                    frame.commands.push(Command::delete(path));
                }
                continue;
            }
            let cmd = if full || i == 0 || (a == 0 && i % 20 == 10) {
                Command::create_at(path, pos)
            } else {
                Command::move_to(path, pos)
            };
            frame.commands.push(cmd);
        }
        frame.commands.push(Command::SetBall(BallUpdate {
            position: Some(Vec3::new(i as f32 * 0.01, 0.0, 0.11)),
            velocity: (i % 2 == 0).then_some(Vec3::new(0.5, 0.0, 0.0)),
        }));
        frame.commands.push(Command::SetGameState(GameUpdate {
            match_time: Some(t),
            play_mode: (i == 1).then(|| TEAM_PLAY_MODES[2].to_owned()),
            score: (i % 25 == 24).then_some(((i / 25 + 1) as u32, 0)),
            ..GameUpdate::default()
        }));
        frames.push(frame);
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_shapes() {
        assert_eq!(ball_scenario().len(), 3);
        let team = moving_team(30, 3, 10);
        assert_eq!(team.len(), 30);
        assert!(team[0].is_full());
        assert!(team[10].is_full());
        assert!(!team[11].is_full());
        assert!(walking_agent(5).iter().all(|f| !f.is_full()));
    }
}
