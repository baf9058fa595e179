//! [`Frame`] → message encoding.
//!
//! Produces the canonical textual form accepted by [`Decoder`](crate::Decoder).
//! Only fields that are present are written, so an encoded delta stays a
//! delta. Play modes are always written by name.

use std::fmt::Write as _;

use glam::{Quat, Vec3};
use roboview_core::{BallUpdate, Command, Frame, FrameKind, GameUpdate, NodeFields};

use crate::lexer::is_bare;

/// Encode a frame as one message (no trailing newline).
pub fn encode_frame(frame: &Frame) -> String {
    let mut out = String::with_capacity(32 + frame.commands.len() * 48);
    let kind = match frame.kind {
        FrameKind::Full => "full",
        FrameKind::Delta => "delta",
    };
    let _ = write!(out, "({kind} {}", frame.time);
    for command in &frame.commands {
        out.push(' ');
        encode_command(&mut out, command);
    }
    out.push(')');
    out
}

fn encode_command(out: &mut String, command: &Command) {
    match command {
        Command::CreateNode { path, fields } => {
            out.push_str("(new ");
            push_atom(out, path);
            encode_node_fields(out, fields);
            out.push(')');
        }
        Command::UpdateNode { path, fields } => {
            out.push_str("(upd ");
            push_atom(out, path);
            encode_node_fields(out, fields);
            out.push(')');
        }
        Command::DeleteNode { path } => {
            out.push_str("(del ");
            push_atom(out, path);
            out.push(')');
        }
        Command::SetBall(ball) => encode_ball(out, ball),
        Command::SetGameState(game) => encode_game(out, game),
    }
}

fn encode_node_fields(out: &mut String, fields: &NodeFields) {
    if let Some(parent) = &fields.parent {
        out.push_str(" (parent ");
        push_atom(out, parent);
        out.push(')');
    }
    if let Some(p) = fields.position {
        push_vec3(out, "pos", p);
    }
    if let Some(r) = fields.rotation {
        push_quat(out, r);
    }
    if let Some(s) = fields.scale {
        push_vec3(out, "scale", s);
    }
    if let Some(model) = &fields.model {
        out.push_str(" (model ");
        push_atom(out, model);
        out.push(')');
    }
}

fn encode_ball(out: &mut String, ball: &BallUpdate) {
    out.push_str("(ball");
    if let Some(p) = ball.position {
        push_vec3(out, "pos", p);
    }
    if let Some(v) = ball.velocity {
        push_vec3(out, "vel", v);
    }
    out.push(')');
}

fn encode_game(out: &mut String, game: &GameUpdate) {
    out.push_str("(game");
    // The table goes first so an index-free reader sees it before any mode.
    if let Some(modes) = &game.play_modes {
        out.push_str(" (modes");
        for m in modes {
            out.push(' ');
            push_atom(out, m);
        }
        out.push(')');
    }
    if let Some(mode) = &game.play_mode {
        out.push_str(" (mode ");
        push_atom(out, mode);
        out.push(')');
    }
    if let Some(t) = game.match_time {
        let _ = write!(out, " (time {t})");
    }
    if let Some(h) = game.half {
        let _ = write!(out, " (half {h})");
    }
    if let Some((l, r)) = game.score {
        let _ = write!(out, " (score {l} {r})");
    }
    if let Some(name) = &game.team_left {
        out.push_str(" (team_left ");
        push_atom(out, name);
        out.push(')');
    }
    if let Some(name) = &game.team_right {
        out.push_str(" (team_right ");
        push_atom(out, name);
        out.push(')');
    }
    out.push(')');
}

fn push_vec3(out: &mut String, tag: &str, v: Vec3) {
    let _ = write!(out, " ({tag} {} {} {})", v.x, v.y, v.z);
}

fn push_quat(out: &mut String, q: Quat) {
    let _ = write!(out, " (rot {} {} {} {})", q.w, q.x, q.y, q.z);
}

fn push_atom(out: &mut String, s: &str) {
    if is_bare(s) {
        out.push_str(s);
        return;
    }
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode;

    #[test]
    fn only_present_fields_are_written() {
        let frame = Frame::delta(3.25).with(Command::move_to("ball", Vec3::new(1.0, 0.0, 0.5)));
        assert_eq!(encode_frame(&frame), "(delta 3.25 (upd ball (pos 1 0 0.5)))");
    }

    #[test]
    fn names_with_spaces_are_quoted() {
        let frame = Frame::full(0.0).with(Command::SetGameState(GameUpdate {
            team_left: Some("Team \"A\"".into()),
            ..GameUpdate::default()
        }));
        let text = encode_frame(&frame);
        assert_eq!(text, r#"(full 0 (game (team_left "Team \"A\"")))"#);
        assert_eq!(decode(text.as_bytes()).unwrap(), frame);
    }

    #[test]
    fn mixed_frame_survives_decode() {
        let frame = Frame::delta(7.0)
            .with(Command::CreateNode {
                path: "agent_l_1".into(),
                fields: NodeFields {
                    parent: Some("field".into()),
                    position: Some(Vec3::new(-1.5, 2.0, 0.3)),
                    rotation: Some(Quat::from_rotation_z(0.5)),
                    scale: None,
                    model: Some("models/nao.obj".into()),
                },
            })
            .with(Command::delete("old"))
            .with(Command::SetBall(BallUpdate {
                position: Some(Vec3::ZERO),
                velocity: Some(Vec3::X),
            }))
            .with(Command::SetGameState(GameUpdate {
                play_modes: Some(vec!["BeforeKickOff".into(), "PlayOn".into()]),
                play_mode: Some("PlayOn".into()),
                match_time: Some(12.5),
                half: Some(1),
                score: Some((0, 2)),
                team_left: None,
                team_right: Some("b".into()),
            }));
        assert_eq!(decode(encode_frame(&frame).as_bytes()).unwrap(), frame);
    }
}
