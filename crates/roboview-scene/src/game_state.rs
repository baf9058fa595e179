//! Match-level state carried alongside the scene graph.

use glam::Vec3;
use roboview_core::{BallUpdate, Command, Frame, GameUpdate};

/// Ball position and optional velocity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BallState {
    /// Position in field coordinates.
    pub position: Vec3,
    /// Velocity, if the source reports one.
    pub velocity: Option<Vec3>,
}

/// Play mode, clock, score, team metadata and ball.
///
/// Mutated only through [`apply_frame`](Self::apply_frame); a full frame
/// resets every field before its commands are merged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GameState {
    /// Current play mode name.
    pub play_mode: Option<String>,
    /// Play-mode table announced by the source.
    pub play_modes: Vec<String>,
    /// Match clock in seconds.
    pub match_time: f64,
    /// Current half; 0 before kick-off.
    pub half: u8,
    /// Score as `(left, right)`.
    pub score: (u32, u32),
    /// Left team name.
    pub team_left: Option<String>,
    /// Right team name.
    pub team_right: Option<String>,
    /// Ball state.
    pub ball: BallState,
    /// Timestamp of the last applied frame.
    pub sim_time: f64,
}

impl GameState {
    /// Merge the ball and game commands of `frame`.
    ///
    /// Returns whether any ball or game command was present.
    pub fn apply_frame(&mut self, frame: &Frame) -> bool {
        if frame.is_full() {
            *self = Self::default();
        }
        self.sim_time = frame.time;
        let mut touched = false;
        for command in &frame.commands {
            match command {
                Command::SetBall(ball) => {
                    self.merge_ball(ball);
                    touched = true;
                }
                Command::SetGameState(game) => {
                    self.merge_game(game);
                    touched = true;
                }
                _ => {}
            }
        }
        touched
    }

    fn merge_ball(&mut self, ball: &BallUpdate) {
        if let Some(p) = ball.position {
            self.ball.position = p;
        }
        if let Some(v) = ball.velocity {
            self.ball.velocity = Some(v);
        }
    }

    fn merge_game(&mut self, game: &GameUpdate) {
        if let Some(modes) = &game.play_modes {
            self.play_modes = modes.clone();
        }
        if let Some(mode) = &game.play_mode {
            self.play_mode = Some(mode.clone());
        }
        if let Some(t) = game.match_time {
            self.match_time = t;
        }
        if let Some(h) = game.half {
            self.half = h;
        }
        if let Some(s) = game.score {
            self.score = s;
        }
        if let Some(name) = &game.team_left {
            self.team_left = Some(name.clone());
        }
        if let Some(name) = &game.team_right {
            self.team_right = Some(name.clone());
        }
    }

    /// Commands that recreate this state when applied after a reset.
    pub fn to_commands(&self) -> Vec<Command> {
        let game = GameUpdate {
            play_mode: self.play_mode.clone(),
            play_modes: (!self.play_modes.is_empty()).then(|| self.play_modes.clone()),
            match_time: Some(self.match_time),
            half: Some(self.half),
            score: Some(self.score),
            team_left: self.team_left.clone(),
            team_right: self.team_right.clone(),
        };
        let ball = BallUpdate {
            position: Some(self.ball.position),
            velocity: self.ball.velocity,
        };
        vec![Command::SetGameState(game), Command::SetBall(ball)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(update: GameUpdate) -> Command {
        Command::SetGameState(update)
    }

    #[test]
    fn delta_merges_present_fields_only() {
        let mut gs = GameState::default();
        gs.apply_frame(&Frame::delta(1.0).with(game(GameUpdate {
            score: Some((1, 0)),
            team_left: Some("A".into()),
            ..GameUpdate::default()
        })));
        gs.apply_frame(&Frame::delta(2.0).with(game(GameUpdate {
            match_time: Some(12.5),
            ..GameUpdate::default()
        })));
        assert_eq!(gs.score, (1, 0));
        assert_eq!(gs.team_left.as_deref(), Some("A"));
        assert_eq!(gs.match_time, 12.5);
        assert_eq!(gs.sim_time, 2.0);
    }

    #[test]
    fn ball_velocity_is_kept_when_absent() {
        let mut gs = GameState::default();
        gs.apply_frame(&Frame::delta(0.0).with(Command::SetBall(BallUpdate {
            position: Some(Vec3::X),
            velocity: Some(Vec3::Y),
        })));
        let touched = gs.apply_frame(&Frame::delta(0.1).with(Command::SetBall(BallUpdate {
            position: Some(Vec3::Z),
            velocity: None,
        })));
        assert!(touched);
        assert_eq!(gs.ball.position, Vec3::Z);
        assert_eq!(gs.ball.velocity, Some(Vec3::Y));
    }

    #[test]
    fn full_frame_resets_then_merges() {
        let mut gs = GameState::default();
        gs.apply_frame(&Frame::delta(0.0).with(game(GameUpdate {
            score: Some((3, 2)),
            ..GameUpdate::default()
        })));
        gs.apply_frame(&Frame::full(5.0).with(game(GameUpdate {
            half: Some(2),
            ..GameUpdate::default()
        })));
        assert_eq!(gs.score, (0, 0));
        assert_eq!(gs.half, 2);
    }

    #[test]
    fn to_commands_recreates_state() {
        let mut gs = GameState::default();
        gs.apply_frame(
            &Frame::delta(3.0)
                .with(game(GameUpdate {
                    play_modes: Some(vec!["BeforeKickOff".into(), "PlayOn".into()]),
                    play_mode: Some("PlayOn".into()),
                    half: Some(1),
                    team_right: Some("B".into()),
                    ..GameUpdate::default()
                }))
                .with(Command::SetBall(BallUpdate {
                    position: Some(Vec3::ONE),
                    velocity: None,
                })),
        );
        let mut frame = Frame::full(3.0);
        frame.commands = gs.to_commands();
        let mut rebuilt = GameState::default();
        rebuilt.apply_frame(&frame);
        assert_eq!(rebuilt, gs);
    }
}
