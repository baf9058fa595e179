//! Message → [`Frame`] decoding.
//!
//! Decoding fails fast: the first malformed token aborts the message with
//! its byte offset. Nothing is skipped silently except unknown optional
//! fields inside a known command, which are stepped over as balanced
//! expressions. Each message is decoded on its own, so a failure never
//! desynchronizes the following message.

use std::borrow::Cow;
use std::str::FromStr;

use glam::{Quat, Vec3};
use roboview_core::{BallUpdate, Command, Frame, FrameKind, GameUpdate, NodeFields};

use crate::error::{DecodeError, DecodeErrorKind};
use crate::lexer::{Lexer, Token};

/// Stateful decoder for one message stream.
///
/// The server announces the play-mode table once (`(game (modes ...))`)
/// and afterwards refers to play modes by index. The decoder remembers
/// the table so later indices resolve to names. Context is committed only
/// when a whole message decodes, so a corrupt message cannot poison the
/// stream.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Decoder {
    play_modes: Vec<String>,
}

impl Decoder {
    /// A decoder with empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current play-mode table.
    pub fn play_modes(&self) -> &[String] {
        &self.play_modes
    }

    /// Replace the play-mode table, e.g. when restoring a checkpoint.
    pub fn set_play_modes(&mut self, modes: Vec<String>) {
        self.play_modes = modes;
    }

    /// Forget all stream context.
    pub fn reset(&mut self) {
        self.play_modes.clear();
    }

    /// Decode one complete message.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<Frame, DecodeError> {
        let src = std::str::from_utf8(bytes)
            .map_err(|e| DecodeError::new(e.valid_up_to(), DecodeErrorKind::InvalidUtf8))?;
        let mut lx = Lexer::new(src);
        let mut msg = MessageDecoder {
            committed: &self.play_modes,
            pending: None,
        };

        let (kind, time) = header(&mut lx)?;
        let mut frame = Frame {
            time,
            kind,
            commands: Vec::new(),
        };
        loop {
            match lx.next_token()? {
                (_, Token::Close) => break,
                (_, Token::Open) => frame.commands.push(msg.command(&mut lx)?),
                (at, Token::End) => return Err(DecodeError::new(at, DecodeErrorKind::Truncated)),
                (at, Token::Atom(_)) => {
                    return Err(DecodeError::new(at, DecodeErrorKind::Expected("command")))
                }
            }
        }
        match lx.next_token()? {
            (_, Token::End) => {}
            (at, _) => return Err(DecodeError::new(at, DecodeErrorKind::TrailingData)),
        }

        let MessageDecoder { pending, .. } = msg;
        if let Some(modes) = pending {
            self.play_modes = modes;
        }
        Ok(frame)
    }
}

/// Decode a single message with a fresh [`Decoder`].
pub fn decode(bytes: &[u8]) -> Result<Frame, DecodeError> {
    Decoder::new().decode(bytes)
}

/// Read only the frame kind and timestamp of a message.
///
/// Used when indexing logs: the rest of the message is not validated.
pub fn peek_header(bytes: &[u8]) -> Result<(FrameKind, f64), DecodeError> {
    // The header lives in the first few dozen bytes; tolerate a cut in the
    // middle of a multi-byte character further on.
    let src = match std::str::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) if e.valid_up_to() > 0 => {
            std::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default()
        }
        Err(e) => return Err(DecodeError::new(e.valid_up_to(), DecodeErrorKind::InvalidUtf8)),
    };
    header(&mut Lexer::new(src))
}

fn header(lx: &mut Lexer<'_>) -> Result<(FrameKind, f64), DecodeError> {
    expect_open(lx)?;
    let (at, kind) = atom(lx, "frame kind")?;
    let kind = match kind.as_ref() {
        "full" => FrameKind::Full,
        "delta" => FrameKind::Delta,
        other => {
            return Err(DecodeError::new(
                at,
                DecodeErrorKind::UnknownFrameKind(other.to_owned()),
            ))
        }
    };
    let time = number::<f64>(lx)?;
    Ok((kind, time))
}

struct MessageDecoder<'c> {
    committed: &'c [String],
    pending: Option<Vec<String>>,
}

impl MessageDecoder<'_> {
    /// Decode a command whose opening parenthesis was already consumed.
    fn command(&mut self, lx: &mut Lexer<'_>) -> Result<Command, DecodeError> {
        let (at, tag) = atom(lx, "command tag")?;
        match tag.as_ref() {
            "new" => {
                let path = atom(lx, "node path")?.1.into_owned();
                let fields = node_fields(lx)?;
                Ok(Command::CreateNode { path, fields })
            }
            "upd" => {
                let path = atom(lx, "node path")?.1.into_owned();
                let fields = node_fields(lx)?;
                Ok(Command::UpdateNode { path, fields })
            }
            "del" => {
                let path = atom(lx, "node path")?.1.into_owned();
                expect_close(lx)?;
                Ok(Command::DeleteNode { path })
            }
            "ball" => Ok(Command::SetBall(ball_fields(lx)?)),
            "game" => Ok(Command::SetGameState(self.game_fields(lx)?)),
            other => Err(DecodeError::new(
                at,
                DecodeErrorKind::UnknownCommand(other.to_owned()),
            )),
        }
    }

    fn game_fields(&mut self, lx: &mut Lexer<'_>) -> Result<GameUpdate, DecodeError> {
        let mut update = GameUpdate::default();
        while let Some((at, tag)) = field_tag(lx)? {
            match tag.as_ref() {
                "mode" => {
                    let (mode_at, mode) = atom(lx, "play mode")?;
                    update.play_mode = Some(self.resolve_mode(mode_at, mode)?);
                }
                "modes" => {
                    let mut modes = Vec::new();
                    loop {
                        match lx.next_token()? {
                            (_, Token::Atom(m)) => modes.push(m.into_owned()),
                            (_, Token::Close) => break,
                            (end, Token::End) => {
                                return Err(DecodeError::new(end, DecodeErrorKind::Truncated))
                            }
                            (other, Token::Open) => {
                                return Err(DecodeError::new(
                                    other,
                                    DecodeErrorKind::Expected("play mode name"),
                                ))
                            }
                        }
                    }
                    self.pending = Some(modes.clone());
                    update.play_modes = Some(modes);
                    continue;
                }
                "time" => update.match_time = Some(number(lx)?),
                "half" => update.half = Some(number(lx)?),
                "score" => update.score = Some((number(lx)?, number(lx)?)),
                "team_left" => update.team_left = Some(atom(lx, "team name")?.1.into_owned()),
                "team_right" => update.team_right = Some(atom(lx, "team name")?.1.into_owned()),
                _ => {
                    log::trace!("skipping unknown game field `{tag}` at byte {at}");
                    skip_rest(lx)?;
                    continue;
                }
            }
            expect_close(lx)?;
        }
        Ok(update)
    }

    fn resolve_mode(&self, at: usize, mode: Cow<'_, str>) -> Result<String, DecodeError> {
        let Ok(index) = mode.parse::<usize>() else {
            return Ok(mode.into_owned());
        };
        let table = self.pending.as_deref().unwrap_or(self.committed);
        if table.is_empty() {
            return Err(DecodeError::new(at, DecodeErrorKind::NoPlayModeTable(index)));
        }
        table.get(index).cloned().ok_or_else(|| {
            DecodeError::new(
                at,
                DecodeErrorKind::PlayModeOutOfRange {
                    index,
                    len: table.len(),
                },
            )
        })
    }
}

fn node_fields(lx: &mut Lexer<'_>) -> Result<NodeFields, DecodeError> {
    let mut fields = NodeFields::default();
    while let Some((at, tag)) = field_tag(lx)? {
        match tag.as_ref() {
            "pos" => fields.position = Some(vec3(lx)?),
            "rot" => fields.rotation = Some(quat(lx)?),
            "scale" => fields.scale = Some(vec3(lx)?),
            "model" => fields.model = Some(atom(lx, "model name")?.1.into_owned()),
            "parent" => fields.parent = Some(atom(lx, "parent path")?.1.into_owned()),
            _ => {
                log::trace!("skipping unknown node field `{tag}` at byte {at}");
                skip_rest(lx)?;
                continue;
            }
        }
        expect_close(lx)?;
    }
    Ok(fields)
}

fn ball_fields(lx: &mut Lexer<'_>) -> Result<BallUpdate, DecodeError> {
    let mut ball = BallUpdate::default();
    while let Some((at, tag)) = field_tag(lx)? {
        match tag.as_ref() {
            "pos" => ball.position = Some(vec3(lx)?),
            "vel" => ball.velocity = Some(vec3(lx)?),
            _ => {
                log::trace!("skipping unknown ball field `{tag}` at byte {at}");
                skip_rest(lx)?;
                continue;
            }
        }
        expect_close(lx)?;
    }
    Ok(ball)
}

// ── Token helpers ───────────────────────────────────────────────

/// Next field of a command: `Some((offset, tag))` after consuming `(tag`,
/// or `None` after consuming the command's closing parenthesis.
fn field_tag<'a>(lx: &mut Lexer<'a>) -> Result<Option<(usize, Cow<'a, str>)>, DecodeError> {
    match lx.next_token()? {
        (_, Token::Close) => Ok(None),
        (_, Token::Open) => atom(lx, "field tag").map(Some),
        (at, Token::End) => Err(DecodeError::new(at, DecodeErrorKind::Truncated)),
        (at, Token::Atom(_)) => Err(DecodeError::new(at, DecodeErrorKind::Expected("field"))),
    }
}

fn expect_open(lx: &mut Lexer<'_>) -> Result<(), DecodeError> {
    match lx.next_token()? {
        (_, Token::Open) => Ok(()),
        (at, Token::End) => Err(DecodeError::new(at, DecodeErrorKind::Truncated)),
        (at, _) => Err(DecodeError::new(at, DecodeErrorKind::Expected("`(`"))),
    }
}

fn expect_close(lx: &mut Lexer<'_>) -> Result<(), DecodeError> {
    match lx.next_token()? {
        (_, Token::Close) => Ok(()),
        (at, Token::End) => Err(DecodeError::new(at, DecodeErrorKind::Truncated)),
        (at, _) => Err(DecodeError::new(at, DecodeErrorKind::Expected("`)`"))),
    }
}

fn atom<'a>(lx: &mut Lexer<'a>, what: &'static str) -> Result<(usize, Cow<'a, str>), DecodeError> {
    match lx.next_token()? {
        (at, Token::Atom(a)) => Ok((at, a)),
        (at, Token::End) => Err(DecodeError::new(at, DecodeErrorKind::Truncated)),
        (at, _) => Err(DecodeError::new(at, DecodeErrorKind::Expected(what))),
    }
}

fn number<T: FromStr>(lx: &mut Lexer<'_>) -> Result<T, DecodeError> {
    let (at, a) = atom(lx, "number")?;
    a.parse::<T>()
        .map_err(|_| DecodeError::new(at, DecodeErrorKind::InvalidNumber(a.into_owned())))
}

fn vec3(lx: &mut Lexer<'_>) -> Result<Vec3, DecodeError> {
    Ok(Vec3::new(number(lx)?, number(lx)?, number(lx)?))
}

/// `w x y z` order, as sent on the wire.
fn quat(lx: &mut Lexer<'_>) -> Result<Quat, DecodeError> {
    let w = number(lx)?;
    let (x, y, z) = (number(lx)?, number(lx)?, number(lx)?);
    Ok(Quat::from_xyzw(x, y, z, w))
}

/// Skip to the end of an expression whose `(` and tag were consumed.
fn skip_rest(lx: &mut Lexer<'_>) -> Result<(), DecodeError> {
    let mut depth = 1usize;
    while depth > 0 {
        match lx.next_token()? {
            (_, Token::Open) => depth += 1,
            (_, Token::Close) => depth -= 1,
            (_, Token::Atom(_)) => {}
            (at, Token::End) => return Err(DecodeError::new(at, DecodeErrorKind::Truncated)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_all_command_kinds() {
        let msg = br#"(delta 1.5
            (new ball (pos 0 0 0.11) (model models/soccerball.obj))
            (upd agent_l_1 (rot 1 0 0 0) (parent field))
            (del old)
            (ball (pos 1 2 3) (vel 0 0 0))
            (game (mode PlayOn) (score 1 0) (team_left "Team A")))"#;
        let frame = decode(msg).unwrap();
        assert_eq!(frame.time, 1.5);
        assert_eq!(frame.kind, FrameKind::Delta);
        assert_eq!(frame.commands.len(), 5);

        match &frame.commands[0] {
            Command::CreateNode { path, fields } => {
                assert_eq!(path, "ball");
                assert_eq!(fields.position, Some(Vec3::new(0.0, 0.0, 0.11)));
                assert_eq!(fields.model.as_deref(), Some("models/soccerball.obj"));
                assert!(fields.rotation.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
        match &frame.commands[1] {
            Command::UpdateNode { fields, .. } => {
                assert_eq!(fields.rotation, Some(Quat::IDENTITY));
                assert_eq!(fields.parent.as_deref(), Some("field"));
                assert!(fields.position.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
        match &frame.commands[4] {
            Command::SetGameState(g) => {
                assert_eq!(g.play_mode.as_deref(), Some("PlayOn"));
                assert_eq!(g.score, Some((1, 0)));
                assert_eq!(g.team_left.as_deref(), Some("Team A"));
                assert!(g.match_time.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn full_frame_kind() {
        let frame = decode(b"(full 0)").unwrap();
        assert!(frame.is_full());
        assert!(frame.commands.is_empty());
    }

    #[test]
    fn unknown_fields_are_skipped() {
        let frame = decode(b"(delta 2 (upd a (glow (rgb 1 0 0) 3) (pos 1 1 1)))").unwrap();
        match &frame.commands[0] {
            Command::UpdateNode { fields, .. } => {
                assert_eq!(fields.position, Some(Vec3::ONE));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_command_is_rejected_at_tag() {
        let err = decode(b"(delta 2 (warp a))").unwrap_err();
        assert_eq!(err.offset, 10);
        assert_eq!(err.reason, DecodeErrorKind::UnknownCommand("warp".into()));
    }

    #[test]
    fn missing_required_number() {
        let err = decode(b"(delta 2 (upd a (pos 1 2)))").unwrap_err();
        assert_eq!(err.reason, DecodeErrorKind::Expected("number"));
        assert_eq!(err.offset, 24);
    }

    #[test]
    fn bad_number() {
        let err = decode(b"(delta 2 (upd a (pos 1 x 3)))").unwrap_err();
        assert_eq!(err.reason, DecodeErrorKind::InvalidNumber("x".into()));
        assert_eq!(err.offset, 23);
    }

    #[test]
    fn missing_timestamp() {
        let err = decode(b"(delta (upd a))").unwrap_err();
        assert_eq!(err.reason, DecodeErrorKind::Expected("number"));
        assert_eq!(err.offset, 7);
    }

    #[test]
    fn trailing_data_is_rejected() {
        let err = decode(b"(delta 1) (delta 2)").unwrap_err();
        assert_eq!(err.reason, DecodeErrorKind::TrailingData);
        assert_eq!(err.offset, 10);
    }

    #[test]
    fn trailing_whitespace_is_fine() {
        assert!(decode(b"(delta 1)\r\n").is_ok());
    }

    #[test]
    fn play_mode_index_resolves_through_table() {
        let mut dec = Decoder::new();
        dec.decode(b"(full 0 (game (modes BeforeKickOff KickOff_Left PlayOn) (mode 0)))")
            .unwrap();
        assert_eq!(dec.play_modes().len(), 3);

        let frame = dec.decode(b"(delta 1 (game (mode 2)))").unwrap();
        match &frame.commands[0] {
            Command::SetGameState(g) => assert_eq!(g.play_mode.as_deref(), Some("PlayOn")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn play_mode_index_without_table() {
        let err = Decoder::new().decode(b"(delta 1 (game (mode 2)))").unwrap_err();
        assert_eq!(err.reason, DecodeErrorKind::NoPlayModeTable(2));
    }

    #[test]
    fn failed_message_does_not_commit_context() {
        let mut dec = Decoder::new();
        dec.decode(b"(full 0 (game (modes A B)))").unwrap();
        // Redefines the table, then fails.
        assert!(dec.decode(b"(delta 1 (game (modes X)) (bogus))").is_err());
        assert_eq!(dec.play_modes(), &["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn peek_header_reads_kind_and_time() {
        assert_eq!(
            peek_header(b"(full 12.5 (this is not checked").unwrap(),
            (FrameKind::Full, 12.5)
        );
        assert!(peek_header(b"(snap 1)").is_err());
    }
}
