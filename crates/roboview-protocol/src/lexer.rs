//! Tokenizer for the S-expression wire format.
//!
//! Offsets are byte positions into the message. Atoms are either bare
//! (anything up to whitespace, a parenthesis or a quote) or double-quoted
//! with `\"` and `\\` escapes.

use std::borrow::Cow;

use crate::error::{DecodeError, DecodeErrorKind};

#[derive(Debug, PartialEq)]
pub(crate) enum Token<'a> {
    Open,
    Close,
    Atom(Cow<'a, str>),
    End,
}

pub(crate) struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.src[self.pos..];
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
    }

    /// Next token and the offset it starts at.
    pub fn next_token(&mut self) -> Result<(usize, Token<'a>), DecodeError> {
        self.skip_whitespace();
        let src = self.src;
        let start = self.pos;
        let bytes = src.as_bytes();
        let Some(&b) = bytes.get(start) else {
            return Ok((start, Token::End));
        };
        match b {
            b'(' => {
                self.pos += 1;
                Ok((start, Token::Open))
            }
            b')' => {
                self.pos += 1;
                Ok((start, Token::Close))
            }
            b'"' => self.quoted(start),
            _ => {
                let mut end = start;
                while let Some(&c) = bytes.get(end) {
                    if c.is_ascii_whitespace() || c == b'(' || c == b')' || c == b'"' {
                        break;
                    }
                    end += 1;
                }
                self.pos = end;
                Ok((start, Token::Atom(Cow::Borrowed(&src[start..end]))))
            }
        }
    }

    fn quoted(&mut self, start: usize) -> Result<(usize, Token<'a>), DecodeError> {
        let src = self.src;
        let body_start = start + 1;
        let mut owned: Option<String> = None;
        let mut chars = src[body_start..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos = body_start + i + 1;
                    let atom = match owned {
                        Some(s) => Cow::Owned(s),
                        None => Cow::Borrowed(&src[body_start..body_start + i]),
                    };
                    return Ok((start, Token::Atom(atom)));
                }
                '\\' => {
                    let buf =
                        owned.get_or_insert_with(|| src[body_start..body_start + i].to_owned());
                    match chars.next() {
                        Some((_, escaped)) => buf.push(escaped),
                        None => break,
                    }
                }
                _ => {
                    if let Some(buf) = owned.as_mut() {
                        buf.push(c);
                    }
                }
            }
        }
        Err(DecodeError::new(src.len(), DecodeErrorKind::Truncated))
    }
}

/// Whether `s` can be written as a bare atom.
pub(crate) fn is_bare(s: &str) -> bool {
    !s.is_empty()
        && !s
            .bytes()
            .any(|c| c.is_ascii_whitespace() || c == b'(' || c == b')' || c == b'"' || c == b'\\')
}
