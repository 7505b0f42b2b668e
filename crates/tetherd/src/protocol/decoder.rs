//! Incremental frame decoder.
//!
//! The decoder walks the grammar
//! `type "://" name "/" session "/(" length ")?" content` over an append-only
//! [`BytesMut`] buffer. Consumed bytes are split off the front of the buffer,
//! so the only state carried between invocations is the current grammar
//! position with the header fields decoded so far, and how far into the buffer
//! the current token has already been scanned for its terminator.

use bytes::{Buf, Bytes, BytesMut};
use tracing::trace;

use super::{CallType, Frame, FramePart, PROTOCOL_TARGET, ProtocolError};

/// Longest accepted header token.
pub const MAX_TOKEN_BYTES: usize = 1024;

/// Header fields decoded ahead of the content.
#[derive(Debug)]
struct Header {
    call_type: CallType,
    name: String,
    session_id: String,
    length: usize,
}

impl Header {
    fn new(call_type: CallType) -> Self {
        Self {
            call_type,
            name: String::new(),
            session_id: String::new(),
            length: 0,
        }
    }

    fn into_frame(self, content: Bytes) -> Frame {
        Frame::new(self.call_type, self.name, self.session_id, content)
    }
}

/// Grammar position. Every position past the call type owns the header
/// decoded so far.
#[derive(Debug)]
enum State {
    CallType,
    FirstSlash(Header),
    SecondSlash(Header),
    Name(Header),
    SessionId(Header),
    LeftParenthesis(Header),
    ContentLength(Header),
    QuestionMark(Header),
    Content(Header),
}

impl State {
    fn part(&self) -> FramePart {
        match self {
            Self::CallType => FramePart::CallType,
            Self::FirstSlash(_) => FramePart::FirstSlash,
            Self::SecondSlash(_) => FramePart::SecondSlash,
            Self::Name(_) => FramePart::Name,
            Self::SessionId(_) => FramePart::SessionId,
            Self::LeftParenthesis(_) => FramePart::LeftParenthesis,
            Self::ContentLength(_) => FramePart::ContentLength,
            Self::QuestionMark(_) => FramePart::QuestionMark,
            Self::Content(_) => FramePart::Content,
        }
    }
}

enum Step {
    Next(State),
    Pending(State),
    Frame(Frame),
}

/// Per-connection frame decoder. Not shareable across connections.
#[derive(Debug)]
pub struct FrameDecoder {
    state: State,
    scanned: usize,
    max_content_bytes: usize,
}

impl FrameDecoder {
    /// Creates a decoder rejecting declared content above `max_content_bytes`.
    #[must_use]
    pub fn new(max_content_bytes: usize) -> Self {
        Self {
            state: State::CallType,
            scanned: 0,
            max_content_bytes,
        }
    }

    /// Grammar position the next invocation resumes from.
    #[must_use]
    pub fn part(&self) -> FramePart {
        self.state.part()
    }

    /// Advances as far as the buffered bytes allow.
    ///
    /// Returns `Ok(None)` when more bytes are needed. A returned frame leaves
    /// the decoder at the start of the grammar, ready for the next frame on
    /// the same stream.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] when a delimiter, token, or length is
    /// malformed.
    pub fn decode(&mut self, buffer: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
        loop {
            let state = std::mem::replace(&mut self.state, State::CallType);
            match self.advance(state, buffer)? {
                Step::Next(state) => self.state = state,
                Step::Pending(state) => {
                    self.state = state;
                    return Ok(None);
                }
                Step::Frame(frame) => {
                    trace!(
                        target: PROTOCOL_TARGET,
                        call_type = %frame.call_type(),
                        name = frame.aliased_name(),
                        length = frame.content_length(),
                        "decoded frame"
                    );
                    return Ok(Some(frame));
                }
            }
        }
    }

    /// Confirms the stream ended on a frame boundary.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Truncated`] when a frame was only partially
    /// received.
    pub fn finish(&self, buffer: &BytesMut) -> Result<(), ProtocolError> {
        if matches!(self.state, State::CallType) && buffer.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::Truncated {
                part: self.part(),
                buffered: buffer.len(),
            })
        }
    }

    fn advance(&mut self, state: State, buffer: &mut BytesMut) -> Result<Step, ProtocolError> {
        let part = state.part();
        let step = match state {
            State::CallType => match self.take_token(buffer, part, b':')? {
                Some(token) => {
                    let call_type = CallType::from_token(&token)
                        .ok_or_else(|| ProtocolError::unknown_call_type(token))?;
                    Step::Next(State::FirstSlash(Header::new(call_type)))
                }
                None => Step::Pending(State::CallType),
            },
            State::FirstSlash(header) => {
                literal(buffer, part, '/', header, State::FirstSlash, State::SecondSlash)?
            }
            State::SecondSlash(header) => {
                literal(buffer, part, '/', header, State::SecondSlash, State::Name)?
            }
            State::Name(mut header) => match self.take_token(buffer, part, b'/')? {
                Some(token) => {
                    header.name = token;
                    Step::Next(State::SessionId(header))
                }
                None => Step::Pending(State::Name(header)),
            },
            State::SessionId(mut header) => match self.take_token(buffer, part, b'/')? {
                Some(token) => {
                    header.session_id = token;
                    Step::Next(State::LeftParenthesis(header))
                }
                None => Step::Pending(State::SessionId(header)),
            },
            State::LeftParenthesis(header) => literal(
                buffer,
                part,
                '(',
                header,
                State::LeftParenthesis,
                State::ContentLength,
            )?,
            State::ContentLength(mut header) => match self.take_token(buffer, part, b')')? {
                Some(token) => {
                    header.length = self.parse_length(&token)?;
                    Step::Next(State::QuestionMark(header))
                }
                None => Step::Pending(State::ContentLength(header)),
            },
            State::QuestionMark(header) => {
                literal(buffer, part, '?', header, State::QuestionMark, State::Content)?
            }
            State::Content(header) => {
                if buffer.len() < header.length {
                    Step::Pending(State::Content(header))
                } else {
                    let content = buffer.split_to(header.length).freeze();
                    Step::Frame(header.into_frame(content))
                }
            }
        };
        Ok(step)
    }

    fn take_token(
        &mut self,
        buffer: &mut BytesMut,
        part: FramePart,
        terminator: u8,
    ) -> Result<Option<String>, ProtocolError> {
        let start = self.scanned.min(buffer.len());
        let Some(offset) = buffer[start..].iter().position(|byte| *byte == terminator) else {
            if buffer.len() > MAX_TOKEN_BYTES {
                return Err(ProtocolError::TokenTooLong {
                    part,
                    limit: MAX_TOKEN_BYTES,
                });
            }
            self.scanned = buffer.len();
            return Ok(None);
        };

        let end = start + offset;
        if end > MAX_TOKEN_BYTES {
            return Err(ProtocolError::TokenTooLong {
                part,
                limit: MAX_TOKEN_BYTES,
            });
        }
        let token = buffer.split_to(end);
        buffer.advance(1);
        self.scanned = 0;
        String::from_utf8(token.to_vec())
            .map(Some)
            .map_err(|_| ProtocolError::InvalidUtf8 { part })
    }

    fn parse_length(&self, token: &str) -> Result<usize, ProtocolError> {
        if token.is_empty() || !token.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(ProtocolError::invalid_length(token));
        }
        let length = token
            .parse::<usize>()
            .map_err(|_| ProtocolError::invalid_length(token))?;
        if length > self.max_content_bytes {
            return Err(ProtocolError::ContentTooLarge {
                length,
                limit: self.max_content_bytes,
            });
        }
        Ok(length)
    }
}

/// Consumes a single delimiter byte, staying put when none is buffered yet.
fn literal(
    buffer: &mut BytesMut,
    part: FramePart,
    expected: char,
    header: Header,
    stay: fn(Header) -> State,
    next: fn(Header) -> State,
) -> Result<Step, ProtocolError> {
    let Some(&found) = buffer.first() else {
        return Ok(Step::Pending(stay(header)));
    };
    if char::from(found) != expected {
        return Err(ProtocolError::unexpected_byte(part, expected, found));
    }
    buffer.advance(1);
    Ok(Step::Next(next(header)))
}
