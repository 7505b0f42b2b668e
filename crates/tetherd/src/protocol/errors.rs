//! Error types for wire protocol parsing.

use std::fmt;
use std::io;

use thiserror::Error;

/// Grammar position of the frame decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramePart {
    CallType,
    FirstSlash,
    SecondSlash,
    Name,
    SessionId,
    LeftParenthesis,
    ContentLength,
    QuestionMark,
    Content,
}

impl FramePart {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CallType => "call type",
            Self::FirstSlash => "first slash",
            Self::SecondSlash => "second slash",
            Self::Name => "name",
            Self::SessionId => "session id",
            Self::LeftParenthesis => "left parenthesis",
            Self::ContentLength => "content length",
            Self::QuestionMark => "question mark",
            Self::Content => "content",
        }
    }
}

impl fmt::Display for FramePart {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Errors raised while decoding frames. All of them are fatal to the
/// connection because stream synchronisation cannot be recovered.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown call type '{token}'")]
    UnknownCallType { token: String },

    #[error("expected '{expected}' at {part} but was '{}'", .found.escape_ascii())]
    UnexpectedByte {
        part: FramePart,
        expected: char,
        found: u8,
    },

    #[error("{part} token exceeds {limit} bytes")]
    TokenTooLong { part: FramePart, limit: usize },

    #[error("{part} token is not valid UTF-8")]
    InvalidUtf8 { part: FramePart },

    #[error("invalid content length '{token}'")]
    InvalidLength { token: String },

    #[error("declared content length {length} exceeds the {limit} byte limit")]
    ContentTooLarge { length: usize, limit: usize },

    #[error("stream ended inside {part} with {buffered} bytes buffered")]
    Truncated { part: FramePart, buffered: usize },

    #[error("failed to read frame: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ProtocolError {
    pub fn unknown_call_type(token: impl Into<String>) -> Self {
        Self::UnknownCallType {
            token: token.into(),
        }
    }

    pub fn unexpected_byte(part: FramePart, expected: char, found: u8) -> Self {
        Self::UnexpectedByte {
            part,
            expected,
            found,
        }
    }

    pub fn invalid_length(token: impl Into<String>) -> Self {
        Self::InvalidLength {
            token: token.into(),
        }
    }
}
