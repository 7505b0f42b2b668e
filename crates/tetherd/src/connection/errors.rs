//! Error types for connection handling.

use std::io;

use thiserror::Error;

use crate::call::CallError;
use crate::lifecycle::LifecycleError;
use crate::protocol::ProtocolError;
use crate::session::SessionError;

/// Failures that end a connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The inbound byte stream could not be framed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("failed to write response: {0}")]
    Write(#[source] io::Error),

    #[error("failed to split connection stream: {0}")]
    Split(#[source] io::Error),

    /// A connection-create listener refused the connection.
    #[error("connection rejected by lifecycle listener: {0}")]
    Rejected(#[from] LifecycleError),

    #[error("frame reader thread exited unexpectedly")]
    ReaderLost,

    #[error("connection worker panicked: {message}")]
    Panicked { message: String },
}

/// Failures answering an OPEN call. Rendered as error content.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("malformed OPEN arguments: {0}")]
    Arguments(#[from] CallError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl OpenError {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Arguments(_) => "call",
            Self::Session(_) => "session",
        }
    }
}
