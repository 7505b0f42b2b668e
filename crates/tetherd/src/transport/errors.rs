//! Listener failures.

use std::fmt;
use std::io;

use tether_config::SocketEndpoint;
use thiserror::Error;

/// Reason an existing Unix socket path cannot be taken over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketConflict {
    /// Another process still accepts connections on the socket.
    Live,
    /// The path exists but is not a socket.
    NotSocket,
}

impl fmt::Display for SocketConflict {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Live => "still served by another process",
            Self::NotSocket => "occupied by a file that is not a socket",
        })
    }
}

/// Errors raised while binding an endpoint or running its accept loop.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("cannot resolve {endpoint}: {source}")]
    Resolve {
        endpoint: SocketEndpoint,
        #[source]
        source: io::Error,
    },

    #[error("cannot bind {endpoint}: {source}")]
    Bind {
        endpoint: SocketEndpoint,
        #[source]
        source: io::Error,
    },

    /// A Unix socket path is in the way and was left untouched.
    #[error("cannot reuse {endpoint}: path is {conflict}")]
    Conflict {
        endpoint: SocketEndpoint,
        conflict: SocketConflict,
    },

    #[error("cannot start accepting on {endpoint}: {source}")]
    Start {
        endpoint: SocketEndpoint,
        #[source]
        source: io::Error,
    },

    #[error("accept loop for {endpoint} panicked")]
    AcceptLoopPanicked { endpoint: SocketEndpoint },
}
