//! Error types for call dispatch.
//!
//! Every variant is recoverable per call: the connection handler renders it
//! as error content and keeps the connection open.

use thiserror::Error;

use crate::call::CallError;
use crate::conventions::{CommandError, ExecutionError};
use crate::lifecycle::LifecycleError;
use crate::resolve::ResolveError;

/// Errors surfaced while executing a call.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The name did not resolve to a target.
    #[error(transparent)]
    Resolution(#[from] ResolveError),

    /// A typed command or job failed.
    #[error("'{name}' failed: {source}")]
    Execution {
        name: String,
        #[source]
        source: ExecutionError,
    },

    /// A deprecated command failed.
    #[error("'{name}' failed: {source}")]
    Command {
        name: String,
        #[source]
        source: CommandError,
    },

    /// A target panicked while executing.
    #[error("'{name}' panicked: {message}")]
    Panicked { name: String, message: String },

    /// A job finished without setting content.
    #[error("illegal state: job '{name}' set no content")]
    MissingContent { name: String },

    /// The name resolved to a symbol without an execution convention.
    #[error("illegal argument: '{name}' resolved to unknown kind '{kind}'")]
    UnknownTargetKind { name: String, kind: String },

    /// The call could not be bound to its connection.
    #[error(transparent)]
    Call(#[from] CallError),

    /// A call-create listener rejected the call.
    #[error("call rejected by lifecycle listener: {0}")]
    Lifecycle(#[from] LifecycleError),
}

impl DispatchError {
    /// Short machine-readable kind written into error content.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Resolution(_) | Self::UnknownTargetKind { .. } => "resolution",
            Self::Execution { .. } | Self::Command { .. } | Self::Panicked { .. } => {
                "execution"
            }
            Self::MissingContent { .. } => "illegal_state",
            Self::Call(_) => "call",
            Self::Lifecycle(_) => "lifecycle",
        }
    }

    pub fn execution(name: impl Into<String>, source: ExecutionError) -> Self {
        Self::Execution {
            name: name.into(),
            source,
        }
    }

    pub fn command(name: impl Into<String>, source: CommandError) -> Self {
        Self::Command {
            name: name.into(),
            source,
        }
    }

    pub fn missing_content(name: impl Into<String>) -> Self {
        Self::MissingContent { name: name.into() }
    }
}
