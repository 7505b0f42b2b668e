use thiserror::Error;

use crate::protocol::CallType;

/// Errors raised by call accessors and attachment.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    /// The variant does not offer the requested view.
    #[error("{operation} is not supported by {variant} calls")]
    Unsupported {
        variant: CallType,
        operation: &'static str,
    },
    /// The content could not be parsed as a structured object.
    #[error("malformed {variant} arguments: {message}")]
    MalformedArguments { variant: CallType, message: String },
    /// A required argument was absent.
    #[error("missing argument '{key}'")]
    MissingArgument { key: String },
    /// A request field held a value of the wrong shape.
    #[error("invalid {field}: {message}")]
    InvalidArgument {
        field: &'static str,
        message: String,
    },
    /// The call was already attached to a connection request.
    #[error("call is already attached to connection {connection}")]
    AlreadyAttached { connection: u64 },
}

impl CallError {
    pub fn unsupported(variant: CallType, operation: &'static str) -> Self {
        Self::Unsupported { variant, operation }
    }

    pub fn missing(key: impl Into<String>) -> Self {
        Self::MissingArgument { key: key.into() }
    }

    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            message: message.into(),
        }
    }
}
