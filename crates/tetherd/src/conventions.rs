//! Execution conventions for resolved targets.
//!
//! Three calling conventions coexist: typed commands run through a
//! [`TypedCommandExecutor`] and yield a JSON map, jobs write into a
//! [`ResponseSink`], and deprecated commands return [`Content`] directly.

use std::convert::Infallible;
use std::error::Error;
use std::fmt;
use std::time::{Duration, SystemTime};

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::call::{Call, CallError};
use crate::content::Content;
use crate::session::SessionAdapter;

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

type BoxedSource = Box<dyn Error + Send + Sync + 'static>;

/// Failure reported by a typed command or a job.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ExecutionError {
    message: String,
    #[source]
    source: Option<BoxedSource>,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxedSource>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

impl From<CallError> for ExecutionError {
    fn from(error: CallError) -> Self {
        Self::with_source("invalid call", error)
    }
}

/// Failure reported by a deprecated command.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CommandError {
    message: String,
    #[source]
    source: Option<BoxedSource>,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxedSource>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

impl From<CallError> for CommandError {
    fn from(error: CallError) -> Self {
        Self::with_source("invalid call", error)
    }
}

/// Modern command producing a structured result.
pub trait TypedCommand: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ExecutionError`] when the command fails.
    fn execute(&self, call: &Call) -> Result<Map<String, Value>, ExecutionError>;
}

/// Convention used to run typed commands.
pub trait TypedCommandExecutor: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ExecutionError`] when the command fails.
    fn execute(
        &self,
        name: &str,
        command: &dyn TypedCommand,
        call: &Call,
    ) -> Result<Map<String, Value>, ExecutionError>;
}

/// Executor that invokes the command directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectExecutor;

impl TypedCommandExecutor for DirectExecutor {
    fn execute(
        &self,
        name: &str,
        command: &dyn TypedCommand,
        call: &Call,
    ) -> Result<Map<String, Value>, ExecutionError> {
        debug!(target: DISPATCH_TARGET, command = name, "executing typed command");
        command.execute(call)
    }
}

/// Legacy job parameter that is always `None`.
pub type LegacyParameter = Option<Infallible>;

/// Single-use sink a job writes its response into.
#[derive(Debug, Default)]
pub struct ResponseSink {
    content: Option<Content>,
}

impl ResponseSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the response, replacing any earlier one.
    pub fn set_content(&mut self, content: Content) {
        self.content = Some(content);
    }

    #[must_use]
    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    #[must_use]
    pub fn content(&self) -> Option<&Content> {
        self.content.as_ref()
    }

    pub fn take_content(&mut self) -> Option<Content> {
        self.content.take()
    }
}

/// Read-only facts about the running bridge, handed to jobs.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    endpoint: String,
    started_at: SystemTime,
}

impl ServerHandle {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            started_at: SystemTime::now(),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed().unwrap_or_default()
    }
}

impl fmt::Display for ServerHandle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.endpoint)
    }
}

/// Raw job convention.
pub trait Job: Send + Sync {
    /// Processes the call and sets content on `response`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError`] when processing fails.
    fn process(
        &self,
        call: &Call,
        response: &mut ResponseSink,
        session: Option<&SessionAdapter>,
        server: &ServerHandle,
        legacy: LegacyParameter,
    ) -> Result<(), ExecutionError>;
}

/// Deprecated command convention.
pub trait DeprecatedCommand: Send + Sync {
    /// # Errors
    ///
    /// Returns [`CommandError`] when the command fails.
    fn execute(&self, call: &Call) -> Result<Content, CommandError>;
}
