//! Connection and call lifecycle events.
//!
//! Create events propagate listener failures to the caller. Destroy events
//! are delivered silently: a failing or panicking listener is logged and the
//! remaining listeners still run, so teardown always completes.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::call::Call;
use crate::panic::payload_message;
use crate::request::ConnectionRequest;

const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

/// Failure reported by a lifecycle listener.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct LifecycleError {
    message: String,
}

impl LifecycleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Observer of connection and call lifecycles. Every hook defaults to a no-op.
pub trait LifecycleListener: Send + Sync {
    /// # Errors
    ///
    /// A failure closes the new connection.
    fn connection_created(&self, _request: &ConnectionRequest) -> Result<(), LifecycleError> {
        Ok(())
    }

    /// # Errors
    ///
    /// Failures are logged and ignored.
    fn connection_destroyed(&self, _request: &ConnectionRequest) -> Result<(), LifecycleError> {
        Ok(())
    }

    /// # Errors
    ///
    /// A failure turns the call into error content without dispatching it.
    fn call_created(&self, _call: &Call) -> Result<(), LifecycleError> {
        Ok(())
    }

    /// # Errors
    ///
    /// Failures are logged and ignored.
    fn call_destroyed(&self, _call: &Call) -> Result<(), LifecycleError> {
        Ok(())
    }
}

/// Ordered set of lifecycle listeners.
#[derive(Clone, Default)]
pub struct LifecycleEvents {
    listeners: Vec<Arc<dyn LifecycleListener>>,
}

impl LifecycleEvents {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Arc<dyn LifecycleListener>) -> &mut Self {
        self.listeners.push(listener);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// # Errors
    ///
    /// Returns the first listener failure; later listeners are skipped.
    pub fn connection_created(&self, request: &ConnectionRequest) -> Result<(), LifecycleError> {
        self.notify(|listener| listener.connection_created(request))
    }

    pub fn connection_destroyed(&self, request: &ConnectionRequest) {
        self.notify_silent("connection_destroyed", |listener| {
            listener.connection_destroyed(request)
        });
    }

    /// # Errors
    ///
    /// Returns the first listener failure; later listeners are skipped.
    pub fn call_created(&self, call: &Call) -> Result<(), LifecycleError> {
        self.notify(|listener| listener.call_created(call))
    }

    pub fn call_destroyed(&self, call: &Call) {
        self.notify_silent("call_destroyed", |listener| listener.call_destroyed(call));
    }

    fn notify(
        &self,
        event: impl Fn(&dyn LifecycleListener) -> Result<(), LifecycleError>,
    ) -> Result<(), LifecycleError> {
        self.listeners
            .iter()
            .try_for_each(|listener| event(listener.as_ref()))
    }

    fn notify_silent(
        &self,
        name: &'static str,
        event: impl Fn(&dyn LifecycleListener) -> Result<(), LifecycleError>,
    ) {
        for listener in &self.listeners {
            match catch_unwind(AssertUnwindSafe(|| event(listener.as_ref()))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => warn!(
                    target: LIFECYCLE_TARGET,
                    event = name,
                    error = %error,
                    "lifecycle listener failed"
                ),
                Err(panic) => warn!(
                    target: LIFECYCLE_TARGET,
                    event = name,
                    panic = payload_message(panic.as_ref()),
                    "lifecycle listener panicked"
                ),
            }
        }
    }
}

impl std::fmt::Debug for LifecycleEvents {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("LifecycleEvents")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
