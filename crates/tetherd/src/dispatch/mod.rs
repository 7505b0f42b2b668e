//! Call dispatch across the three execution conventions.

mod builtins;
mod errors;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::call::Call;
use crate::content::Content;
use crate::conventions::{ResponseSink, ServerHandle, TypedCommandExecutor};
use crate::panic::payload_message;
use crate::resolve::{CommandResolver, Symbol, Target};

pub use self::builtins::{Echo, register_builtins};
pub use self::errors::DispatchError;

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Resolves a call's name and runs the target with its convention.
///
/// Shared by every connection. Each call is resolved and executed exactly
/// once; failures become error content.
pub struct Dispatcher {
    resolver: Arc<CommandResolver>,
    executor: Arc<dyn TypedCommandExecutor>,
    server: ServerHandle,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        resolver: Arc<CommandResolver>,
        executor: Arc<dyn TypedCommandExecutor>,
        server: ServerHandle,
    ) -> Self {
        Self {
            resolver,
            executor,
            server,
        }
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<CommandResolver> {
        &self.resolver
    }

    #[must_use]
    pub fn server(&self) -> &ServerHandle {
        &self.server
    }

    /// Executes the call, rendering any failure as error content.
    #[must_use]
    pub fn execute(&self, call: &Call) -> Content {
        match self.try_execute(call) {
            Ok(content) => content,
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    name = call.name(),
                    kind = error.kind(),
                    error = %error,
                    "call failed"
                );
                Content::error(error.kind(), &error)
            }
        }
    }

    /// Executes the call, returning failures to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when resolution or execution fails, when
    /// a job sets no content, or when the target panics.
    pub fn try_execute(&self, call: &Call) -> Result<Content, DispatchError> {
        let (symbol, target) = self.resolver.resolve(call.name())?.into_parts();
        debug!(
            target: DISPATCH_TARGET,
            aliased = call.name(),
            name = symbol.name(),
            kind = %symbol.kind(),
            "dispatching call"
        );

        catch_unwind(AssertUnwindSafe(|| self.run(&symbol, target, call))).unwrap_or_else(
            |panic| {
                Err(DispatchError::Panicked {
                    name: symbol.name().to_owned(),
                    message: payload_message(panic.as_ref()),
                })
            },
        )
    }

    fn run(&self, symbol: &Symbol, target: Target, call: &Call) -> Result<Content, DispatchError> {
        let name = symbol.name();
        match target {
            Target::TypedCommand(command) => self
                .executor
                .execute(name, command.as_ref(), call)
                .map(Content::json)
                .map_err(|source| DispatchError::execution(name, source)),
            Target::Job(job) => {
                let mut response = ResponseSink::new();
                let session = call.session();
                job.process(call, &mut response, session.as_deref(), &self.server, None)
                    .map_err(|source| DispatchError::execution(name, source))?;
                response
                    .take_content()
                    .ok_or_else(|| DispatchError::missing_content(name))
            }
            Target::DeprecatedCommand(command) => command
                .execute(call)
                .map_err(|source| DispatchError::command(name, source)),
            Target::Opaque => Err(DispatchError::UnknownTargetKind {
                name: name.to_owned(),
                kind: symbol.kind().to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Dispatcher")
            .field("resolver", &self.resolver)
            .field("server", &self.server)
            .finish_non_exhaustive()
    }
}
