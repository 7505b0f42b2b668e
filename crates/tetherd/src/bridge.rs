//! Assembly of the bridge pipeline from configuration.

use std::num::NonZeroUsize;
use std::sync::Arc;

use tether_config::{Config, SocketEndpoint};

use crate::connection::LegacyConnectionHandler;
use crate::conventions::{DirectExecutor, ServerHandle, TypedCommandExecutor};
use crate::dispatch::{Dispatcher, register_builtins};
use crate::health::HealthReporter;
use crate::lifecycle::{LifecycleEvents, LifecycleListener};
use crate::resolve::{AliasSet, CommandResolver, SymbolTable};
use crate::session::{MemorySessionProvider, SessionProvider};
use crate::transport::{ListenerError, ListenerHandle, SocketListener};

/// Collects the targets and collaborators a bridge serves with.
///
/// A new builder already carries the built-in targets, the direct typed
/// command executor, and no lifecycle listeners. Without an explicit session
/// provider an in-memory one is created using the configured idle timeout.
pub struct BridgeBuilder {
    table: SymbolTable,
    events: LifecycleEvents,
    sessions: Option<Arc<dyn SessionProvider>>,
    executor: Arc<dyn TypedCommandExecutor>,
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeBuilder {
    #[must_use]
    pub fn new() -> Self {
        let mut table = SymbolTable::new();
        register_builtins(&mut table);
        Self {
            table,
            events: LifecycleEvents::new(),
            sessions: None,
            executor: Arc::new(DirectExecutor),
        }
    }

    /// Registry to add commands, jobs, and supersessions to.
    pub fn symbols(&mut self) -> &mut SymbolTable {
        &mut self.table
    }

    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn LifecycleListener>) -> Self {
        self.events.register(listener);
        self
    }

    #[must_use]
    pub fn with_sessions(mut self, sessions: Arc<dyn SessionProvider>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn TypedCommandExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Builds the shared connection handler for a bridge reachable at
    /// `endpoint`.
    #[must_use]
    pub fn build_handler(self, config: &Config, endpoint: &SocketEndpoint) -> LegacyConnectionHandler {
        let aliases: AliasSet = config.aliases().iter().collect();
        let capacity = NonZeroUsize::new(config.resolver_cache_capacity()).unwrap_or(NonZeroUsize::MIN);
        let resolver = CommandResolver::from_table(aliases, Arc::new(self.table), capacity);
        let dispatcher = Dispatcher::new(
            Arc::new(resolver),
            self.executor,
            ServerHandle::new(endpoint.to_string()),
        );
        let sessions: Arc<dyn SessionProvider> = match self.sessions {
            Some(sessions) => sessions,
            None => Arc::new(MemorySessionProvider::new(config.session_timeout())),
        };

        LegacyConnectionHandler::new(Arc::new(dispatcher), sessions, self.events)
            .with_backpressure(config.backpressure())
            .with_max_content_bytes(config.max_content_bytes())
    }

    /// Binds the configured endpoint and starts accepting connections.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when the endpoint cannot be bound or the
    /// accept loop cannot start.
    pub fn start(
        self,
        config: &Config,
        reporter: Arc<dyn HealthReporter>,
    ) -> Result<RunningBridge, ListenerError> {
        let listener = SocketListener::bind(config.listen_socket())?;
        let endpoint = listener.local_endpoint();
        let handler = self.build_handler(config, &endpoint);
        let handle = listener.start(Arc::new(handler))?;
        reporter.listener_started(&endpoint);
        Ok(RunningBridge {
            endpoint,
            handle,
            reporter,
        })
    }
}

impl std::fmt::Debug for BridgeBuilder {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("BridgeBuilder")
            .field("symbols", &self.table.len())
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

/// A bridge accepting connections.
pub struct RunningBridge {
    endpoint: SocketEndpoint,
    handle: ListenerHandle,
    reporter: Arc<dyn HealthReporter>,
}

impl RunningBridge {
    /// Endpoint clients connect to, with any OS-assigned port filled in.
    #[must_use]
    pub fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    /// Stops accepting connections and waits for the accept loop to exit.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::AcceptLoopPanicked`] when the accept loop panicked.
    pub fn stop(self) -> Result<(), ListenerError> {
        self.handle.shutdown();
        self.handle.join()?;
        self.reporter.listener_stopped(&self.endpoint);
        Ok(())
    }
}

impl std::fmt::Debug for RunningBridge {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RunningBridge")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}
