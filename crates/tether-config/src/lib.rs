//! Shared configuration for the tether legacy IPC bridge.
//!
//! Configuration is layered with `ortho_config`: built-in defaults, then a
//! configuration file, then `TETHER_*` environment variables, then command
//! line flags. Every field has a default so [`Config::default`] describes a
//! bridge listening on the per-user runtime socket with read throttling on.

mod alias;
mod defaults;
mod logging;
mod socket;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use alias::{AliasDirective, AliasDirectiveParseError};
pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_MAX_CONTENT_BYTES, DEFAULT_RESOLVER_CACHE_CAPACITY,
    DEFAULT_SESSION_TIMEOUT_SECS, DEFAULT_TCP_PORT, default_backpressure, default_log_filter,
    default_log_filter_string, default_log_format, default_max_content_bytes,
    default_resolver_cache_capacity, default_session_timeout_secs, default_socket_endpoint,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved bridge configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, OrthoConfig)]
#[ortho_config(prefix = "TETHER")]
pub struct Config {
    /// Endpoint legacy clients connect to.
    #[serde(default = "default_socket_endpoint")]
    pub listen_socket: SocketEndpoint,
    /// `tracing` filter expression.
    #[serde(default = "default_log_filter_string")]
    pub log_filter: String,
    /// Log output format.
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    /// Stops reading from a connection while one of its calls is in flight.
    #[serde(default = "default_backpressure")]
    pub backpressure: bool,
    /// Largest declared frame content accepted before the frame is rejected.
    #[serde(default = "default_max_content_bytes")]
    pub max_content_bytes: usize,
    /// Number of resolved command names kept in the resolver cache.
    #[serde(default = "default_resolver_cache_capacity")]
    pub resolver_cache_capacity: usize,
    /// Idle timeout for sessions created by the in-memory session provider.
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,
    /// Prefix rewrites applied to command names, in declaration order.
    #[serde(default)]
    pub aliases: Vec<AliasDirective>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_socket: default_socket_endpoint(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            backpressure: default_backpressure(),
            max_content_bytes: default_max_content_bytes(),
            resolver_cache_capacity: default_resolver_cache_capacity(),
            session_timeout_secs: default_session_timeout_secs(),
            aliases: Vec::new(),
        }
    }
}

impl Config {
    /// Endpoint the bridge binds.
    #[must_use]
    pub fn listen_socket(&self) -> &SocketEndpoint {
        &self.listen_socket
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Whether read throttling is enabled.
    #[must_use]
    pub fn backpressure(&self) -> bool {
        self.backpressure
    }

    /// Largest declared frame content accepted.
    #[must_use]
    pub fn max_content_bytes(&self) -> usize {
        self.max_content_bytes
    }

    /// Resolver cache bound, never below one entry.
    #[must_use]
    pub fn resolver_cache_capacity(&self) -> usize {
        self.resolver_cache_capacity.max(1)
    }

    /// Idle session timeout.
    #[must_use]
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    /// Alias directives in declaration order.
    #[must_use]
    pub fn aliases(&self) -> &[AliasDirective] {
        &self.aliases
    }
}
