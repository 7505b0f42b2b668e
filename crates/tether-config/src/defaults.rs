use camino::Utf8PathBuf;
#[cfg(unix)]
use std::env;

#[cfg(unix)]
use libc::geteuid;

#[cfg(unix)]
use dirs::runtime_dir;

use crate::socket::SocketEndpoint;

/// TCP port used when Unix domain sockets are not available.
pub const DEFAULT_TCP_PORT: u16 = 8081;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Largest declared frame content accepted by default (16 MiB).
pub const DEFAULT_MAX_CONTENT_BYTES: usize = 16 * 1024 * 1024;

/// Number of resolved command names kept by default.
pub const DEFAULT_RESOLVER_CACHE_CAPACITY: usize = 1024;

/// Idle session timeout applied by default (30 minutes).
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 30 * 60;

/// Default log filter expression.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Read throttling is on unless explicitly disabled.
pub fn default_backpressure() -> bool {
    true
}

/// Default bound on declared frame content.
pub fn default_max_content_bytes() -> usize {
    DEFAULT_MAX_CONTENT_BYTES
}

/// Default bound on the resolver cache.
pub fn default_resolver_cache_capacity() -> usize {
    DEFAULT_RESOLVER_CACHE_CAPACITY
}

/// Default idle session timeout in seconds.
pub fn default_session_timeout_secs() -> u64 {
    DEFAULT_SESSION_TIMEOUT_SECS
}

/// Computes the default endpoint the bridge listens on.
pub fn default_socket_endpoint() -> SocketEndpoint {
    default_socket_endpoint_inner()
}

#[cfg(unix)]
fn default_socket_endpoint_inner() -> SocketEndpoint {
    let (mut base, apply_namespace) = match runtime_base_directory() {
        Some(dir) => (dir, false),
        None => (fallback_base_directory(), true),
    };

    base.push("tether");
    if apply_namespace {
        base.push(user_namespace());
    }

    SocketEndpoint::unix(base.join("tetherd.sock"))
}

#[cfg(unix)]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

#[cfg(unix)]
fn fallback_base_directory() -> Utf8PathBuf {
    let candidate = env::temp_dir();
    Utf8PathBuf::from_path_buf(candidate).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
fn user_namespace() -> String {
    // SAFETY: geteuid has no preconditions and cannot fail.
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}

#[cfg(not(unix))]
fn default_socket_endpoint_inner() -> SocketEndpoint {
    SocketEndpoint::tcp("127.0.0.1", DEFAULT_TCP_PORT)
}
