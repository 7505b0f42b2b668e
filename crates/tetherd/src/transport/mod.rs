//! Socket listener for bridge endpoints.
//!
//! The transport module binds the configured endpoint, accepts connections
//! on a background thread and hands each one to a [`ConnectionHandler`] on
//! its own thread.

mod errors;
mod handler;
mod listener;

pub use self::errors::{ListenerError, SocketConflict};
pub use self::handler::{ConnectionHandler, ConnectionStream};
pub use self::listener::{ListenerHandle, SocketListener};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
