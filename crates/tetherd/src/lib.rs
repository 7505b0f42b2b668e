//! Legacy IPC bridge daemon.
//!
//! `tetherd` accepts connections speaking the text-framed legacy protocol
//! (`<type>://<name>/<session>/(<length>)?<content>`) and routes each call to
//! one of three execution conventions: typed commands, jobs, and deprecated
//! commands. Names are rewritten by prefix aliases, resolved through a
//! bounded cache, and followed along supersession chains before dispatch.
//!
//! The pipeline per connection is:
//!
//! 1. [`protocol::FrameDecoder`] turns the byte stream into frames, resuming
//!    across arbitrary read boundaries.
//! 2. [`call::CallClassifier`] wraps each frame in a [`call::Call`] whose
//!    argument view depends on the call type.
//! 3. [`connection::LegacyConnectionHandler`] attaches sessions on OPEN,
//!    emits lifecycle events, and enters a [`scope::CallScope`] per call.
//! 4. [`dispatch::Dispatcher`] resolves the name with
//!    [`resolve::CommandResolver`] and runs the target, turning failures
//!    into error content.
//! 5. [`protocol::ContentEncoder`] frames the response as
//!    `<mime>://(<length>)?<bytes>`.
//!
//! Parse and transport failures close the connection. Every other failure
//! is answered with `error` content and the connection stays open.

mod bootstrap;
mod bridge;
pub mod call;
pub mod connection;
pub mod content;
pub mod conventions;
pub mod dispatch;
mod health;
mod panic;
pub mod lifecycle;
pub mod process;
pub mod protocol;
pub mod request;
pub mod resolve;
pub mod scope;
pub mod session;
mod telemetry;
pub mod transport;

pub use bootstrap::{
    BootstrapError, Bridge, ConfigLoader, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use bridge::{BridgeBuilder, RunningBridge};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{LaunchError, run_bridge};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
