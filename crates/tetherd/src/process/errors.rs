//! Unified error surface for bridge launch.

use thiserror::Error;

use crate::bootstrap::BootstrapError;
use crate::transport::ListenerError;

use super::shutdown::ShutdownError;

/// Errors surfaced while launching or running the bridge process.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error("failed to run socket listener: {0}")]
    Listener(#[from] ListenerError),
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}
