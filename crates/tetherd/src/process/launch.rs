//! Launch sequencing for the bridge runtime.

use std::sync::Arc;

use tracing::info;

use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::bridge::BridgeBuilder;
use crate::health::{HealthReporter, StructuredHealthReporter};

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Runs the bridge with production collaborators and the built-in targets.
///
/// # Errors
///
/// Returns [`LaunchError`] when bootstrap, the listener, or signal handling
/// fails.
pub fn run_bridge() -> Result<(), LaunchError> {
    run_bridge_with(
        &SystemConfigLoader,
        Arc::new(StructuredHealthReporter::new()),
        BridgeBuilder::new(),
        &SystemShutdownSignal::new(),
    )
}

/// Runs the bridge with injected collaborators until `shutdown` returns.
///
/// # Errors
///
/// Returns [`LaunchError`] when bootstrap, the listener, or signal handling
/// fails. The listener is stopped before a shutdown error is returned.
pub fn run_bridge_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    builder: BridgeBuilder,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), LaunchError> {
    let bridge = bootstrap_with(loader, reporter)?;
    let running = bridge.start(builder)?;
    info!(
        target: PROCESS_TARGET,
        endpoint = %running.endpoint(),
        "bridge running"
    );

    let waited = shutdown.wait();
    running.stop()?;
    waited?;
    info!(
        target: PROCESS_TARGET,
        "shutdown sequence completed"
    );
    Ok(())
}
