//! Configuration loaders for bootstrap scenarios.

use std::ffi::OsString;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use tether_config::{AliasDirective, Config, SocketEndpoint};

use crate::bootstrap::ConfigLoader;

/// Loader binding an ephemeral loopback port.
pub struct TestConfigLoader {
    backpressure: bool,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new(backpressure: bool) -> Self {
        Self { backpressure }
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(test_config(self.backpressure))
    }
}

/// Loopback configuration with a `legacy.` alias stripped before lookup.
pub fn test_config(backpressure: bool) -> Config {
    Config {
        listen_socket: SocketEndpoint::tcp("127.0.0.1", 0),
        log_filter: "tetherd=debug".to_owned(),
        backpressure,
        aliases: vec![AliasDirective::new("legacy.", "")],
        ..Config::default()
    }
}

/// Loader that fails by passing an invalid socket on the command line.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("tetherd"),
            OsString::from("--listen-socket"),
            OsString::from("invalid://socket"),
        ];
        Config::load_from_iter(args)
    }
}
