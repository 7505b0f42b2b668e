//! Shared doubles for behavioural tests.

pub mod client;
pub mod config_loader;
pub mod lifecycle;
pub mod reporter;
pub mod targets;
