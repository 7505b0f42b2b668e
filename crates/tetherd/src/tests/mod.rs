//! Behavioural test suites for the bridge.

mod bridge_behaviour;
mod support;
