//! Lifecycle listener recording every event it sees.

use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::call::Call;
use crate::lifecycle::{LifecycleError, LifecycleListener};
use crate::request::ConnectionRequest;

#[derive(Debug, Default)]
pub struct RecordingLifecycle {
    events: Mutex<Vec<String>>,
    reject_calls_named: Option<String>,
}

impl RecordingLifecycle {
    /// Listener refusing calls to `name` at call creation.
    pub fn rejecting(name: &str) -> Self {
        Self {
            reject_calls_named: Some(name.to_owned()),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Waits until `expected` events have been recorded.
    pub fn wait_for(&self, expected: usize) -> Vec<String> {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            let events = self.events();
            if events.len() >= expected {
                return events;
            }
            thread::sleep(Duration::from_millis(10));
        }
        self.events()
    }

    fn record(&self, event: String) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl LifecycleListener for RecordingLifecycle {
    fn connection_created(&self, _request: &ConnectionRequest) -> Result<(), LifecycleError> {
        self.record("connection created".to_owned());
        Ok(())
    }

    fn connection_destroyed(&self, _request: &ConnectionRequest) -> Result<(), LifecycleError> {
        self.record("connection destroyed".to_owned());
        Ok(())
    }

    fn call_created(&self, call: &Call) -> Result<(), LifecycleError> {
        self.record(format!("call created {}", call.name()));
        if self.reject_calls_named.as_deref() == Some(call.name()) {
            return Err(LifecycleError::new(format!("{} is not allowed", call.name())));
        }
        Ok(())
    }

    fn call_destroyed(&self, call: &Call) -> Result<(), LifecycleError> {
        self.record(format!("call destroyed {}", call.name()));
        Err(LifecycleError::new("destroy listeners are silent"))
    }
}
