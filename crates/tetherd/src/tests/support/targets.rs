//! Targets registered by behavioural scenarios.

use std::thread;
use std::time::Duration;

use crate::call::Call;
use crate::content::Content;
use crate::conventions::{ExecutionError, Job, LegacyParameter, ResponseSink, ServerHandle};
use crate::resolve::SymbolTable;
use crate::session::SessionAdapter;

/// Job answering with its text after a pause.
struct Slow;

impl Job for Slow {
    fn process(
        &self,
        call: &Call,
        response: &mut ResponseSink,
        _session: Option<&SessionAdapter>,
        _server: &ServerHandle,
        _legacy: LegacyParameter,
    ) -> Result<(), ExecutionError> {
        thread::sleep(Duration::from_millis(150));
        response.set_content(Content::text(format!("slow:{}", call.text()?)));
        Ok(())
    }
}

/// Job answering with its text immediately.
struct Fast;

impl Job for Fast {
    fn process(
        &self,
        call: &Call,
        response: &mut ResponseSink,
        _session: Option<&SessionAdapter>,
        _server: &ServerHandle,
        _legacy: LegacyParameter,
    ) -> Result<(), ExecutionError> {
        response.set_content(Content::text(format!("fast:{}", call.text()?)));
        Ok(())
    }
}

/// Job reporting the id of the attached session.
struct WhoAmI;

impl Job for WhoAmI {
    fn process(
        &self,
        _call: &Call,
        response: &mut ResponseSink,
        session: Option<&SessionAdapter>,
        _server: &ServerHandle,
        _legacy: LegacyParameter,
    ) -> Result<(), ExecutionError> {
        let id = session.map_or("none", SessionAdapter::id);
        response.set_content(Content::text(id));
        Ok(())
    }
}

/// Job that panics part way through.
struct Crash;

impl Job for Crash {
    fn process(
        &self,
        call: &Call,
        _response: &mut ResponseSink,
        _session: Option<&SessionAdapter>,
        _server: &ServerHandle,
        _legacy: LegacyParameter,
    ) -> Result<(), ExecutionError> {
        panic!("crash requested with {}", call.text()?);
    }
}

pub fn register_scenario_targets(table: &mut SymbolTable) {
    table
        .register_job("Slow", Slow)
        .register_job("Fast", Fast)
        .register_job("WhoAmI", WhoAmI)
        .register_job("Crash", Crash)
        .supersede("OldEcho", "Echo");
}
