//! Call scope: the span of execution during which one call is current.
//!
//! The scope owns the call and is passed explicitly to dispatch. A `call`
//! tracing span is entered for its lifetime so log records carry the call's
//! variant, name and session. Dropping the scope, including during a panic,
//! emits the call-destroy event and clears the call context.

use tracing::span::EnteredSpan;
use tracing::info_span;

use crate::call::Call;
use crate::lifecycle::LifecycleEvents;

/// Guard for one call's execution.
pub struct CallScope<'a> {
    call: Call,
    events: &'a LifecycleEvents,
    _span: EnteredSpan,
}

impl<'a> CallScope<'a> {
    /// Enters the scope. The call-create event must already have been
    /// delivered.
    #[must_use]
    pub fn enter(call: Call, events: &'a LifecycleEvents) -> Self {
        let span = info_span!(
            "call",
            variant = %call.variant(),
            name = call.name(),
            session = call.session_id(),
        )
        .entered();
        Self {
            call,
            events,
            _span: span,
        }
    }

    #[must_use]
    pub fn call(&self) -> &Call {
        &self.call
    }

    pub fn call_mut(&mut self) -> &mut Call {
        &mut self.call
    }
}

impl Drop for CallScope<'_> {
    fn drop(&mut self) {
        self.events.call_destroyed(&self.call);
        self.call.clear();
    }
}
