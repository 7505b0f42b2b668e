//! Legacy connection handling.
//!
//! Each accepted connection gets its own [`ConnectionRequest`] and frame
//! decoder. Frames are handled strictly in arrival order: OPEN attaches the
//! session, CLOSE acknowledges and ends the connection, and every other call
//! is dispatched inside a [`CallScope`]. Parse and transport failures close
//! the connection; everything else is answered with error content.

mod errors;
mod inbound;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value};
use tracing::{debug, info_span, warn};

use tether_config::DEFAULT_MAX_CONTENT_BYTES;

use self::inbound::Inbound;
use crate::call::{Call, CallClassifier};
use crate::content::Content;
use crate::dispatch::{DispatchError, Dispatcher};
use crate::lifecycle::LifecycleEvents;
use crate::panic::payload_message;
use crate::protocol::{CallType, ContentEncoder};
use crate::request::ConnectionRequest;
use crate::scope::CallScope;
use crate::session::SessionProvider;
use crate::transport::{ConnectionHandler, ConnectionStream};

pub use self::errors::{ConnectionError, OpenError};

pub(crate) const CONNECTION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::connection");

const SESSION_ID_KEY: &str = "sessionId";

/// Connection handler speaking the legacy framed protocol.
pub struct LegacyConnectionHandler {
    classifier: CallClassifier,
    encoder: ContentEncoder,
    dispatcher: Arc<Dispatcher>,
    sessions: Arc<dyn SessionProvider>,
    events: LifecycleEvents,
    backpressure: bool,
    max_content_bytes: usize,
    next_id: AtomicU64,
}

impl LegacyConnectionHandler {
    /// Creates a handler with read throttling on and the default content
    /// bound.
    #[must_use]
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        sessions: Arc<dyn SessionProvider>,
        events: LifecycleEvents,
    ) -> Self {
        Self {
            classifier: CallClassifier::new(),
            encoder: ContentEncoder::new(),
            dispatcher,
            sessions,
            events,
            backpressure: true,
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
            next_id: AtomicU64::new(1),
        }
    }

    /// Enables or disables read throttling while a call is in flight.
    #[must_use]
    pub fn with_backpressure(mut self, backpressure: bool) -> Self {
        self.backpressure = backpressure;
        self
    }

    #[must_use]
    pub fn with_max_content_bytes(mut self, max_content_bytes: usize) -> Self {
        self.max_content_bytes = max_content_bytes;
        self
    }

    #[must_use]
    pub fn backpressure(&self) -> bool {
        self.backpressure
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    fn serve(
        &self,
        mut stream: ConnectionStream,
        request: &Arc<ConnectionRequest>,
    ) -> Result<(), ConnectionError> {
        let mut inbound = Inbound::open(&stream, self.backpressure, self.max_content_bytes)?;
        let result = self.process(&mut inbound, &mut stream, request);
        if let Err(error) = stream.shutdown() {
            debug!(
                target: CONNECTION_TARGET,
                error = %error,
                "connection shutdown failed"
            );
        }
        let closed = inbound.close();
        result.and(closed)
    }

    fn process(
        &self,
        inbound: &mut Inbound,
        stream: &mut ConnectionStream,
        request: &Arc<ConnectionRequest>,
    ) -> Result<(), ConnectionError> {
        while let Some(frame) = inbound.next_frame()? {
            let call = self.classifier.classify(frame);
            let content = match call.variant() {
                CallType::Open => self.open(&call, request),
                CallType::Close => {
                    self.write(stream, &Content::empty())?;
                    debug!(target: CONNECTION_TARGET, "close requested");
                    return Ok(());
                }
                _ => self.dispatch(call, request),
            };
            self.write(stream, &content)?;
        }
        debug!(target: CONNECTION_TARGET, "peer closed connection");
        Ok(())
    }

    /// Populates the request and attaches a session on the first OPEN.
    fn open(&self, call: &Call, request: &ConnectionRequest) -> Content {
        match self.attach_session(call, request) {
            Ok(session_id) => {
                let mut body = Map::new();
                body.insert(SESSION_ID_KEY.to_owned(), Value::String(session_id));
                Content::json(body)
            }
            Err(error) => {
                warn!(
                    target: CONNECTION_TARGET,
                    error = %error,
                    "OPEN failed"
                );
                Content::error(error.kind(), &error)
            }
        }
    }

    fn attach_session(&self, call: &Call, request: &ConnectionRequest) -> Result<String, OpenError> {
        request.populate(call.arguments()?);
        if let Some(existing) = request.session() {
            debug!(
                target: CONNECTION_TARGET,
                session = existing.id(),
                requested = call.session_id(),
                "session already attached"
            );
            existing.touch();
            return Ok(existing.id().to_owned());
        }

        let remote_address = request.remote_address();
        let session = self
            .sessions
            .get_session(call.session_id(), remote_address.as_deref())?;
        request.attach_session(session);
        let attached = request
            .session()
            .map(|session| session.id().to_owned())
            .unwrap_or_default();
        debug!(
            target: CONNECTION_TARGET,
            session = attached.as_str(),
            "session attached"
        );
        Ok(attached)
    }

    fn dispatch(&self, mut call: Call, request: &Arc<ConnectionRequest>) -> Content {
        if let Err(error) = call.attach_to(Arc::clone(request)) {
            return rejected(DispatchError::from(error));
        }
        if let Err(error) = self.events.call_created(&call) {
            return rejected(DispatchError::from(error));
        }
        let scope = CallScope::enter(call, &self.events);
        self.dispatcher.execute(scope.call())
    }

    fn admit(&self, request: &ConnectionRequest) -> Result<(), ConnectionError> {
        self.events.connection_created(request)?;
        Ok(())
    }

    fn write(&self, stream: &mut ConnectionStream, content: &Content) -> Result<(), ConnectionError> {
        self.encoder
            .write_to(content, stream)
            .map_err(ConnectionError::Write)
    }
}

impl ConnectionHandler for LegacyConnectionHandler {
    fn handle(&self, stream: ConnectionStream) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Arc::new(ConnectionRequest::new(id, stream.peer_address()));
        let _span = info_span!(
            "connection",
            id,
            peer = request.peer_address().unwrap_or("unnamed"),
        )
        .entered();

        if let Err(error) = self.admit(&request) {
            warn!(
                target: CONNECTION_TARGET,
                error = %error,
                "connection rejected"
            );
            if let Err(error) = stream.shutdown() {
                debug!(target: CONNECTION_TARGET, error = %error, "connection shutdown failed");
            }
            return;
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| self.serve(stream, &request)))
            .unwrap_or_else(|panic| {
                Err(ConnectionError::Panicked {
                    message: payload_message(panic.as_ref()),
                })
            });
        if let Err(error) = outcome {
            warn!(
                target: CONNECTION_TARGET,
                remote = request.remote_address().as_deref().unwrap_or("unknown"),
                error = %error,
                "connection closed after error"
            );
        }

        self.events.connection_destroyed(&request);
        request.clear();
    }
}

impl std::fmt::Debug for LegacyConnectionHandler {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("LegacyConnectionHandler")
            .field("dispatcher", &self.dispatcher)
            .field("events", &self.events)
            .field("backpressure", &self.backpressure)
            .field("max_content_bytes", &self.max_content_bytes)
            .finish_non_exhaustive()
    }
}

fn rejected(error: DispatchError) -> Content {
    warn!(
        target: CONNECTION_TARGET,
        kind = error.kind(),
        error = %error,
        "call rejected"
    );
    Content::error(error.kind(), &error)
}
