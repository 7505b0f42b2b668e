//! Per-connection request state.

use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

use url::Url;

use crate::call::{Arguments, CallError, ContextBag};
use crate::session::{Session, SessionAdapter};

const REFERER_KEY: &str = "HTTP_REFERER";
const REMOTE_ADDR_KEY: &str = "REMOTE_ADDR";
const REQUEST_URI_KEY: &str = "REQUEST_URI";
const USER_AGENT_KEY: &str = "HTTP_USER_AGENT";

#[derive(Debug, Default, Clone)]
struct RequestFields {
    referer: Option<String>,
    remote_address: Option<String>,
    request_uri: Option<String>,
    user_agent: Option<String>,
}

/// State shared by every call on one connection.
///
/// Fields are filled in from OPEN arguments. The session is attached at most
/// once for the lifetime of the connection.
#[derive(Debug)]
pub struct ConnectionRequest {
    id: u64,
    peer_address: Option<String>,
    fields: RwLock<RequestFields>,
    session: OnceLock<Arc<SessionAdapter>>,
    context: Mutex<ContextBag>,
}

impl ConnectionRequest {
    /// Creates request state for a freshly accepted connection.
    #[must_use]
    pub fn new(id: u64, peer_address: Option<String>) -> Self {
        Self {
            id,
            peer_address,
            fields: RwLock::new(RequestFields::default()),
            session: OnceLock::new(),
            context: Mutex::new(ContextBag::new()),
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Socket peer address, when the transport reports one.
    #[must_use]
    pub fn peer_address(&self) -> Option<&str> {
        self.peer_address.as_deref()
    }

    /// Copies the HTTP facade fields from OPEN arguments.
    ///
    /// Keys absent from `arguments` leave the stored value untouched.
    pub fn populate(&self, arguments: &Arguments) {
        let mut fields = self.fields.write().unwrap_or_else(PoisonError::into_inner);
        let assign = |slot: &mut Option<String>, key: &str| {
            if let Some(value) = arguments.get_str(key) {
                *slot = Some(value.into_owned());
            }
        };
        assign(&mut fields.referer, REFERER_KEY);
        assign(&mut fields.remote_address, REMOTE_ADDR_KEY);
        assign(&mut fields.request_uri, REQUEST_URI_KEY);
        assign(&mut fields.user_agent, USER_AGENT_KEY);
    }

    /// Referer as sent by the client.
    #[must_use]
    pub fn raw_referer(&self) -> Option<String> {
        self.read_fields().referer
    }

    /// Referer parsed as an absolute URL.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::InvalidArgument`] when the stored value is not an
    /// absolute URL.
    pub fn referer(&self) -> Result<Option<Url>, CallError> {
        self.read_fields()
            .referer
            .map(|raw| Url::parse(&raw).map_err(|error| CallError::invalid("referer", error.to_string())))
            .transpose()
    }

    /// Remote address from OPEN, falling back to the socket peer.
    #[must_use]
    pub fn remote_address(&self) -> Option<String> {
        self.read_fields()
            .remote_address
            .or_else(|| self.peer_address.clone())
    }

    /// Request URI as sent by the client.
    #[must_use]
    pub fn raw_request_uri(&self) -> Option<String> {
        self.read_fields().request_uri
    }

    /// Request URI resolved against `http://localhost`.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::InvalidArgument`] when the value cannot be
    /// resolved as a URL reference.
    pub fn request_uri(&self) -> Result<Option<Url>, CallError> {
        let Some(raw) = self.read_fields().request_uri else {
            return Ok(None);
        };
        let base = Url::parse("http://localhost/")
            .map_err(|error| CallError::invalid("request uri", error.to_string()))?;
        base.join(&raw)
            .map(Some)
            .map_err(|error| CallError::invalid("request uri", error.to_string()))
    }

    #[must_use]
    pub fn user_agent(&self) -> Option<String> {
        self.read_fields().user_agent
    }

    /// Attaches the session unless one is already attached.
    ///
    /// Returns `true` when this call performed the attachment.
    pub fn attach_session(&self, session: Arc<dyn Session>) -> bool {
        let mut attached = false;
        self.session.get_or_init(|| {
            attached = true;
            Arc::new(SessionAdapter::new(session))
        });
        attached
    }

    #[must_use]
    pub fn session(&self) -> Option<Arc<SessionAdapter>> {
        self.session.get().cloned()
    }

    #[must_use]
    pub fn has_session(&self) -> bool {
        self.session.get().is_some()
    }

    /// Runs `f` with exclusive access to the connection context bag.
    pub fn with_context<R>(&self, f: impl FnOnce(&mut ContextBag) -> R) -> R {
        let mut context = self.context.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut context)
    }

    /// Releases the connection context bag.
    pub fn clear(&self) {
        self.with_context(ContextBag::clear);
    }

    fn read_fields(&self) -> RequestFields {
        self.fields
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::session::MemorySession;

    fn arguments(value: serde_json::Value) -> Arguments {
        match value {
            serde_json::Value::Object(map) => Arguments::from(map),
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn populate_copies_open_fields() {
        let request = ConnectionRequest::new(1, Some("127.0.0.1:5000".to_owned()));
        request.populate(&arguments(json!({
            "HTTP_REFERER": "https://example.com/page",
            "REMOTE_ADDR": "10.1.2.3",
            "REQUEST_URI": "/cms/page?id=4",
            "HTTP_USER_AGENT": "legacy-client/2.1",
        })));

        assert_eq!(request.remote_address().as_deref(), Some("10.1.2.3"));
        assert_eq!(request.user_agent().as_deref(), Some("legacy-client/2.1"));
        assert_eq!(
            request.referer().expect("referer").map(String::from).as_deref(),
            Some("https://example.com/page")
        );
        assert_eq!(
            request.request_uri().expect("uri").map(String::from).as_deref(),
            Some("http://localhost/cms/page?id=4")
        );
    }

    #[test]
    fn remote_address_falls_back_to_the_peer() {
        let request = ConnectionRequest::new(1, Some("127.0.0.1:5000".to_owned()));
        assert_eq!(request.remote_address().as_deref(), Some("127.0.0.1:5000"));
    }

    #[test]
    fn malformed_referers_fail_on_access() {
        let request = ConnectionRequest::new(1, None);
        request.populate(&arguments(json!({ "HTTP_REFERER": "not a url" })));
        assert_eq!(request.raw_referer().as_deref(), Some("not a url"));
        assert!(matches!(
            request.referer(),
            Err(CallError::InvalidArgument { field: "referer", .. })
        ));
    }

    #[test]
    fn sessions_attach_only_once() {
        let request = ConnectionRequest::new(1, None);
        let first = Arc::new(MemorySession::new("first", Duration::from_secs(60)));
        let second = Arc::new(MemorySession::new("second", Duration::from_secs(60)));

        assert!(request.attach_session(first));
        assert!(!request.attach_session(second));
        assert_eq!(request.session().map(|session| session.id().to_owned()).as_deref(), Some("first"));
    }

    #[test]
    fn clear_releases_the_context() {
        let request = ConnectionRequest::new(1, None);
        request.with_context(|bag| bag.set("user", 42));
        request.clear();
        assert!(request.with_context(|bag| bag.is_empty()));
    }
}
