//! Typed views over decoded frames.
//!
//! [`CallClassifier`] turns a [`Frame`] into a [`Call`] whose body depends on
//! the call type. Argument views are only offered by the variants that carry
//! them; asking any other variant returns [`CallError::Unsupported`].

mod arguments;
mod context;
mod errors;

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use once_cell::unsync::OnceCell;

use crate::protocol::{CallType, Frame};
use crate::request::ConnectionRequest;
use crate::session::SessionAdapter;

pub use self::arguments::Arguments;
pub use self::context::ContextBag;
pub use self::errors::CallError;

type Parsed = Result<Arguments, String>;

#[derive(Debug)]
enum CallBody {
    Open(OnceCell<Parsed>),
    Data {
        text: OnceCell<String>,
        arguments: OnceCell<Parsed>,
    },
    Json(OnceCell<Parsed>),
    Text(OnceCell<String>),
    Binary,
    Close,
}

/// A decoded call with its argument view, context bag and connection.
#[derive(Debug)]
pub struct Call {
    frame: Frame,
    body: CallBody,
    context: Option<ContextBag>,
    request: Option<Arc<ConnectionRequest>>,
}

impl Call {
    fn new(frame: Frame) -> Self {
        let body = match frame.call_type() {
            CallType::Open => CallBody::Open(OnceCell::new()),
            CallType::Data => CallBody::Data {
                text: OnceCell::new(),
                arguments: OnceCell::new(),
            },
            CallType::Json => CallBody::Json(OnceCell::new()),
            CallType::Text => CallBody::Text(OnceCell::new()),
            CallType::Binary => CallBody::Binary,
            CallType::Close => CallBody::Close,
        };
        Self {
            frame,
            body,
            context: None,
            request: None,
        }
    }

    #[must_use]
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    #[must_use]
    pub fn variant(&self) -> CallType {
        self.frame.call_type()
    }

    /// Command name before alias rewriting.
    #[must_use]
    pub fn name(&self) -> &str {
        self.frame.aliased_name()
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        self.frame.session_id()
    }

    /// Structured arguments, parsed on first access.
    ///
    /// DATA calls whose text does not start with `{` expose no arguments.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Unsupported`] for TEXT, BINARY and CLOSE calls and
    /// [`CallError::MalformedArguments`] when the content is not a JSON object.
    pub fn arguments(&self) -> Result<&Arguments, CallError> {
        let variant = self.variant();
        let parsed = match &self.body {
            CallBody::Open(cell) | CallBody::Json(cell) => {
                cell.get_or_init(|| parse_arguments(self.frame.content()))
            }
            CallBody::Data { text, arguments } => arguments.get_or_init(|| {
                let text = text.get_or_init(|| decode_text(self.frame.content()));
                if text.starts_with('{') {
                    parse_arguments(text.as_bytes())
                } else {
                    Ok(Arguments::new())
                }
            }),
            CallBody::Text(_) | CallBody::Binary | CallBody::Close => {
                return Err(CallError::unsupported(variant, "argument access"));
            }
        };
        parsed
            .as_ref()
            .map_err(|message| CallError::MalformedArguments {
                variant,
                message: message.clone(),
            })
    }

    /// Mutable structured arguments; writes are visible to later readers.
    ///
    /// # Errors
    ///
    /// As for [`Call::arguments`].
    pub fn arguments_mut(&mut self) -> Result<&mut Arguments, CallError> {
        self.arguments()?;
        let variant = self.variant();
        let cell = match &mut self.body {
            CallBody::Open(cell) | CallBody::Json(cell) => cell,
            CallBody::Data { arguments, .. } => arguments,
            CallBody::Text(_) | CallBody::Binary | CallBody::Close => {
                return Err(CallError::unsupported(variant, "argument access"));
            }
        };
        match cell.get_mut() {
            Some(Ok(arguments)) => Ok(arguments),
            Some(Err(message)) => Err(CallError::MalformedArguments {
                variant,
                message: message.clone(),
            }),
            None => Err(CallError::unsupported(variant, "argument access")),
        }
    }

    /// DATA arguments rendered as text.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Unsupported`] for every variant except DATA.
    pub fn stringed_arguments(&self) -> Result<BTreeMap<String, Option<String>>, CallError> {
        if !matches!(self.body, CallBody::Data { .. }) {
            return Err(CallError::unsupported(self.variant(), "stringed arguments"));
        }
        Ok(self.arguments()?.stringed())
    }

    /// Raw text of DATA and TEXT calls, decoded once.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Unsupported`] for the other variants.
    pub fn text(&self) -> Result<&str, CallError> {
        match &self.body {
            CallBody::Data { text, .. } | CallBody::Text(text) => {
                Ok(text.get_or_init(|| decode_text(self.frame.content())))
            }
            _ => Err(CallError::unsupported(self.variant(), "text access")),
        }
    }

    /// Byte reader over the raw content.
    #[must_use]
    pub fn raw(&self) -> Cursor<Bytes> {
        Cursor::new(self.frame.content().clone())
    }

    #[must_use]
    pub fn context(&self) -> Option<&ContextBag> {
        self.context.as_ref()
    }

    /// Context bag, created on first use.
    pub fn context_mut(&mut self) -> &mut ContextBag {
        self.context.get_or_insert_with(ContextBag::new)
    }

    /// Binds the call to its connection request.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::AlreadyAttached`] on a second attachment.
    pub fn attach_to(&mut self, request: Arc<ConnectionRequest>) -> Result<(), CallError> {
        if let Some(existing) = &self.request {
            return Err(CallError::AlreadyAttached {
                connection: existing.id(),
            });
        }
        self.request = Some(request);
        Ok(())
    }

    #[must_use]
    pub fn request(&self) -> Option<&Arc<ConnectionRequest>> {
        self.request.as_ref()
    }

    /// Session of the attached request.
    #[must_use]
    pub fn session(&self) -> Option<Arc<SessionAdapter>> {
        self.request.as_ref().and_then(|request| request.session())
    }

    /// Drops the call-scoped context.
    pub fn clear(&mut self) {
        self.context = None;
    }
}

impl From<Frame> for Call {
    fn from(frame: Frame) -> Self {
        Self::new(frame)
    }
}

/// Maps frames to call variants. Stateless and shared by all connections.
#[derive(Debug, Default, Clone, Copy)]
pub struct CallClassifier;

impl CallClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn classify(&self, frame: Frame) -> Call {
        Call::new(frame)
    }
}

fn decode_text(content: &Bytes) -> String {
    String::from_utf8_lossy(content).into_owned()
}

fn parse_arguments(content: &[u8]) -> Parsed {
    Arguments::parse(content).map_err(|error| error.to_string())
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn call(call_type: CallType, content: &'static [u8]) -> Call {
        CallClassifier::new().classify(Frame::new(call_type, "Echo", "s", content))
    }

    #[test]
    fn json_arguments_parse_lazily_and_accept_writes() {
        let mut call = call(CallType::Json, br#"{"name":"x"}"#);
        assert_eq!(call.arguments().expect("arguments").get("name"), Some(&json!("x")));

        call.arguments_mut().expect("arguments").put("page", 2);
        assert_eq!(call.arguments().expect("arguments").get("page"), Some(&json!(2)));
    }

    #[test]
    fn open_arguments_are_structured() {
        let call = call(CallType::Open, br#"{"REMOTE_ADDR":"10.0.0.1"}"#);
        assert_eq!(
            call.arguments().expect("arguments").get_str("REMOTE_ADDR").as_deref(),
            Some("10.0.0.1")
        );
    }

    #[test]
    fn data_calls_expose_text_and_arguments() {
        let call = call(CallType::Data, br#"{"id":7,"note":null}"#);
        assert_eq!(call.text().expect("text"), r#"{"id":7,"note":null}"#);
        let stringed = call.stringed_arguments().expect("stringed");
        assert_eq!(stringed.get("id"), Some(&Some("7".to_owned())));
        assert_eq!(stringed.get("note"), Some(&None));
    }

    #[test]
    fn data_arguments_degrade_to_empty_for_plain_text() {
        let call = call(CallType::Data, b"id=7&page=2");
        assert!(call.arguments().expect("arguments").is_empty());
        assert_eq!(call.text().expect("text"), "id=7&page=2");
    }

    #[test]
    fn malformed_json_is_reported_on_access() {
        let call = call(CallType::Json, b"{broken");
        let error = call.arguments().expect_err("malformed");
        assert!(matches!(
            error,
            CallError::MalformedArguments {
                variant: CallType::Json,
                ..
            }
        ));
    }

    #[rstest]
    #[case(CallType::Text)]
    #[case(CallType::Binary)]
    #[case(CallType::Close)]
    fn variants_without_arguments_refuse_access(#[case] call_type: CallType) {
        let call = call(call_type, b"{}");
        assert_eq!(
            call.arguments().expect_err("unsupported"),
            CallError::unsupported(call_type, "argument access")
        );
    }

    #[test]
    fn unsupported_errors_name_the_variant() {
        let error = call(CallType::Binary, b"").text().expect_err("unsupported");
        assert_eq!(error.to_string(), "text access is not supported by binary calls");
    }

    #[test]
    fn raw_view_reads_the_content() {
        let call = call(CallType::Binary, &[0, 159, 146, 150]);
        let mut bytes = Vec::new();
        call.raw().read_to_end(&mut bytes).expect("read");
        assert_eq!(bytes, [0, 159, 146, 150]);
    }

    #[test]
    fn context_is_created_lazily_and_cleared() {
        let mut call = call(CallType::Text, b"hi");
        assert!(call.context().is_none());
        call.context_mut().set("trace", "abc");
        assert!(call.context().is_some_and(|bag| bag.contains("trace")));
        call.clear();
        assert!(call.context().is_none());
    }

    #[test]
    fn second_attachment_is_rejected() {
        let request = Arc::new(ConnectionRequest::new(9, None));
        let mut call = call(CallType::Json, b"{}");
        call.attach_to(Arc::clone(&request)).expect("first attach");
        assert_eq!(
            call.attach_to(request),
            Err(CallError::AlreadyAttached { connection: 9 })
        );
    }
}
