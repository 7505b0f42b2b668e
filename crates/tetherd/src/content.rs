//! Response payloads.

use std::borrow::Cow;
use std::error::Error;
use std::fmt;

use bytes::Bytes;
use serde_json::{Map, Value, json};

/// MIME name written in front of a response payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MimeType(Cow<'static, str>);

impl MimeType {
    pub const JSON: Self = Self(Cow::Borrowed("json"));
    pub const TEXT: Self = Self(Cow::Borrowed("text"));
    pub const BINARY: Self = Self(Cow::Borrowed("binary"));
    pub const ERROR: Self = Self(Cow::Borrowed("error"));

    /// Arbitrary MIME name, as produced by jobs and deprecated commands.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// A response payload tagged with its MIME name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    mime: MimeType,
    payload: Bytes,
}

impl Content {
    #[must_use]
    pub fn new(mime: MimeType, payload: impl Into<Bytes>) -> Self {
        Self {
            mime,
            payload: payload.into(),
        }
    }

    /// Structured payload from a JSON object.
    #[must_use]
    pub fn json(map: Map<String, Value>) -> Self {
        Self::json_value(&Value::Object(map))
    }

    /// Structured payload from any JSON value.
    #[must_use]
    pub fn json_value(value: &Value) -> Self {
        Self::new(MimeType::JSON, value.to_string().into_bytes())
    }

    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(MimeType::TEXT, text.into().into_bytes())
    }

    #[must_use]
    pub fn binary(bytes: impl Into<Bytes>) -> Self {
        Self::new(MimeType::BINARY, bytes)
    }

    /// Empty acknowledgement sent in reply to CLOSE.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(MimeType::TEXT, Bytes::new())
    }

    /// Error payload `{"kind", "message", "causes"}` built from an error and
    /// its source chain.
    #[must_use]
    pub fn error(kind: &str, error: &(dyn Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(Value::String(cause.to_string()));
            source = cause.source();
        }
        let body = json!({
            "kind": kind,
            "message": error.to_string(),
            "causes": causes,
        });
        Self::new(MimeType::ERROR, body.to_string().into_bytes())
    }

    #[must_use]
    pub fn mime(&self) -> &MimeType {
        &self.mime
    }

    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.mime == MimeType::ERROR
    }
}

#[cfg(test)]
mod tests {
    use thiserror::Error;

    use super::*;

    #[derive(Debug, Error)]
    #[error("outer failure")]
    struct Outer {
        #[source]
        source: Inner,
    }

    #[derive(Debug, Error)]
    #[error("inner failure")]
    struct Inner;

    #[test]
    fn error_content_lists_the_source_chain() {
        let content = Content::error("execution", &Outer { source: Inner });
        assert!(content.is_error());
        let body: Value = serde_json::from_slice(content.payload()).expect("json");
        assert_eq!(
            body,
            json!({
                "kind": "execution",
                "message": "outer failure",
                "causes": ["inner failure"],
            })
        );
    }

    #[test]
    fn custom_mime_names_round_trip() {
        let content = Content::new(MimeType::new("html"), "<p/>");
        assert_eq!(content.mime().as_str(), "html");
        assert_eq!(content.len(), 4);
    }
}
