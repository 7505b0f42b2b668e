//! Decoded wire frames and their call types.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

/// Call type carried by the first header token of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallType {
    /// Opens a connection and attaches it to a session.
    Open,
    /// Structured arguments with a raw-text view.
    Data,
    /// Structured arguments parsed lazily.
    Json,
    /// Raw text arguments.
    Text,
    /// Raw bytes only.
    Binary,
    /// Acknowledges and closes the connection.
    Close,
}

impl CallType {
    /// Every call type in wire order.
    pub const ALL: [Self; 6] = [
        Self::Open,
        Self::Data,
        Self::Json,
        Self::Text,
        Self::Binary,
        Self::Close,
    ];

    /// Lower-case wire token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Data => "data",
            Self::Json => "json",
            Self::Text => "text",
            Self::Binary => "binary",
            Self::Close => "close",
        }
    }

    /// Matches a header token, ignoring ASCII case.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|call_type| call_type.as_str().eq_ignore_ascii_case(token))
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// One complete unit of the legacy wire protocol.
///
/// The content always holds exactly the number of bytes the header declared;
/// [`FrameDecoder`](super::FrameDecoder) never yields a partially buffered
/// frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    call_type: CallType,
    aliased_name: String,
    session_id: String,
    content: Bytes,
}

impl Frame {
    /// Builds a frame from its parts.
    #[must_use]
    pub fn new(
        call_type: CallType,
        aliased_name: impl Into<String>,
        session_id: impl Into<String>,
        content: impl Into<Bytes>,
    ) -> Self {
        Self {
            call_type,
            aliased_name: aliased_name.into(),
            session_id: session_id.into(),
            content: content.into(),
        }
    }

    #[must_use]
    pub fn call_type(&self) -> CallType {
        self.call_type
    }

    /// Command name as sent by the client, before alias rewriting.
    #[must_use]
    pub fn aliased_name(&self) -> &str {
        &self.aliased_name
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    #[must_use]
    pub fn content_length(&self) -> usize {
        self.content.len()
    }

    /// Serialises the frame the way a legacy client sends it.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let header = format!(
            "{}://{}/{}/({})?",
            self.call_type,
            self.aliased_name,
            self.session_id,
            self.content.len()
        );
        let mut out = BytesMut::with_capacity(header.len() + self.content.len());
        out.put_slice(header.as_bytes());
        out.put_slice(&self.content);
        out.freeze()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("json", Some(CallType::Json))]
    #[case("OPEN", Some(CallType::Open))]
    #[case("Binary", Some(CallType::Binary))]
    #[case("stream", None)]
    #[case("", None)]
    fn call_type_tokens_ignore_case(#[case] token: &str, #[case] expected: Option<CallType>) {
        assert_eq!(CallType::from_token(token), expected);
    }

    #[test]
    fn frames_serialise_in_client_form() {
        let frame = Frame::new(CallType::Open, "x", "sess1", &b"{}"[..]);
        assert_eq!(&frame.to_bytes()[..], b"open://x/sess1/(2)?{}");
        assert_eq!(frame.content_length(), 2);
    }
}
