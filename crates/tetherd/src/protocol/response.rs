//! Client-side reader for response frames, used by tests and tooling.

use std::io::{self, Read};

use bytes::Bytes;

use super::{FramePart, MAX_TOKEN_BYTES, ProtocolError};
use crate::content::MimeType;

/// A decoded `<mime>://(<length>)?<bytes>` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    mime: MimeType,
    payload: Bytes,
}

impl ResponseFrame {
    #[must_use]
    pub fn mime(&self) -> &MimeType {
        &self.mime
    }

    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload parsed as JSON.
    ///
    /// # Errors
    ///
    /// Returns the parser error when the payload is not JSON.
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }

    /// Reads one response from a blocking stream.
    ///
    /// Returns `Ok(None)` when the stream ends before the first header byte.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] for malformed headers, truncated payloads,
    /// or IO failures.
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Option<Self>, ProtocolError> {
        let Some(mime) = read_token(reader, b':', FramePart::CallType, true)? else {
            return Ok(None);
        };
        expect(reader, FramePart::FirstSlash, '/')?;
        expect(reader, FramePart::SecondSlash, '/')?;
        expect(reader, FramePart::LeftParenthesis, '(')?;
        let length_token = read_token(reader, b')', FramePart::ContentLength, false)?
            .unwrap_or_default();
        let length = length_token
            .parse::<usize>()
            .map_err(|_| ProtocolError::invalid_length(length_token.as_str()))?;
        expect(reader, FramePart::QuestionMark, '?')?;

        let mut payload = vec![0_u8; length];
        reader.read_exact(&mut payload).map_err(|error| {
            if error.kind() == io::ErrorKind::UnexpectedEof {
                ProtocolError::Truncated {
                    part: FramePart::Content,
                    buffered: 0,
                }
            } else {
                ProtocolError::from(error)
            }
        })?;

        Ok(Some(Self {
            mime: MimeType::new(mime),
            payload: Bytes::from(payload),
        }))
    }
}

fn read_byte<R: Read + ?Sized>(reader: &mut R) -> Result<Option<u8>, ProtocolError> {
    let mut byte = [0_u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error.into()),
        }
    }
}

fn read_token<R: Read + ?Sized>(
    reader: &mut R,
    terminator: u8,
    part: FramePart,
    allow_eof: bool,
) -> Result<Option<String>, ProtocolError> {
    let mut token = Vec::new();
    loop {
        match read_byte(reader)? {
            Some(byte) if byte == terminator => break,
            Some(byte) => {
                token.push(byte);
                if token.len() > MAX_TOKEN_BYTES {
                    return Err(ProtocolError::TokenTooLong {
                        part,
                        limit: MAX_TOKEN_BYTES,
                    });
                }
            }
            None if allow_eof && token.is_empty() => return Ok(None),
            None => {
                return Err(ProtocolError::Truncated {
                    part,
                    buffered: token.len(),
                });
            }
        }
    }
    String::from_utf8(token)
        .map(Some)
        .map_err(|_| ProtocolError::InvalidUtf8 { part })
}

fn expect<R: Read + ?Sized>(
    reader: &mut R,
    part: FramePart,
    expected: char,
) -> Result<(), ProtocolError> {
    match read_byte(reader)? {
        Some(byte) if char::from(byte) == expected => Ok(()),
        Some(byte) => Err(ProtocolError::unexpected_byte(part, expected, byte)),
        None => Err(ProtocolError::Truncated { part, buffered: 0 }),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn reads_consecutive_responses() {
        let mut wire = Cursor::new(&b"json://(2)?{}text://(0)?"[..]);
        let first = ResponseFrame::read_from(&mut wire)
            .expect("read")
            .expect("first frame");
        assert_eq!(first.mime(), &MimeType::JSON);
        assert_eq!(&first.payload()[..], b"{}");

        let second = ResponseFrame::read_from(&mut wire)
            .expect("read")
            .expect("second frame");
        assert_eq!(second.mime(), &MimeType::TEXT);
        assert!(second.payload().is_empty());

        assert!(ResponseFrame::read_from(&mut wire).expect("eof").is_none());
    }

    #[test]
    fn truncated_payloads_are_errors() {
        let mut wire = Cursor::new(&b"json://(5)?{}"[..]);
        let error = ResponseFrame::read_from(&mut wire).expect_err("truncated");
        assert!(matches!(error, ProtocolError::Truncated { .. }));
    }
}
