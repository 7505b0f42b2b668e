//! Response framing.

use std::io::{self, Write};

use bytes::{BufMut, Bytes, BytesMut};

use crate::content::Content;

/// Serialises [`Content`] as `<mime>://(<length>)?<bytes>`.
///
/// The encoder is stateless; one instance serves every connection.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentEncoder;

impl ContentEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Appends the framed content to `out`.
    pub fn encode_into(&self, content: &Content, out: &mut BytesMut) {
        let header = header(content);
        out.reserve(header.len() + content.len());
        out.put_slice(header.as_bytes());
        out.put_slice(content.payload());
    }

    /// Returns the framed content as one buffer.
    #[must_use]
    pub fn encode(&self, content: &Content) -> Bytes {
        let mut out = BytesMut::new();
        self.encode_into(content, &mut out);
        out.freeze()
    }

    /// Writes the header and then the payload straight to `writer`.
    ///
    /// # Errors
    ///
    /// Propagates write and flush failures from the underlying stream.
    pub fn write_to<W: Write + ?Sized>(&self, content: &Content, writer: &mut W) -> io::Result<()> {
        writer.write_all(header(content).as_bytes())?;
        writer.write_all(content.payload())?;
        writer.flush()
    }
}

fn header(content: &Content) -> String {
    format!("{}://({})?", content.mime(), content.len())
}
