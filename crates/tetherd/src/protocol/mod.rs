//! Legacy text-framed wire protocol.
//!
//! Requests arrive as `<type>://<name>/<session>/(<length>)?<content>` and
//! responses leave as `<mime>://(<length>)?<payload>`.

mod decoder;
mod encoder;
mod errors;
mod frame;
mod response;

pub use self::decoder::{FrameDecoder, MAX_TOKEN_BYTES};
pub use self::encoder::ContentEncoder;
pub use self::errors::{FramePart, ProtocolError};
pub use self::frame::{CallType, Frame};
pub use self::response::ResponseFrame;

const PROTOCOL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::protocol");
