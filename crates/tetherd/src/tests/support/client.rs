//! Blocking legacy protocol client.

use std::io::{self, Write};
use std::net::TcpStream;
use std::time::Duration;

use tether_config::SocketEndpoint;

use crate::protocol::{ProtocolError, ResponseFrame};

const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of waiting for the next response.
#[derive(Debug)]
pub enum Received {
    Frame(ResponseFrame),
    Closed,
}

pub struct LegacyClient {
    stream: TcpStream,
}

impl LegacyClient {
    pub fn connect(endpoint: &SocketEndpoint) -> Self {
        let SocketEndpoint::Tcp { host, port } = endpoint else {
            panic!("test bridges listen on TCP, got {endpoint}");
        };
        let stream = TcpStream::connect((host.as_str(), *port)).expect("connect to bridge");
        stream.set_nodelay(true).expect("disable nagle");
        stream
            .set_read_timeout(Some(READ_TIMEOUT))
            .expect("set read timeout");
        Self { stream }
    }

    pub fn send(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).expect("write frame");
        self.stream.flush().expect("flush frame");
    }

    /// Sends each byte in its own write so the bridge sees many small reads.
    pub fn send_bytewise(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.send(std::slice::from_ref(byte));
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    pub fn receive(&mut self) -> Received {
        match ResponseFrame::read_from(&mut self.stream) {
            Ok(Some(frame)) => Received::Frame(frame),
            Ok(None) => Received::Closed,
            Err(ProtocolError::Io { source }) if is_disconnect(&source) => Received::Closed,
            Err(error) => panic!("failed to read response: {error}"),
        }
    }

    pub fn receive_frame(&mut self) -> ResponseFrame {
        match self.receive() {
            Received::Frame(frame) => frame,
            Received::Closed => panic!("bridge closed the connection instead of responding"),
        }
    }
}

/// Renders a response the way it appeared on the wire.
pub fn render(frame: &ResponseFrame) -> String {
    format!(
        "{}://({})?{}",
        frame.mime(),
        frame.payload().len(),
        String::from_utf8_lossy(frame.payload())
    )
}

fn is_disconnect(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted | io::ErrorKind::BrokenPipe
    )
}
