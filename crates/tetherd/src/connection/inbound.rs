//! Inbound frame sources for one connection.
//!
//! With backpressure the worker itself reads, and only when the decoder needs
//! more bytes. Without it a reader thread decodes ahead into a channel.

use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use bytes::BytesMut;
use tracing::debug;

use super::CONNECTION_TARGET;
use super::errors::ConnectionError;
use crate::protocol::{Frame, FrameDecoder};
use crate::transport::ConnectionStream;

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Pulls frames from a byte source through a per-connection decoder.
pub(crate) struct FrameReader<R> {
    source: R,
    decoder: FrameDecoder,
    buffer: BytesMut,
    chunk: Box<[u8]>,
}

impl<R: Read> FrameReader<R> {
    pub(crate) fn new(source: R, max_content_bytes: usize) -> Self {
        Self {
            source,
            decoder: FrameDecoder::new(max_content_bytes),
            buffer: BytesMut::with_capacity(READ_CHUNK_BYTES),
            chunk: vec![0_u8; READ_CHUNK_BYTES].into_boxed_slice(),
        }
    }

    /// Next complete frame, or `None` at a clean end of stream.
    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>, ConnectionError> {
        loop {
            if let Some(frame) = self.decoder.decode(&mut self.buffer)? {
                return Ok(Some(frame));
            }
            let read = self.read_chunk()?;
            if read == 0 {
                self.decoder.finish(&self.buffer)?;
                return Ok(None);
            }
            self.buffer.extend_from_slice(&self.chunk[..read]);
        }
    }

    fn read_chunk(&mut self) -> Result<usize, ConnectionError> {
        loop {
            match self.source.read(&mut self.chunk) {
                Ok(read) => return Ok(read),
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => return Err(ConnectionError::Protocol(error.into())),
            }
        }
    }
}

/// Frame source for one connection worker.
pub(crate) enum Inbound<R = ConnectionStream> {
    Throttled(FrameReader<R>),
    Eager {
        frames: Receiver<Result<Frame, ConnectionError>>,
        reader: Option<JoinHandle<()>>,
    },
}

impl Inbound {
    pub(crate) fn open(
        stream: &ConnectionStream,
        backpressure: bool,
        max_content_bytes: usize,
    ) -> Result<Self, ConnectionError> {
        let source = stream.try_clone().map_err(ConnectionError::Split)?;
        Ok(Self::from_source(source, backpressure, max_content_bytes))
    }
}

impl<R: Read + Send + 'static> Inbound<R> {
    pub(crate) fn from_source(source: R, backpressure: bool, max_content_bytes: usize) -> Self {
        let reader = FrameReader::new(source, max_content_bytes);
        if backpressure {
            return Self::Throttled(reader);
        }

        let (sender, frames) = mpsc::channel();
        let handle = thread::spawn(move || read_ahead(reader, &sender));
        Self::Eager {
            frames,
            reader: Some(handle),
        }
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>, ConnectionError> {
        match self {
            Self::Throttled(reader) => reader.next_frame(),
            Self::Eager { frames, .. } => match frames.recv() {
                Ok(result) => result.map(Some),
                Err(mpsc::RecvError) => Ok(None),
            },
        }
    }

    /// Waits for the reader thread. The stream must already be shut down.
    pub(crate) fn close(self) -> Result<(), ConnectionError> {
        match self {
            Self::Throttled(_) => Ok(()),
            Self::Eager { frames, reader } => {
                drop(frames);
                reader
                    .map_or(Ok(()), JoinHandle::join)
                    .map_err(|_| ConnectionError::ReaderLost)
            }
        }
    }
}

fn read_ahead<R: Read>(
    mut reader: FrameReader<R>,
    sender: &mpsc::Sender<Result<Frame, ConnectionError>>,
) {
    loop {
        let next = match reader.next_frame() {
            Ok(Some(frame)) => Ok(frame),
            Ok(None) => break,
            Err(error) => Err(error),
        };
        let stop = next.is_err();
        if sender.send(next).is_err() || stop {
            break;
        }
    }
    debug!(target: CONNECTION_TARGET, "frame reader finished");
}
