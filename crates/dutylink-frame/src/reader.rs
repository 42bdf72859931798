use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use dutylink_transport::LinkStream;
use tracing::trace;

use crate::codec::{decode_command, decode_duty, Command, FrameConfig};
use crate::error::{FrameError, Result};

/// Reads frames from any `Read` stream.
///
/// Each read of up to `max_frame_size` bytes is one frame. When a read holds
/// newlines it is split into one frame per line, and an unterminated tail is
/// a frame of its own.
pub struct FrameReader<T> {
    inner: T,
    pending: VecDeque<Bytes>,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            pending: VecDeque::new(),
            config,
        }
    }

    /// Read the next frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(frame);
            }

            let mut chunk = BytesMut::zeroed(self.config.max_frame_size.max(1));
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            chunk.truncate(read);
            trace!(bytes = read, "read chunk");
            split_lines(chunk.freeze(), &mut self.pending);
        }
    }

    /// Read and decode the next request frame.
    pub fn read_command(&mut self) -> Result<Command> {
        let frame = self.read_frame()?;
        Ok(decode_command(&frame)?)
    }

    /// Read and decode the next duty response.
    pub fn read_duty(&mut self) -> Result<dutylink_motor::Duty> {
        let frame = self.read_frame()?;
        Ok(decode_duty(&frame)?)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<LinkStream> {
    /// Create a frame reader for `LinkStream` and apply read timeout from config.
    pub fn with_config_link(inner: LinkStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

fn split_lines(mut chunk: Bytes, out: &mut VecDeque<Bytes>) {
    while let Some(pos) = chunk.iter().position(|b| *b == b'\n') {
        let line = chunk.split_to(pos + 1);
        out.push_back(line.slice(..pos));
    }
    if !chunk.is_empty() {
        out.push_back(chunk);
    }
}

pub(crate) fn transport_to_frame_error(err: dutylink_transport::TransportError) -> FrameError {
    match err {
        dutylink_transport::TransportError::Io(io)
        | dutylink_transport::TransportError::Accept(io) => FrameError::Io(io),
        dutylink_transport::TransportError::Bind { source, .. }
        | dutylink_transport::TransportError::Connect { source, .. }
        | dutylink_transport::TransportError::SocketOption { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
