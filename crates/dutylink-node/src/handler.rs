//! Per-connection command loop.
//!
//! ```text
//! AwaitingFrame ──frame──▶ Dispatching ──▶ AwaitingFrame
//!       │                       │
//!   eof / error            write error
//!       ▼                       ▼
//!     Closed ◀──────────────────┘   (motor stopped once)
//! ```
//! A connection enters `AwaitingFrame` as soon as it is accepted.

use std::io::{Read, Write};
use std::net::SocketAddr;

use bytes::Bytes;
use dutylink_frame::{decode_command, Command, FrameConfig, FrameError, FrameReader, FrameWriter};
use dutylink_motor::{Duty, DutyController, PwmChannelDriver};
use dutylink_transport::LinkStream;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The client closed its end.
    PeerClosed,
    /// Reading failed (reset, keep-alive expiry).
    ReadFailed(String),
    /// Writing a response failed.
    WriteFailed(String),
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::PeerClosed => f.write_str("peer closed"),
            CloseReason::ReadFailed(err) => write!(f, "read failed: {err}"),
            CloseReason::WriteFailed(err) => write!(f, "write failed: {err}"),
        }
    }
}

/// Counters for one connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames: u64,
    pub gets: u64,
    pub sets: u64,
    /// Malformed frames dropped without a reply.
    pub dropped: u64,
    /// Fades that reported a hardware fault, including the final stop.
    pub faults: u64,
}

/// Outcome of a finished connection.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub peer: Option<SocketAddr>,
    pub stats: SessionStats,
    pub close_reason: CloseReason,
    /// Duty after the closing stop; zero unless the stop itself faulted.
    pub final_duty: Duty,
}

enum State {
    AwaitingFrame,
    Dispatching(Bytes),
    Closed(CloseReason),
}

/// Serves one accepted connection against a borrowed controller.
pub struct ConnectionHandler<'c, R, W, D> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    controller: &'c mut DutyController<D>,
    peer: Option<SocketAddr>,
    stats: SessionStats,
}

impl<'c, D: PwmChannelDriver> ConnectionHandler<'c, LinkStream, LinkStream, D> {
    /// Build a handler over an accepted stream.
    pub fn for_link(
        stream: LinkStream,
        config: &FrameConfig,
        controller: &'c mut DutyController<D>,
    ) -> Result<Self> {
        let peer = stream.peer_addr();
        let reader_stream = stream.try_clone()?;
        let reader = FrameReader::with_config_link(reader_stream, config.clone())?;
        let writer = FrameWriter::with_config_link(stream, config.clone())?;
        Ok(Self::new(reader, writer, controller).with_peer(peer))
    }
}

impl<'c, R: Read, W: Write, D: PwmChannelDriver> ConnectionHandler<'c, R, W, D> {
    pub fn new(
        reader: FrameReader<R>,
        writer: FrameWriter<W>,
        controller: &'c mut DutyController<D>,
    ) -> Self {
        Self {
            reader,
            writer,
            controller,
            peer: None,
            stats: SessionStats::default(),
        }
    }

    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Serve until the connection closes, then stop the motor.
    pub fn run(mut self) -> SessionSummary {
        let mut state = State::AwaitingFrame;
        let reason = loop {
            state = match state {
                State::AwaitingFrame => self.await_frame(),
                State::Dispatching(frame) => self.dispatch(&frame),
                State::Closed(reason) => break reason,
            };
        };
        self.close(reason)
    }

    fn await_frame(&mut self) -> State {
        match self.reader.read_frame() {
            Ok(frame) => {
                self.stats.frames += 1;
                State::Dispatching(frame)
            }
            Err(FrameError::ConnectionClosed) => State::Closed(CloseReason::PeerClosed),
            Err(err) => State::Closed(CloseReason::ReadFailed(err.to_string())),
        }
    }

    fn dispatch(&mut self, frame: &[u8]) -> State {
        let command = match decode_command(frame) {
            Ok(command) => command,
            Err(err) => {
                self.stats.dropped += 1;
                debug!(
                    error = %err,
                    frame = %String::from_utf8_lossy(frame),
                    "dropping malformed frame"
                );
                return State::AwaitingFrame;
            }
        };
        debug!(command = command.name(), "dispatching");

        match command {
            Command::Get => {
                self.stats.gets += 1;
                let duty = self.controller.query();
                if let Err(err) = self.writer.send_duty(duty) {
                    return State::Closed(CloseReason::WriteFailed(err.to_string()));
                }
            }
            Command::Set(request) => {
                self.stats.sets += 1;
                if let Err(fault) = self.controller.apply(request.target, request.duration_ms) {
                    self.stats.faults += 1;
                    warn!(
                        target_duty = %request.target,
                        duty = %self.controller.query(),
                        error = %fault,
                        "set failed; keeping connection"
                    );
                }
            }
        }
        State::AwaitingFrame
    }

    fn close(mut self, reason: CloseReason) -> SessionSummary {
        if let Err(fault) = self.controller.apply(Duty::ZERO, 0) {
            self.stats.faults += 1;
            warn!(error = %fault, "failed to stop motor on disconnect");
        }
        let final_duty = self.controller.query();
        if self.stats.dropped > 0 {
            warn!(dropped = self.stats.dropped, "session had malformed frames");
        }
        info!(
            peer = ?self.peer,
            reason = %reason,
            frames = self.stats.frames,
            dropped = self.stats.dropped,
            duty = %final_duty,
            "connection closed"
        );

        SessionSummary {
            peer: self.peer,
            stats: self.stats,
            close_reason: reason,
            final_duty,
        }
    }
}
