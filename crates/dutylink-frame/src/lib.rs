//! Text command framing for the dutylink wire protocol.
//!
//! Requests are whitespace separated ASCII tokens: `0` queries the duty,
//! `1 <duty> <fade_ms>` sets it. The only response is the duty in decimal.
//! One read is one frame; newlines split a read into several frames.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_command, decode_duty, encode_command, encode_duty, Command, FadeRequest, FrameConfig,
    GET, MAX_FRAME_SIZE, SET,
};
pub use error::{DecodeError, FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
