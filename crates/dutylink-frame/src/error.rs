/// A frame that is not a valid command or response.
///
/// The node drops such frames without replying.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The frame holds no tokens.
    #[error("empty frame")]
    Empty,

    /// The frame contains non-ASCII bytes.
    #[error("frame is not ASCII text")]
    NotText,

    /// The first token is not a known command.
    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    /// A required argument is missing.
    #[error("missing {0} argument")]
    MissingArgument(&'static str),

    /// More tokens than the command takes.
    #[error("unexpected trailing token {0:?}")]
    TrailingToken(String),

    /// A token is not a decimal integer.
    #[error("{field} is not an integer: {token:?}")]
    InvalidInteger { field: &'static str, token: String },

    /// Duty outside -100..=100.
    #[error("duty {0} outside -100..=100")]
    DutyOutOfRange(i64),

    /// Fade time below zero.
    #[error("negative fade time {0}")]
    NegativeFade(i64),

    /// Fade time does not fit in 32 bits of milliseconds.
    #[error("fade time {0} ms too long")]
    FadeTooLong(i64),
}

/// Errors that can occur while reading or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame exceeds the configured maximum size.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// A received frame could not be decoded.
    #[error("malformed frame: {0}")]
    Decode(#[from] DecodeError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
