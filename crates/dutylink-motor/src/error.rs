use crate::plan::Channel;

/// Errors reported by a [`PwmChannelDriver`](crate::PwmChannelDriver).
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The driver refused the fade request.
    #[error("fade rejected: {0}")]
    Rejected(String),

    /// Both bridge inputs would be driven at the same time.
    #[error("opposite channel still active at level {opposite_level}")]
    BridgeConflict { opposite_level: u8 },

    /// An injected or simulated failure.
    #[error("simulated fault")]
    Simulated,

    /// An I/O error occurred talking to the PWM peripheral.
    #[error("pwm I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A fade step reported failure.
#[derive(Debug, thiserror::Error)]
#[error("hardware fault on {channel} channel: {source}")]
pub struct HardwareFault {
    /// The channel whose fade failed.
    pub channel: Channel,
    /// The underlying driver failure.
    #[source]
    pub source: DriverError,
}

/// Errors from the controller's unvalidated entry points.
#[derive(Debug, thiserror::Error)]
pub enum MotorError {
    /// The requested duty lies outside -100..=100.
    #[error("duty {0} outside -100..=100")]
    OutOfRange(i64),

    /// A fade step failed.
    #[error(transparent)]
    Hardware(#[from] HardwareFault),
}

pub type Result<T> = std::result::Result<T, MotorError>;
