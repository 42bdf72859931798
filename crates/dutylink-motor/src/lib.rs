//! Signed duty-cycle fade controller for two-channel H-bridge motor drivers.
//!
//! A bidirectional motor is driven through two unidirectional PWM inputs. The
//! [`DutyController`] keeps the signed duty (-100..=100 percent), turns each
//! requested transition into a [`FadePlan`] that honors a minimum fade rate
//! and passes through zero when the direction changes, and executes the plan
//! on a [`PwmChannelDriver`].

pub mod controller;
pub mod driver;
pub mod duty;
pub mod error;
pub mod plan;

pub use controller::{ControllerConfig, DutyController};
#[cfg(feature = "rpi")]
pub use driver::RppalDriver;
pub use driver::{PwmChannelDriver, SimulatedDriver};
pub use duty::Duty;
pub use error::{DriverError, HardwareFault, MotorError, Result};
pub use plan::{
    min_fade_ms, scale, Channel, FadePlan, FadeStep, MAX_LEVEL, MIN_MS_PER_PERCENT,
    ZERO_TARGET_FADE_MS,
};
