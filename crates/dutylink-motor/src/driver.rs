use std::time::Duration;

use tracing::{debug, trace};

use crate::error::DriverError;
use crate::plan::{Channel, FadeStep};

/// Blocking fade primitive for the two bridge inputs.
///
/// Implementations ramp `step.channel` from its present level to
/// `step.to_level` over `step.duration_ms` and return only once the fade has
/// completed (or failed).
pub trait PwmChannelDriver {
    /// Execute one fade step.
    fn fade(&mut self, step: &FadeStep) -> Result<(), DriverError>;

    /// Last level the driver reached on `channel`.
    fn level(&self, channel: Channel) -> u8;
}

impl<D: PwmChannelDriver + ?Sized> PwmChannelDriver for Box<D> {
    fn fade(&mut self, step: &FadeStep) -> Result<(), DriverError> {
        (**self).fade(step)
    }

    fn level(&self, channel: Channel) -> u8 {
        (**self).level(channel)
    }
}

/// In-memory driver that tracks channel levels without touching hardware.
///
/// With real-time timing enabled each fade sleeps for its duration, which
/// mimics the blocking behavior of a hardware fade.
#[derive(Debug, Default)]
pub struct SimulatedDriver {
    levels: [u8; 2],
    faulted: [bool; 2],
    realtime: bool,
    fades: u64,
}

impl SimulatedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for each fade's duration.
    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// Make every subsequent fade on `channel` fail.
    pub fn inject_fault(&mut self, channel: Channel) {
        self.faulted[channel.index()] = true;
    }

    pub fn clear_faults(&mut self) {
        self.faulted = [false; 2];
    }

    /// Number of fades completed successfully.
    pub fn completed_fades(&self) -> u64 {
        self.fades
    }
}

impl PwmChannelDriver for SimulatedDriver {
    fn fade(&mut self, step: &FadeStep) -> Result<(), DriverError> {
        let idx = step.channel.index();
        if self.faulted[idx] {
            return Err(DriverError::Simulated);
        }
        check_bridge(&*self, step)?;

        if self.realtime {
            std::thread::sleep(Duration::from_millis(u64::from(step.duration_ms)));
        }
        self.levels[idx] = step.to_level;
        self.fades += 1;
        debug!(
            channel = %step.channel,
            from = step.from_level,
            to = step.to_level,
            duration_ms = step.duration_ms,
            "simulated fade complete"
        );
        Ok(())
    }

    fn level(&self, channel: Channel) -> u8 {
        self.levels[channel.index()]
    }
}

/// Refuse to raise one bridge input while the other is still driven.
pub fn check_bridge<D: PwmChannelDriver + ?Sized>(
    driver: &D,
    step: &FadeStep,
) -> Result<(), DriverError> {
    let opposite_level = driver.level(step.channel.opposite());
    if step.to_level > 0 && opposite_level > 0 {
        trace!(channel = %step.channel, opposite_level, "bridge conflict");
        return Err(DriverError::BridgeConflict { opposite_level });
    }
    Ok(())
}

#[cfg(feature = "rpi")]
pub use rpi::RppalDriver;

#[cfg(feature = "rpi")]
mod rpi {
    use std::time::Duration;

    use rppal::pwm::{Channel as PwmChannel, Polarity, Pwm};
    use tracing::{debug, info};

    use super::{check_bridge, PwmChannelDriver};
    use crate::error::DriverError;
    use crate::plan::{Channel, FadeStep, MAX_LEVEL};

    /// H-bridge input frequency.
    pub const PWM_FREQUENCY_HZ: f64 = 10_000.0;
    /// Software fade update interval.
    const FADE_TICK: Duration = Duration::from_millis(10);

    /// Raspberry Pi hardware PWM, one channel per bridge input.
    ///
    /// The Pi has no hardware fade unit, so fades are stepped linearly every
    /// [`FADE_TICK`].
    pub struct RppalDriver {
        outputs: [Pwm; 2],
        levels: [u8; 2],
    }

    impl RppalDriver {
        /// Enable `positive` and `negative` at zero duty.
        pub fn new(positive: PwmChannel, negative: PwmChannel) -> Result<Self, DriverError> {
            let open = |channel| {
                Pwm::with_frequency(channel, PWM_FREQUENCY_HZ, 0.0, Polarity::Normal, true)
                    .map_err(pwm_error)
            };
            let outputs = [open(positive)?, open(negative)?];
            info!(frequency_hz = PWM_FREQUENCY_HZ, "raspberry pi pwm enabled");
            Ok(Self {
                outputs,
                levels: [0; 2],
            })
        }

        /// PWM0 (GPIO 18) drives positive duties, PWM1 (GPIO 19) negative.
        pub fn with_default_channels() -> Result<Self, DriverError> {
            Self::new(PwmChannel::Pwm0, PwmChannel::Pwm1)
        }

        fn write_level(&self, channel: Channel, level: u8) -> Result<(), DriverError> {
            self.outputs[channel.index()]
                .set_duty_cycle(f64::from(level) / f64::from(MAX_LEVEL))
                .map_err(pwm_error)
        }
    }

    impl PwmChannelDriver for RppalDriver {
        fn fade(&mut self, step: &FadeStep) -> Result<(), DriverError> {
            check_bridge(&*self, step)?;

            let idx = step.channel.index();
            let from = i64::from(self.levels[idx]);
            let to = i64::from(step.to_level);
            let ticks = (u64::from(step.duration_ms) / FADE_TICK.as_millis() as u64).max(1);

            for tick in 1..=ticks {
                let level = from + (to - from) * tick as i64 / ticks as i64;
                self.write_level(step.channel, level as u8)?;
                self.levels[idx] = level as u8;
                std::thread::sleep(FADE_TICK);
            }
            debug!(channel = %step.channel, level = step.to_level, "fade complete");
            Ok(())
        }

        fn level(&self, channel: Channel) -> u8 {
            self.levels[channel.index()]
        }
    }

    fn pwm_error(err: rppal::pwm::Error) -> DriverError {
        match err {
            rppal::pwm::Error::Io(io) => DriverError::Io(io),
            other => DriverError::Rejected(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duty::Duty;

    fn step(channel: Channel, to_level: u8) -> FadeStep {
        FadeStep {
            channel,
            from_level: 0,
            to_level,
            duration_ms: 1,
            settles_at: Duty::ZERO,
        }
    }

    #[test]
    fn simulated_tracks_levels() {
        let mut driver = SimulatedDriver::new();
        driver.fade(&step(Channel::Positive, 128)).unwrap();
        assert_eq!(driver.level(Channel::Positive), 128);
        assert_eq!(driver.level(Channel::Negative), 0);
        assert_eq!(driver.completed_fades(), 1);
    }

    #[test]
    fn simulated_refuses_both_channels_active() {
        let mut driver = SimulatedDriver::new();
        driver.fade(&step(Channel::Positive, 10)).unwrap();
        let err = driver.fade(&step(Channel::Negative, 10)).unwrap_err();
        assert!(matches!(err, DriverError::BridgeConflict { opposite_level: 10 }));

        // Lowering the opposite channel to zero is always allowed.
        driver.fade(&step(Channel::Negative, 0)).unwrap();
    }

    #[test]
    fn injected_fault_fails_only_that_channel() {
        let mut driver = SimulatedDriver::new();
        driver.inject_fault(Channel::Negative);
        assert!(matches!(
            driver.fade(&step(Channel::Negative, 5)),
            Err(DriverError::Simulated)
        ));
        driver.fade(&step(Channel::Positive, 5)).unwrap();

        driver.clear_faults();
        driver.fade(&step(Channel::Positive, 0)).unwrap();
        driver.fade(&step(Channel::Negative, 5)).unwrap();
    }

    #[test]
    fn realtime_fade_blocks_for_duration() {
        let mut driver = SimulatedDriver::new().with_realtime(true);
        let mut slow = step(Channel::Positive, 1);
        slow.duration_ms = 30;
        let start = std::time::Instant::now();
        driver.fade(&slow).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn boxed_driver_delegates() {
        let mut driver: Box<dyn PwmChannelDriver> = Box::new(SimulatedDriver::new());
        driver.fade(&step(Channel::Negative, 7)).unwrap();
        assert_eq!(driver.level(Channel::Negative), 7);
    }
}
