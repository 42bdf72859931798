use tracing::{debug, info, warn};

use crate::driver::PwmChannelDriver;
use crate::duty::Duty;
use crate::error::{HardwareFault, MotorError};
use crate::plan::{FadePlan, FadeStep, MIN_MS_PER_PERCENT, ZERO_TARGET_FADE_MS};

/// Calibration of the fade controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Minimum fade time per percent of duty change. Default: 10 ms.
    pub min_ms_per_percent: u32,
    /// Fade time used when the target is zero. Default: 1 ms.
    pub zero_target_fade_ms: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            min_ms_per_percent: MIN_MS_PER_PERCENT,
            zero_target_fade_ms: ZERO_TARGET_FADE_MS,
        }
    }
}

/// Owns the motor's signed duty and drives the bridge toward new targets.
pub struct DutyController<D> {
    driver: D,
    current: Duty,
    config: ControllerConfig,
}

impl<D: PwmChannelDriver> DutyController<D> {
    /// Create a controller at duty 0 with default calibration.
    pub fn new(driver: D) -> Self {
        Self::with_config(driver, ControllerConfig::default())
    }

    pub fn with_config(driver: D, config: ControllerConfig) -> Self {
        Self {
            driver,
            current: Duty::ZERO,
            config,
        }
    }

    /// Current duty.
    pub fn query(&self) -> Duty {
        self.current
    }

    /// Plan the transition to `target` without executing it.
    pub fn plan(&self, target: Duty, requested_ms: u32) -> FadePlan {
        FadePlan::compute(self.current, target, requested_ms, &self.config)
    }

    /// Fade to `target` over at least `requested_ms`.
    ///
    /// Steps run in order and each blocks until the hardware fade completes.
    /// When the second step of a zero crossing fails the duty is left at zero;
    /// when the first fails it is left unchanged.
    pub fn apply(&mut self, target: Duty, requested_ms: u32) -> Result<(), HardwareFault> {
        let plan = self.plan(target, requested_ms);
        debug!(
            from = %plan.from(),
            to = %target,
            requested_ms,
            effective_ms = plan.effective_ms(),
            steps = plan.step_count(),
            "applying fade plan"
        );

        let result = match plan.into_parts() {
            (step, None) => self.run_step(&step),
            (release, Some(engage)) => self
                .run_step(&release)
                .and_then(|()| self.run_step(&engage)),
        };

        match &result {
            Ok(()) => info!(duty = %self.current, "duty set"),
            Err(fault) => warn!(duty = %self.current, error = %fault, "fade aborted"),
        }
        result
    }

    /// Like [`apply`](Self::apply) for an unvalidated percentage.
    ///
    /// Out-of-range values are rejected without touching the hardware.
    pub fn apply_percent(&mut self, percent: i64, requested_ms: u32) -> Result<(), MotorError> {
        let target = Duty::new(percent)?;
        self.apply(target, requested_ms)?;
        Ok(())
    }

    /// Fade to zero as quickly as allowed.
    pub fn stop(&mut self) -> Result<(), HardwareFault> {
        self.apply(Duty::ZERO, 0)
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    fn run_step(&mut self, step: &FadeStep) -> Result<(), HardwareFault> {
        self.driver.fade(step).map_err(|source| HardwareFault {
            channel: step.channel,
            source,
        })?;
        self.current = step.settles_at;
        Ok(())
    }
}
