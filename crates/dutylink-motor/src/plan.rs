//! Fade planning.
//!
//! A transition between two duties becomes one hardware fade when both lie on
//! the same side of zero, or two sequential fades when the sign changes: the
//! active channel is released to zero first, then the opposite channel is
//! engaged. The bridge inputs are never both non-zero.

use std::fmt;

use serde::Serialize;

use crate::controller::ControllerConfig;
use crate::duty::Duty;

/// Minimum fade time per percent of duty change, in milliseconds.
pub const MIN_MS_PER_PERCENT: u32 = 10;

/// Fade time used when stopping; the fade primitive rejects zero durations.
pub const ZERO_TARGET_FADE_MS: u32 = 1;

/// Full-scale hardware level (8-bit resolution).
pub const MAX_LEVEL: u8 = u8::MAX;

/// One of the two unidirectional bridge inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Drives positive duties.
    Positive,
    /// Drives negative duties.
    Negative,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Positive, Channel::Negative];

    /// The channel that carries `duty`. Zero maps to `Positive`.
    pub fn for_duty(duty: Duty) -> Self {
        if duty.percent() < 0 {
            Channel::Negative
        } else {
            Channel::Positive
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Channel::Positive => Channel::Negative,
            Channel::Negative => Channel::Positive,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Channel::Positive => 0,
            Channel::Negative => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::Positive => "positive",
            Channel::Negative => "negative",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Map a duty's magnitude onto the hardware level range, rounding to nearest.
pub fn scale(duty: Duty) -> u8 {
    let level = (u32::from(duty.magnitude()) * u32::from(MAX_LEVEL) + 50) / 100;
    level as u8
}

/// A single blocking fade of one channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FadeStep {
    pub channel: Channel,
    pub from_level: u8,
    pub to_level: u8,
    pub duration_ms: u32,
    /// Controller duty once this step has completed.
    pub settles_at: Duty,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Steps {
    Single(FadeStep),
    Crossing { release: FadeStep, engage: FadeStep },
}

/// The fades needed to move from one duty to another.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FadePlan {
    from: Duty,
    to: Duty,
    requested_ms: u32,
    effective_ms: u32,
    steps: Steps,
}

impl FadePlan {
    /// Plan the transition `current → target` for a requested fade time.
    pub fn compute(
        current: Duty,
        target: Duty,
        requested_ms: u32,
        config: &ControllerConfig,
    ) -> Self {
        let effective_ms = requested_ms.max(min_fade_ms(current, target, config));
        let cur = current.percent();
        let tgt = target.percent();

        let steps = if cur >= 0 && tgt >= 0 {
            Steps::Single(step(Channel::Positive, current, target, effective_ms))
        } else if cur <= 0 && tgt <= 0 {
            Steps::Single(step(Channel::Negative, current, target, effective_ms))
        } else {
            let (release_ms, engage_ms) = split_crossing(current, target, effective_ms);
            Steps::Crossing {
                release: step(Channel::for_duty(current), current, Duty::ZERO, release_ms),
                engage: step(Channel::for_duty(target), Duty::ZERO, target, engage_ms),
            }
        };

        Self {
            from: current,
            to: target,
            requested_ms,
            effective_ms,
            steps,
        }
    }

    pub fn from(&self) -> Duty {
        self.from
    }

    pub fn to(&self) -> Duty {
        self.to
    }

    pub fn requested_ms(&self) -> u32 {
        self.requested_ms
    }

    /// The fade time after the minimum-rate clamp.
    pub fn effective_ms(&self) -> u32 {
        self.effective_ms
    }

    /// Whether the transition passes through zero.
    pub fn is_crossing(&self) -> bool {
        matches!(self.steps, Steps::Crossing { .. })
    }

    /// Steps in execution order.
    pub fn steps(&self) -> impl Iterator<Item = &FadeStep> {
        let (first, second) = match &self.steps {
            Steps::Single(step) => (step, None),
            Steps::Crossing { release, engage } => (release, Some(engage)),
        };
        std::iter::once(first).chain(second)
    }

    pub fn step_count(&self) -> usize {
        if self.is_crossing() {
            2
        } else {
            1
        }
    }

    /// Sum of all step durations.
    pub fn total_duration_ms(&self) -> u64 {
        self.steps().map(|s| u64::from(s.duration_ms)).sum()
    }

    /// Split the plan into its first step and, for crossings, the second.
    pub fn into_parts(self) -> (FadeStep, Option<FadeStep>) {
        match self.steps {
            Steps::Single(step) => (step, None),
            Steps::Crossing { release, engage } => (release, Some(engage)),
        }
    }
}

/// Minimum fade time for a transition, before honoring the requested time.
pub fn min_fade_ms(current: Duty, target: Duty, config: &ControllerConfig) -> u32 {
    if target.is_zero() {
        config.zero_target_fade_ms
    } else {
        current.delta(target).saturating_mul(config.min_ms_per_percent)
    }
}

fn step(channel: Channel, from: Duty, to: Duty, duration_ms: u32) -> FadeStep {
    FadeStep {
        channel,
        from_level: scale(from),
        to_level: scale(to),
        duration_ms,
        settles_at: to,
    }
}

// The release share is rounded to nearest; the engage share takes the rest so
// the two always add up to the effective time.
fn split_crossing(current: Duty, target: Duty, effective_ms: u32) -> (u32, u32) {
    let delta = u64::from(current.delta(target));
    let release_mag = u64::from(current.magnitude());
    let total = u64::from(effective_ms);
    let release = (release_mag * total * 2 + delta) / (delta * 2);
    let release = release as u32;
    (release, effective_ms - release)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duty(p: i64) -> Duty {
        Duty::new(p).unwrap()
    }

    fn plan(cur: i64, tgt: i64, ms: u32) -> FadePlan {
        FadePlan::compute(duty(cur), duty(tgt), ms, &ControllerConfig::default())
    }

    #[test]
    fn scale_endpoints() {
        assert_eq!(scale(duty(0)), 0);
        assert_eq!(scale(duty(100)), 255);
        assert_eq!(scale(duty(-100)), 255);
        assert_eq!(scale(duty(60)), 153);
        assert_eq!(scale(duty(-40)), 102);
        assert_eq!(scale(duty(1)), 3);
    }

    #[test]
    fn scale_is_monotonic_in_magnitude() {
        let mut previous = 0;
        for p in 0..=100 {
            let level = scale(duty(p));
            assert!(level >= previous, "scale({p}) decreased");
            assert_eq!(level, scale(duty(-p)));
            previous = level;
        }
    }

    #[test]
    fn crossing_positive_to_negative() {
        let plan = plan(60, -40, 1000);
        assert_eq!(plan.effective_ms(), 1000);
        assert!(plan.is_crossing());

        let steps: Vec<_> = plan.steps().copied().collect();
        assert_eq!(
            steps,
            vec![
                FadeStep {
                    channel: Channel::Positive,
                    from_level: 153,
                    to_level: 0,
                    duration_ms: 600,
                    settles_at: Duty::ZERO,
                },
                FadeStep {
                    channel: Channel::Negative,
                    from_level: 0,
                    to_level: 102,
                    duration_ms: 400,
                    settles_at: duty(-40),
                },
            ]
        );
    }

    #[test]
    fn crossing_negative_to_positive_releases_negative_first() {
        let plan = plan(-30, 70, 0);
        assert_eq!(plan.effective_ms(), 1000);
        let (release, engage) = plan.into_parts();
        let engage = engage.expect("crossing has two steps");
        assert_eq!(release.channel, Channel::Negative);
        assert_eq!(release.duration_ms, 300);
        assert_eq!(engage.channel, Channel::Positive);
        assert_eq!(engage.duration_ms, 700);
    }

    #[test]
    fn crossing_split_sums_to_effective_time() {
        for cur in 1..=100 {
            for tgt in [-1, -7, -33, -100] {
                let forward = plan(cur, tgt, 997);
                assert_eq!(forward.total_duration_ms(), u64::from(forward.effective_ms()));
                let backward = plan(tgt, cur, 1234);
                assert_eq!(backward.total_duration_ms(), u64::from(backward.effective_ms()));
            }
        }
    }

    #[test]
    fn crossing_split_rounds_to_nearest() {
        // 1/3 of 1000 = 333.33, 2/3 = 666.67
        let plan = plan(10, -20, 1000);
        let durations: Vec<_> = plan.steps().map(|s| s.duration_ms).collect();
        assert_eq!(durations, vec![333, 667]);
    }

    #[test]
    fn same_sign_is_single_step() {
        let up = plan(10, 50, 0);
        assert_eq!(up.step_count(), 1);
        let (step, rest) = up.into_parts();
        assert!(rest.is_none());
        assert_eq!(step.channel, Channel::Positive);
        assert_eq!(step.duration_ms, 400);

        let down = plan(-80, -20, 0);
        let (step, _) = down.into_parts();
        assert_eq!(step.channel, Channel::Negative);
        assert_eq!((step.from_level, step.to_level), (204, 51));
    }

    #[test]
    fn stopping_uses_zero_target_minimum() {
        let plan = plan(-100, 0, 0);
        assert_eq!(plan.effective_ms(), ZERO_TARGET_FADE_MS);
        let (step, _) = plan.into_parts();
        assert_eq!(step.channel, Channel::Negative);
        assert_eq!(step.to_level, 0);
    }

    #[test]
    fn zero_to_zero_is_trivial_step() {
        let plan = plan(0, 0, 0);
        assert_eq!(plan.effective_ms(), ZERO_TARGET_FADE_MS);
        let (step, rest) = plan.into_parts();
        assert!(rest.is_none());
        assert_eq!(step.channel, Channel::Positive);
        assert_eq!((step.from_level, step.to_level), (0, 0));
        assert_eq!(step.settles_at, Duty::ZERO);
    }

    #[test]
    fn requested_time_wins_when_slower() {
        assert_eq!(plan(0, 20, 5000).effective_ms(), 5000);
        assert_eq!(plan(0, 20, 50).effective_ms(), 200);
    }

    #[test]
    fn effective_time_respects_minimum_rate() {
        for cur in (-100..=100).step_by(5) {
            for tgt in (-100..=100).step_by(5) {
                if tgt == 0 {
                    continue;
                }
                let plan = plan(cur, tgt, 0);
                let delta = duty(cur).delta(duty(tgt));
                assert!(plan.effective_ms() >= delta * MIN_MS_PER_PERCENT);
                if plan.is_crossing() {
                    let channels: Vec<_> = plan.steps().map(|s| s.channel).collect();
                    assert_ne!(channels[0], channels[1]);
                } else {
                    assert_eq!(plan.step_count(), 1);
                }
            }
        }
    }
}
