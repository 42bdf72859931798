use std::fmt;

use serde::Serialize;

use crate::error::MotorError;

/// Signed duty cycle in percent of full scale.
///
/// The sign selects the direction (which bridge input is driven) and the
/// magnitude the intensity. Always within -100..=100.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "i8")]
pub struct Duty(i8);

impl Duty {
    pub const MIN: Duty = Duty(-100);
    pub const MAX: Duty = Duty(100);
    pub const ZERO: Duty = Duty(0);

    /// Validate a raw percentage.
    pub fn new(percent: i64) -> Result<Self, MotorError> {
        if (Self::MIN.0 as i64..=Self::MAX.0 as i64).contains(&percent) {
            Ok(Self(percent as i8))
        } else {
            Err(MotorError::OutOfRange(percent))
        }
    }

    pub fn percent(self) -> i8 {
        self.0
    }

    /// Absolute intensity, 0..=100.
    pub fn magnitude(self) -> u8 {
        self.0.unsigned_abs()
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Distance between two duties in percent, 0..=200.
    pub fn delta(self, other: Duty) -> u32 {
        (i32::from(self.0) - i32::from(other.0)).unsigned_abs()
    }
}

impl From<Duty> for i8 {
    fn from(duty: Duty) -> Self {
        duty.0
    }
}

impl TryFrom<i64> for Duty {
    type Error = MotorError;

    fn try_from(percent: i64) -> Result<Self, Self::Error> {
        Self::new(percent)
    }
}

impl fmt::Display for Duty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bounds() {
        assert_eq!(Duty::new(-100).unwrap(), Duty::MIN);
        assert_eq!(Duty::new(100).unwrap(), Duty::MAX);
        assert_eq!(Duty::new(0).unwrap(), Duty::ZERO);
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(matches!(Duty::new(101), Err(MotorError::OutOfRange(101))));
        assert!(matches!(Duty::new(-101), Err(MotorError::OutOfRange(-101))));
        assert!(Duty::new(i64::MAX).is_err());
    }

    #[test]
    fn delta_and_magnitude() {
        let a = Duty::new(60).unwrap();
        let b = Duty::new(-40).unwrap();
        assert_eq!(a.delta(b), 100);
        assert_eq!(b.delta(a), 100);
        assert_eq!(b.magnitude(), 40);
        assert_eq!(Duty::MIN.delta(Duty::MAX), 200);
    }

    #[test]
    fn displays_signed_decimal() {
        assert_eq!(Duty::new(-25).unwrap().to_string(), "-25");
        assert_eq!(Duty::MAX.to_string(), "100");
    }
}
