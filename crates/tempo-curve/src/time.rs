//! Logical simulation time.
//!
//! Time is a fixed-point number so that ordering is exact and keys compare
//! without the NaN pitfalls of floats.

use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Number of fractional bits in the fixed-point representation.
const FRAC_BITS: u32 = 16;

/// Raw value of one whole time unit.
const ONE: i64 = 1 << FRAC_BITS;

/// A point on the simulation clock.
///
/// The clock is virtual: it only moves when the caller advances the event
/// loop. Integer times are exact, fractions resolve to 1/65536.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Time(i64);

impl Time {
    /// The origin of simulation time.
    pub const ZERO: Time = Time(0);

    /// Earliest representable time.
    pub const MIN: Time = Time(i64::MIN);

    /// Latest representable time.
    pub const MAX: Time = Time(i64::MAX);

    /// Create a time from a whole number of units.
    #[must_use]
    pub const fn from_int(units: i64) -> Self {
        Self(units.saturating_mul(ONE))
    }

    /// Create a time from a float, rounding to the nearest representable step.
    #[must_use]
    pub fn from_f64(units: f64) -> Self {
        Self((units * ONE as f64).round() as i64)
    }

    /// Create a time from its raw fixed-point bits.
    #[must_use]
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// Get the raw fixed-point bits.
    #[must_use]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Convert to a float (lossy for very large values).
    #[must_use]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / ONE as f64
    }

    /// Whole units, rounded toward negative infinity.
    #[must_use]
    pub const fn floor(self) -> i64 {
        self.0 >> FRAC_BITS
    }

    /// Saturating addition.
    #[must_use]
    pub const fn saturating_add(self, rhs: Time) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// Saturating subtraction.
    #[must_use]
    pub const fn saturating_sub(self, rhs: Time) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Add for Time {
    type Output = Time;

    fn add(self, rhs: Time) -> Time {
        self.saturating_add(rhs)
    }
}

impl AddAssign for Time {
    fn add_assign(&mut self, rhs: Time) {
        *self = *self + rhs;
    }
}

impl Sub for Time {
    type Output = Time;

    fn sub(self, rhs: Time) -> Time {
        self.saturating_sub(rhs)
    }
}

impl SubAssign for Time {
    fn sub_assign(&mut self, rhs: Time) {
        *self = *self - rhs;
    }
}

impl From<i32> for Time {
    fn from(units: i32) -> Self {
        Self::from_int(i64::from(units))
    }
}

impl fmt::Debug for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Time::MIN => write!(f, "t=-inf"),
            Time::MAX => write!(f, "t=+inf"),
            t => write!(f, "t={}", t.to_f64()),
        }
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Time::MIN => write!(f, "-inf"),
            Time::MAX => write!(f, "+inf"),
            t => write!(f, "{}", t.to_f64()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_times_are_exact() {
        let t = Time::from_int(10);
        assert_eq!(t.floor(), 10);
        assert_eq!(t.to_f64(), 10.0);
        assert_eq!(Time::from(10), t);
    }

    #[test]
    fn test_fractional_ordering() {
        let a = Time::from_f64(2.25);
        let b = Time::from_f64(2.5);
        assert!(a < b);
        assert_eq!(a.floor(), 2);
        assert_eq!((b - a).to_f64(), 0.25);
    }

    #[test]
    fn test_arithmetic_saturates() {
        assert_eq!(Time::MAX + Time::from_int(1), Time::MAX);
        assert_eq!(Time::MIN - Time::from_int(1), Time::MIN);
    }

    #[test]
    fn test_display() {
        assert_eq!(Time::from_int(3).to_string(), "3");
        assert_eq!(Time::from_f64(1.5).to_string(), "1.5");
        assert_eq!(Time::MAX.to_string(), "+inf");
    }
}
