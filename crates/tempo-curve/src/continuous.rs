//! Linearly interpolated curves.

use parking_lot::RwLock;

use crate::{KeyframeContainer, Time};

/// Values that can be blended between two keyframes.
pub trait Interpolate: Clone {
    /// Blend `self` toward `other` by `ratio` in `[0, 1]`.
    fn lerp(&self, other: &Self, ratio: f64) -> Self;
}

impl Interpolate for f64 {
    fn lerp(&self, other: &Self, ratio: f64) -> Self {
        self + (other - self) * ratio
    }
}

impl Interpolate for f32 {
    fn lerp(&self, other: &Self, ratio: f64) -> Self {
        self + (other - self) * ratio as f32
    }
}

impl Interpolate for i64 {
    fn lerp(&self, other: &Self, ratio: f64) -> Self {
        // Widened so the full i64 span does not overflow
        let from = i128::from(*self);
        let step = ((i128::from(*other) - from) as f64 * ratio).round() as i128;
        (from + step).clamp(i64::MIN.into(), i64::MAX.into()) as i64
    }
}

impl Interpolate for Time {
    fn lerp(&self, other: &Self, ratio: f64) -> Self {
        Time::from_raw(self.raw().lerp(&other.raw(), ratio))
    }
}

impl<A: Interpolate, B: Interpolate> Interpolate for (A, B) {
    fn lerp(&self, other: &Self, ratio: f64) -> Self {
        (self.0.lerp(&other.0, ratio), self.1.lerp(&other.1, ratio))
    }
}

/// A curve whose value moves linearly from one keyframe to the next.
///
/// After the last keyframe the value stays constant.
#[derive(Debug)]
pub struct Continuous<T> {
    frames: RwLock<KeyframeContainer<T>>,
}

impl<T: Interpolate> Continuous<T> {
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            frames: RwLock::new(KeyframeContainer::new(initial)),
        }
    }

    /// Interpolated value at `time`.
    #[must_use]
    pub fn get(&self, time: Time) -> T {
        let frames = self.frames.read();
        let index = frames.last_at(time);
        let from = frames.frame_at(time);

        match frames.next_after(index) {
            // The initial frame has no meaningful start time to blend from
            Some(to) if from.time != Time::MIN && to.time > from.time => {
                let span = (to.time - from.time).to_f64();
                let ratio = (time - from.time).to_f64() / span;
                from.value.lerp(&to.value, ratio)
            }
            _ => from.value.clone(),
        }
    }

    /// Set `value` at `time`, discarding keyframes after it.
    pub fn set_last(&self, time: Time, value: T) -> Time {
        let mut frames = self.frames.write();
        frames.erase_after(time);
        frames.insert(time, value);
        time
    }

    /// Insert `value` at `time`, keeping later keyframes.
    pub fn set_insert(&self, time: Time, value: T) -> Time {
        self.frames.write().insert(time, value);
        time
    }

    /// Time of the latest keyframe.
    #[must_use]
    pub fn last_change(&self) -> Time {
        self.frames.read().last().time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(units: i64) -> Time {
        Time::from_int(units)
    }

    #[test]
    fn test_lerp_across_full_range() {
        assert_eq!(i64::MIN.lerp(&i64::MAX, 0.0), i64::MIN);
        assert_eq!(i64::MIN.lerp(&i64::MAX, 1.0), i64::MAX);
        assert_eq!(i64::MAX.lerp(&i64::MIN, 1.0), i64::MIN);
        assert!(i64::MIN.lerp(&i64::MAX, 0.5).abs() < 2);

        assert_eq!(Time::MIN.lerp(&Time::MAX, 1.0), Time::MAX);
        assert_eq!(Time::MAX.lerp(&Time::MIN, 0.0), Time::MAX);
    }

    #[test]
    fn test_linear_interpolation() {
        let x = Continuous::new(0.0_f64);
        x.set_last(t(0), 0.0);
        x.set_last(t(10), 100.0);

        assert_eq!(x.get(t(0)), 0.0);
        assert_eq!(x.get(t(5)), 50.0);
        assert_eq!(x.get(t(10)), 100.0);
        assert_eq!(x.get(t(20)), 100.0);
    }

    #[test]
    fn test_before_first_keyframe_holds_initial() {
        let x = Continuous::new(3.0_f64);
        x.set_last(t(10), 13.0);

        assert_eq!(x.get(t(-5)), 3.0);
        assert_eq!(x.get(t(10)), 13.0);
    }

    #[test]
    fn test_tuple_interpolation() {
        let pos = Continuous::new((0.0_f64, 0.0_f64));
        pos.set_last(t(0), (0.0, 0.0));
        pos.set_last(t(4), (4.0, -8.0));

        assert_eq!(pos.get(t(1)), (1.0, -2.0));
    }

    #[test]
    fn test_set_last_rewrites_trajectory() {
        let x = Continuous::new(0_i64);
        x.set_last(t(0), 0);
        x.set_last(t(10), 10);
        x.set_last(t(5), 5);

        assert_eq!(x.get(t(8)), 5);
        assert_eq!(x.last_change(), t(5));
    }
}
