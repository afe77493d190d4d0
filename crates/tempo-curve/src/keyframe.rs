//! Time-sorted keyframe storage shared by all curve kinds.

use crate::Time;

/// A value that becomes effective at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyframe<T> {
    pub time: Time,
    pub value: T,
}

impl<T> Keyframe<T> {
    #[must_use]
    pub const fn new(time: Time, value: T) -> Self {
        Self { time, value }
    }
}

/// Keyframes ordered by time.
///
/// The container is never empty: the initial value sits at [`Time::MIN`], so
/// every lookup has a frame at or before the requested time. Keyframes that
/// share a time keep their insertion order.
#[derive(Debug, Clone)]
pub struct KeyframeContainer<T> {
    frames: Vec<Keyframe<T>>,
}

impl<T> KeyframeContainer<T> {
    /// Create a container holding `initial` since the beginning of time.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            frames: vec![Keyframe::new(Time::MIN, initial)],
        }
    }

    /// Index of the last keyframe at or before `time`.
    #[must_use]
    pub fn last_at(&self, time: Time) -> usize {
        // frames[0] is at Time::MIN, so the partition point is at least 1
        self.frames.partition_point(|k| k.time <= time) - 1
    }

    /// Keyframe at or before `time`.
    #[must_use]
    pub fn frame_at(&self, time: Time) -> &Keyframe<T> {
        &self.frames[self.last_at(time)]
    }

    /// Keyframe directly following `index`, if any.
    #[must_use]
    pub fn next_after(&self, index: usize) -> Option<&Keyframe<T>> {
        self.frames.get(index + 1)
    }

    /// Insert a keyframe, after any existing keyframes at the same time.
    ///
    /// Returns the index it landed on.
    pub fn insert(&mut self, time: Time, value: T) -> usize {
        let at = self.frames.partition_point(|k| k.time <= time);
        self.frames.insert(at, Keyframe::new(time, value));
        at
    }

    /// Drop every keyframe strictly after `time`.
    ///
    /// Returns the number of keyframes removed.
    pub fn erase_after(&mut self, time: Time) -> usize {
        let keep = self.frames.partition_point(|k| k.time <= time);
        let removed = self.frames.len() - keep;
        self.frames.truncate(keep);
        removed
    }

    /// The latest keyframe.
    #[must_use]
    pub fn last(&self) -> &Keyframe<T> {
        // never empty, see `new`
        &self.frames[self.frames.len() - 1]
    }

    /// Number of keyframes, including the initial one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Iterate keyframes in time order.
    pub fn iter(&self) -> impl Iterator<Item = &Keyframe<T>> + '_ {
        self.frames.iter()
    }
}
