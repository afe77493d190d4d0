//! Step curves.

use parking_lot::RwLock;

use crate::{KeyframeContainer, Time};

/// A curve that holds each keyframe's value until the next keyframe.
///
/// Writes go through `&self` so a `Discrete` can sit inside a target that is
/// shared with the event loop.
#[derive(Debug)]
pub struct Discrete<T> {
    frames: RwLock<KeyframeContainer<T>>,
}

impl<T: Clone> Discrete<T> {
    /// Create a curve with `initial` as its value for all time.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            frames: RwLock::new(KeyframeContainer::new(initial)),
        }
    }

    /// Value effective at `time`.
    #[must_use]
    pub fn get(&self, time: Time) -> T {
        self.frames.read().frame_at(time).value.clone()
    }

    /// Value effective at `time` together with the time it became effective.
    ///
    /// The initial value reports [`Time::MIN`].
    #[must_use]
    pub fn frame(&self, time: Time) -> (Time, T) {
        let frames = self.frames.read();
        let frame = frames.frame_at(time);
        (frame.time, frame.value.clone())
    }

    /// Time and value of the next keyframe strictly after `time`.
    #[must_use]
    pub fn next_frame(&self, time: Time) -> Option<(Time, T)> {
        let frames = self.frames.read();
        frames
            .next_after(frames.last_at(time))
            .map(|k| (k.time, k.value.clone()))
    }

    /// Set `value` at `time` and forget everything planned after it.
    ///
    /// Returns `time`, the point from which dependents must be re-evaluated.
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

    /// Number of keyframes, including the initial value.
    #[must_use]
    pub fn keyframe_count(&self) -> usize {
        self.frames.read().len()
    }
}
