//! Loop configuration.

use tracing::warn;

/// Default cap on change/execute rounds per `reach_time`.
pub const DEFAULT_MAX_ITERATIONS: usize = 10_000;

/// Default cap on invocations per `reach_time`.
pub const DEFAULT_MAX_EVENTS: usize = 1_000_000;

/// Circuit breakers for the fixpoint loop.
///
/// A class that keeps rescheduling itself at or before the current time makes
/// `reach_time` spin forever. These bounds turn that into a
/// [`LoopError`](crate::LoopError) instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    /// Maximum number of `update_changes` + `execute_events` rounds.
    pub max_iterations: usize,
    /// Maximum number of events executed.
    pub max_events: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_events: DEFAULT_MAX_EVENTS,
        }
    }
}

impl LoopConfig {
    /// Read limits from `TEMPO_MAX_ITERATIONS` and `TEMPO_MAX_EVENTS`.
    ///
    /// Unset or unparsable variables fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str, default: usize| {
            let Some(raw) = lookup(key) else {
                return default;
            };
            match raw.trim().parse::<usize>() {
                Ok(v) if v > 0 => v,
                _ => {
                    warn!("Ignoring {key}={raw:?}, using default {default}");
                    default
                }
            }
        };

        Self {
            max_iterations: read("TEMPO_MAX_ITERATIONS", DEFAULT_MAX_ITERATIONS),
            max_events: read("TEMPO_MAX_EVENTS", DEFAULT_MAX_EVENTS),
        }
    }

    /// Override the iteration cap.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Override the event cap.
    #[must_use]
    pub const fn with_max_events(mut self, max_events: usize) -> Self {
        self.max_events = max_events;
        self
    }
}
