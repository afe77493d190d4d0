//! Loop error types.
//!
//! Only violated contracts surface here. Unknown class names, expired targets
//! and self-cancellation are absorbed by the loop and logged instead.

use tempo_curve::Time;
use thiserror::Error;

/// Event loop error type.
#[derive(Debug, Error)]
pub enum LoopError {
    /// The change/execute fixpoint did not settle.
    #[error("no fixpoint reached for t={max_time} after {iterations} iterations")]
    IterationLimit { max_time: Time, iterations: usize },

    /// Too many invocations within a single `reach_time` call.
    #[error("executed {executed} events while advancing to t={max_time}")]
    EventLimit { max_time: Time, executed: usize },

    /// A repeating class scheduled its next firing at or before the last one.
    #[error("event class {class} fired at t={fired_at} and asked to fire again at t={predicted}")]
    NonMonotonic {
        class: String,
        fired_at: Time,
        predicted: Time,
    },

    /// `reach_time` was asked to go back before committed history.
    #[error("cannot advance to t={requested}, already committed up to t={committed}")]
    TimeRegression { requested: Time, committed: Time },

    /// `reach_time` was called from inside an event invocation.
    #[error("reach_time called while event {active} is executing")]
    Reentrant { active: crate::EventHandle },
}

/// Result type for loop operations.
pub type LoopResult<T> = Result<T, LoopError>;
