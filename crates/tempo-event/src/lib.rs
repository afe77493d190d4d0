#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::too_many_arguments)]

//! Tempo Event System
//!
//! Incremental, time-ordered event scheduling for simulations whose state is
//! made of curves rather than snapshots.
//!
//! # Core Concept: Predictions, not ticks
//!
//! An event is a prediction: "class C will act on target X at time t". When a
//! curve the prediction was based on changes, the event is invalidated and
//! re-predicted instead of being re-run:
//!
//! - [`EventClass`]: shared reaction kind (predict + invoke)
//! - [`EventTarget`]: externally owned entity, tracked weakly by id
//! - [`EventFilter`]: subscribes newly registered targets to a class
//! - [`EventQueue`]: pending events by trigger time, plus pending changes
//! - [`Loop`]: owns all of the above and advances time
//!
//! # Scheduling
//!
//! - Events fire in trigger-time order, ties in creation order
//! - Changes recorded during an invocation are applied in the next round
//! - `reach_time(T)` repeats rounds until nothing at or before `T` is left
//!
//! # Example
//!
//! ```ignore
//! let mut event_loop = Loop::<World>::new();
//! event_loop.add_event_class(Arc::new(Decay));
//!
//! let ball: TargetRef = Arc::new(Ball::new());
//! event_loop.create_event("decay", &ball, &world, Time::ZERO, ParamMap::new());
//!
//! event_loop.reach_time(Time::from_int(5), &mut world)?;  // nothing due yet
//! event_loop.reach_time(Time::from_int(15), &mut world)?; // decay fires at t=10
//! ```

mod class;
mod config;
mod error;
mod event;
mod event_loop;
mod filter;
mod param;
mod queue;
mod target;

pub use class::{AdHocClass, EventClass, TriggerType};
pub use config::{DEFAULT_MAX_EVENTS, DEFAULT_MAX_ITERATIONS, LoopConfig};
pub use error::{LoopError, LoopResult};
pub use event::{Event, EventHandle, Generation};
pub use event_loop::Loop;
pub use filter::{EventFilter, EventSpawn};
pub use param::{ParamMap, ParamValue};
pub use queue::EventQueue;
pub use target::{CurveIndex, EventTarget, TargetId, TargetRef};
pub use tempo_curve::Time;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        AdHocClass, EventClass, EventFilter, EventHandle, EventSpawn, EventTarget, Loop,
        LoopConfig, LoopError, ParamMap, TargetId, TargetRef, Time, TriggerType,
    };
}
