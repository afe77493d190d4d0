//! Event classes: shared, stateless reaction definitions.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tempo_curve::Time;

use crate::{EventTarget, Loop, ParamMap, TargetRef};

/// What happens to an event after it fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerType {
    /// Leaves the queue after one invocation.
    #[default]
    Once,
    /// Re-predicted from the time it fired. The next time must be strictly
    /// later; a prediction of "never" retires the event.
    Repeat,
}

/// A kind of reaction, shared by every event created from it.
///
/// Implementations hold no per-event state; everything an invocation needs
/// comes from the target, the simulation state and the event's parameters.
/// Only [`invoke`](EventClass::invoke) may have side effects.
///
/// # Example
///
/// ```ignore
/// struct Decay;
///
/// impl EventClass<World> for Decay {
///     fn id(&self) -> &str {
///         "decay"
///     }
///
///     fn predict_trigger_time(&self, _: &dyn EventTarget, _: &World, at: Time, _: &ParamMap) -> Option<Time> {
///         Some(at + Time::from_int(10))
///     }
///
///     fn invoke(&self, _: &mut Loop<World>, target: &TargetRef, world: &mut World, now: Time, _: &ParamMap) {
///         world.decayed.push((target.id(), now));
///     }
/// }
/// ```
pub trait EventClass<S>: Send + Sync {
    /// Stable name this class is registered under.
    fn id(&self) -> &str;

    fn trigger_type(&self) -> TriggerType {
        TriggerType::Once
    }

    /// Whether several pending events of this class may share a target.
    ///
    /// When false, creating a second event for the same target merges into
    /// the pending one.
    fn allows_repetition(&self) -> bool {
        false
    }

    /// Whether this class can act on `target` at all.
    fn applies_to(&self, target: &dyn EventTarget, state: &S) -> bool {
        let _ = (target, state);
        true
    }

    /// When the event should fire, given that its inputs are known as of
    /// `reference_time`. `None` means never.
    fn predict_trigger_time(
        &self,
        target: &dyn EventTarget,
        state: &S,
        reference_time: Time,
        params: &ParamMap,
    ) -> Option<Time>;

    /// Apply the reaction at `time`.
    ///
    /// May write curves, create events and record changes through `event_loop`.
    /// Recorded changes are handled in the next round of the loop, never
    /// recursively.
    fn invoke(
        &self,
        event_loop: &mut Loop<S>,
        target: &TargetRef,
        state: &mut S,
        time: Time,
        params: &ParamMap,
    );
}

type PredictFn<S> = dyn Fn(&dyn EventTarget, &S, Time, &ParamMap) -> Option<Time> + Send + Sync;
type InvokeFn<S> = dyn Fn(&mut Loop<S>, &TargetRef, &mut S, Time, &ParamMap) + Send + Sync;

static NEXT_AD_HOC_ID: AtomicU64 = AtomicU64::new(0);

/// A closure-backed class for one-off reactions.
///
/// Every instance gets a unique generated id, so it never collides with
/// registered classes or with other ad-hoc classes.
pub struct AdHocClass<S> {
    id: String,
    trigger_type: TriggerType,
    predict: Box<PredictFn<S>>,
    invoke: Box<InvokeFn<S>>,
}

impl<S> AdHocClass<S> {
    pub fn new<P, I>(predict: P, invoke: I) -> Self
    where
        P: Fn(&dyn EventTarget, &S, Time, &ParamMap) -> Option<Time> + Send + Sync + 'static,
        I: Fn(&mut Loop<S>, &TargetRef, &mut S, Time, &ParamMap) + Send + Sync + 'static,
    {
        let n = NEXT_AD_HOC_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("ad-hoc-{n}"),
            trigger_type: TriggerType::Once,
            predict: Box::new(predict),
            invoke: Box::new(invoke),
        }
    }

    /// Make the class repeat instead of firing once.
    #[must_use]
    pub fn repeating(mut self) -> Self {
        self.trigger_type = TriggerType::Repeat;
        self
    }
}

impl<S> EventClass<S> for AdHocClass<S> {
    fn id(&self) -> &str {
        &self.id
    }

    fn trigger_type(&self) -> TriggerType {
        self.trigger_type
    }

    fn predict_trigger_time(
        &self,
        target: &dyn EventTarget,
        state: &S,
        reference_time: Time,
        params: &ParamMap,
    ) -> Option<Time> {
        (self.predict)(target, state, reference_time, params)
    }

    fn invoke(
        &self,
        event_loop: &mut Loop<S>,
        target: &TargetRef,
        state: &mut S,
        time: Time,
        params: &ParamMap,
    ) {
        (self.invoke)(event_loop, target, state, time, params);
    }
}

impl<S> fmt::Debug for AdHocClass<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdHocClass")
            .field("id", &self.id)
            .field("trigger_type", &self.trigger_type)
            .finish_non_exhaustive()
    }
}
