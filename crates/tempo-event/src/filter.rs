//! Filters that subscribe new targets to event classes.

use std::fmt;
use std::sync::Arc;

use tempo_curve::Time;

use crate::{EventClass, EventTarget, ParamMap};

/// One event a filter wants created for a matching target.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSpawn {
    pub reference_time: Time,
    pub params: ParamMap,
}

impl EventSpawn {
    #[must_use]
    pub fn at(reference_time: Time) -> Self {
        Self {
            reference_time,
            params: ParamMap::new(),
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: ParamMap) -> Self {
        self.params = params;
        self
    }
}

type Predicate<S> = dyn Fn(&dyn EventTarget, &S) -> bool + Send + Sync;
type Factory<S> = dyn Fn(&dyn EventTarget, &S, Time) -> Vec<EventSpawn> + Send + Sync;

/// Decides which newly registered targets get events, and which ones.
///
/// Without a factory, a match creates a single event at the registration
/// reference time with no parameters.
///
/// # Example
///
/// ```ignore
/// // Every ball gets a collision check
/// event_loop.onfilter(
///     Arc::new(WallCollision),
///     EventFilter::new(|target, _| target.downcast_ref::<Ball>().is_some()),
/// );
/// ```
pub struct EventFilter<S> {
    predicate: Box<Predicate<S>>,
    factory: Option<Box<Factory<S>>>,
}

impl<S> EventFilter<S> {
    pub fn new<P>(predicate: P) -> Self
    where
        P: Fn(&dyn EventTarget, &S) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Box::new(predicate),
            factory: None,
        }
    }

    /// A filter matching every target.
    #[must_use]
    pub fn any() -> Self {
        Self::new(|_, _| true)
    }

    /// Produce the events for a match with `factory` instead of the default.
    ///
    /// The factory receives the registration reference time.
    #[must_use]
    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&dyn EventTarget, &S, Time) -> Vec<EventSpawn> + Send + Sync + 'static,
    {
        self.factory = Some(Box::new(factory));
        self
    }

    #[must_use]
    pub fn matches(&self, target: &dyn EventTarget, state: &S) -> bool {
        (self.predicate)(target, state)
    }

    /// Events to create for a matching target.
    #[must_use]
    pub fn spawns(
        &self,
        target: &dyn EventTarget,
        state: &S,
        reference_time: Time,
    ) -> Vec<EventSpawn> {
        match &self.factory {
            Some(factory) => factory(target, state, reference_time),
            None => vec![EventSpawn::at(reference_time)],
        }
    }
}

impl<S> fmt::Debug for EventFilter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventFilter")
            .field("factory", &self.factory.is_some())
            .finish_non_exhaustive()
    }
}

/// A filter bound to the class whose events it creates.
pub(crate) struct BoundFilter<S> {
    pub class: Arc<dyn EventClass<S>>,
    pub filter: EventFilter<S>,
}
