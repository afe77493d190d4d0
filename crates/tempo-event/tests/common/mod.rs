//! Shared fixtures for the event loop integration tests.

#![allow(dead_code)]

use std::any::Any;
use std::sync::Arc;

use tempo_curve::Discrete;
use tempo_event::prelude::*;

// ============================================================================
// State and targets
// ============================================================================

/// Simulation state: records every invocation.
#[derive(Default)]
pub struct World {
    pub log: Vec<(String, TargetId, Time)>,
    pub handles: Vec<EventHandle>,
    pub flags: Vec<bool>,
}

impl World {
    pub fn fired(&self) -> Vec<(&str, Time)> {
        self.log.iter().map(|(c, _, t)| (c.as_str(), *t)).collect()
    }

    pub fn times(&self) -> Vec<Time> {
        self.log.iter().map(|(_, _, t)| *t).collect()
    }
}

/// A simulated object with a curve that says when it wants to react.
pub struct Unit {
    id: TargetId,
    pub name: &'static str,
    pub due: Discrete<Option<Time>>,
}

impl Unit {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            id: TargetId::allocate(),
            name,
            due: Discrete::new(None),
        })
    }
}

impl EventTarget for Unit {
    fn id(&self) -> TargetId {
        self.id
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn unit(name: &'static str) -> TargetRef {
    Unit::new(name)
}

pub fn t(units: i64) -> Time {
    Time::from_int(units)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Event classes
// ============================================================================

/// Fires a fixed delay after its reference time and logs itself.
pub struct Fixed {
    pub id: &'static str,
    pub delay: i64,
    pub repetition: bool,
}

impl Fixed {
    pub fn new(id: &'static str, delay: i64) -> Arc<Self> {
        Arc::new(Self {
            id,
            delay,
            repetition: false,
        })
    }

    pub fn repeatable(id: &'static str, delay: i64) -> Arc<Self> {
        Arc::new(Self {
            id,
            delay,
            repetition: true,
        })
    }
}

impl EventClass<World> for Fixed {
    fn id(&self) -> &str {
        self.id
    }

    fn allows_repetition(&self) -> bool {
        self.repetition
    }

    fn predict_trigger_time(
        &self,
        _: &dyn EventTarget,
        _: &World,
        reference_time: Time,
        _: &ParamMap,
    ) -> Option<Time> {
        Some(reference_time + Time::from_int(self.delay))
    }

    fn invoke(
        &self,
        _: &mut Loop<World>,
        target: &TargetRef,
        world: &mut World,
        time: Time,
        _: &ParamMap,
    ) {
        world.log.push((self.id.to_owned(), target.id(), time));
    }
}

/// Fires whenever the target's `due` curve says so, as seen from the
/// reference time. Dormant while `due` is `None`.
#[derive(Default)]
pub struct FollowDue;

impl EventClass<World> for FollowDue {
    fn id(&self) -> &str {
        "follow"
    }

    fn applies_to(&self, target: &dyn EventTarget, _: &World) -> bool {
        target.downcast_ref::<Unit>().is_some()
    }

    fn predict_trigger_time(
        &self,
        target: &dyn EventTarget,
        _: &World,
        reference_time: Time,
        _: &ParamMap,
    ) -> Option<Time> {
        target.downcast_ref::<Unit>()?.due.get(reference_time)
    }

    fn invoke(
        &self,
        _: &mut Loop<World>,
        target: &TargetRef,
        world: &mut World,
        time: Time,
        _: &ParamMap,
    ) {
        world.log.push(("follow".to_owned(), target.id(), time));
    }
}
