//! The event loop: registration, event creation and the change/execute
//! fixpoint that advances simulation time.

use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use smallvec::SmallVec;
use tempo_curve::Time;
use tracing::{debug, error, trace};

use crate::event::{Event, EventHandle};
use crate::filter::BoundFilter;
use crate::{
    CurveIndex, EventClass, EventFilter, EventQueue, LoopConfig, LoopError, LoopResult, ParamMap,
    TargetId, TargetRef, TriggerType,
};

/// Owns every piece of scheduler bookkeeping.
///
/// Targets and the simulation state `S` are owned by the caller; the loop
/// only references targets weakly and receives the state on every call.
///
/// # Advancing time
///
/// ```text
/// reach_time(T):
///   loop
///     update_changes      re-derive trigger times of invalidated events
///     execute_events(T)   run everything due at or before T, in time order
///   until nothing ran and no change is pending
/// ```
///
/// An invocation that records changes does not recurse: the changes wait for
/// the next `update_changes` round, which may pull events back to the current
/// time or earlier than others already queued.
pub struct Loop<S> {
    config: LoopConfig,
    classes: HashMap<String, Arc<dyn EventClass<S>>>,
    /// Applied to new targets in registration order
    filters: Vec<Arc<BoundFilter<S>>>,
    queue: EventQueue<S>,
    /// Set only while that event's invocation runs
    active_event: Option<EventHandle>,
    curve_index: CurveIndex,
    /// Committed time; nothing may be scheduled before it
    now: Time,
    executed_this_reach: usize,
}

impl<S> Default for Loop<S> {
    fn default() -> Self {
        Self::with_config(LoopConfig::default())
    }
}

impl<S> Loop<S> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: LoopConfig) -> Self {
        Self {
            config,
            classes: HashMap::new(),
            filters: Vec::new(),
            queue: EventQueue::new(),
            active_event: None,
            curve_index: CurveIndex::new(),
            now: Time::MIN,
            executed_this_reach: 0,
        }
    }

    #[must_use]
    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    // ==================== Classes ====================

    /// Register a class under its id.
    ///
    /// Replacing a class only affects events created afterwards; pending
    /// events keep the instance they were created with.
    pub fn add_event_class(
        &mut self,
        class: Arc<dyn EventClass<S>>,
    ) -> Option<Arc<dyn EventClass<S>>> {
        let id = class.id().to_owned();
        let previous = self.classes.insert(id.clone(), class);
        if previous.is_some() {
            debug!("Replaced event class {id}");
        } else {
            debug!("Registered event class {id}");
        }
        previous
    }

    #[must_use]
    pub fn event_class(&self, name: &str) -> Option<&Arc<dyn EventClass<S>>> {
        self.classes.get(name)
    }

    // ==================== Event creation ====================

    /// Create an event of the class registered as `name`.
    ///
    /// Returns [`EventHandle::DANGLING`] if no such class is registered.
    pub fn create_event(
        &mut self,
        name: &str,
        target: &TargetRef,
        state: &S,
        reference_time: Time,
        params: ParamMap,
    ) -> EventHandle {
        let Some(class) = self.classes.get(name).cloned() else {
            debug!("Cannot create event: unknown event class {name}");
            return EventHandle::DANGLING;
        };
        self.create_event_with_class(class, target, state, reference_time, params)
    }

    /// Create an event from a class instance, registered or not.
    ///
    /// The class predicts the trigger time from `reference_time`. If the
    /// class does not allow repetition and an event of the same class id is
    /// already pending for `target`, that event absorbs `params`, is
    /// re-predicted from `reference_time`, and its handle is returned.
    pub fn create_event_with_class(
        &mut self,
        class: Arc<dyn EventClass<S>>,
        target: &TargetRef,
        state: &S,
        reference_time: Time,
        params: ParamMap,
    ) -> EventHandle {
        if !class.applies_to(&**target, state) {
            debug!(
                "Event class {} does not apply to target {}",
                class.id(),
                target.id()
            );
            return EventHandle::DANGLING;
        }

        self.curve_index.insert(target);

        if !class.allows_repetition() {
            if let Some(existing) = self.queue.find(class.id(), target.id()) {
                return self.merge_into(existing, target, state, reference_time, params);
            }
        }

        let predicted = class.predict_trigger_time(&**target, state, reference_time, &params);
        let time = self.clamp(predicted, self.now, class.id());
        let class_id = class.id().to_owned();

        let handle = self
            .queue
            .insert(Event::new(class, target, params, time));
        debug!(
            "Created event {handle} ({class_id}) for target {} at {time:?}",
            target.id()
        );
        handle
    }

    fn merge_into(
        &mut self,
        existing: EventHandle,
        target: &TargetRef,
        state: &S,
        reference_time: Time,
        params: ParamMap,
    ) -> EventHandle {
        let Some(event) = self.queue.get_mut(existing) else {
            return EventHandle::DANGLING;
        };
        event.params_mut().merge(params);

        if self.active_event == Some(existing) {
            // Still executing: re-derive once the invocation is over
            self.queue.add_change(existing, reference_time);
            trace!("Merged into active event {existing}, deferred to t={reference_time}");
            return existing;
        }

        let Some(event) = self.queue.get(existing) else {
            return EventHandle::DANGLING;
        };
        let class = Arc::clone(event.class());
        let predicted =
            class.predict_trigger_time(&**target, state, reference_time, event.params());
        let time = self.clamp(predicted, self.now, class.id());
        self.queue.reschedule(existing, time);

        debug!(
            "Merged into pending event {existing} ({}) for target {}, now at {time:?}",
            class.id(),
            target.id()
        );
        existing
    }

    /// Keep predictions out of committed history.
    fn clamp(&self, predicted: Option<Time>, floor: Time, class: &str) -> Option<Time> {
        let floor = floor.max(self.now);
        predicted.map(|t| {
            if t < floor {
                trace!("Clamped {class} from t={t} to t={floor}");
                floor
            } else {
                t
            }
        })
    }

    // ==================== Filters and targets ====================

    /// Subscribe future targets matching `filter` to `class`.
    pub fn onfilter(&mut self, class: Arc<dyn EventClass<S>>, filter: EventFilter<S>) {
        debug!("Added filter for event class {}", class.id());
        self.filters.push(Arc::new(BoundFilter { class, filter }));
    }

    /// [`onfilter`](Self::onfilter) with a default-constructed class.
    pub fn onfilter_default<C>(&mut self, filter: EventFilter<S>)
    where
        C: EventClass<S> + Default + 'static,
    {
        self.onfilter(Arc::new(C::default()), filter);
    }

    /// Track `target` and create events for every filter it matches.
    ///
    /// Filters run in registration order, so on equal trigger times the
    /// first registered filter's event fires first. Returns the handles of
    /// the created (or merged into) events, without duplicates.
    pub fn register_object(
        &mut self,
        target: &TargetRef,
        state: &S,
        reference_time: Time,
    ) -> Vec<EventHandle> {
        if !self.curve_index.insert(target) {
            debug!("Target {} registered again", target.id());
        }

        let filters = self.filters.clone();
        let mut created = Vec::new();
        for bound in &filters {
            if !bound.filter.matches(&**target, state) {
                continue;
            }
            for spawn in bound.filter.spawns(&**target, state, reference_time) {
                let handle = self.create_event_with_class(
                    Arc::clone(&bound.class),
                    target,
                    state,
                    spawn.reference_time,
                    spawn.params,
                );
                if !handle.is_dangling() && !created.contains(&handle) {
                    created.push(handle);
                }
            }
        }

        trace!(
            "Registered target {} with {} events",
            target.id(),
            created.len()
        );
        created
    }

    /// Live target registered under `id`.
    #[must_use]
    pub fn target(&self, id: TargetId) -> Option<TargetRef> {
        self.curve_index.get(id)
    }

    /// Forget expired targets and drop their events.
    ///
    /// Returns the number of events dropped.
    pub fn prune_targets(&mut self) -> usize {
        let mut dropped = 0;
        for id in self.curve_index.prune() {
            let n = self.queue.remove_target(id);
            debug!("Target {id} is gone, dropped {n} events");
            dropped += n;
        }
        dropped
    }

    // ==================== Changes ====================

    /// Record that `event` depends on something that changed at `changes_at`.
    ///
    /// Nothing is rescheduled until the next `update_changes` round. Several
    /// changes to one event collapse into the earliest. Returns `false` if the
    /// handle is expired.
    pub fn create_change<T: fmt::Debug + ?Sized>(
        &mut self,
        event: EventHandle,
        changes_at: Time,
        new_value: &T,
    ) -> bool {
        let Some(pending) = self.queue.get(event) else {
            debug!("Ignoring change at t={changes_at} for expired event {event:?}");
            return false;
        };
        debug!(
            "Loop: registering change of {} at t={changes_at} to {new_value:?}",
            pending.class_id()
        );
        self.queue.add_change(event, changes_at)
    }

    /// Invalidate every event bound to `target` from `changes_at` on.
    ///
    /// The active event is skipped; it re-arms itself only through
    /// [`create_change`](Self::create_change). If the target has expired, its
    /// events are dropped instead. Returns the number of events invalidated.
    pub fn notify_change(&mut self, target: TargetId, changes_at: Time) -> usize {
        if self.curve_index.resolve(target).is_none() {
            let dropped = self.queue.remove_target(target);
            debug!("Change on missing target {target}, dropped {dropped} events");
            return 0;
        }

        let handles: SmallVec<[EventHandle; 4]> =
            SmallVec::from_slice(self.queue.events_for_target(target));
        let invalidated = handles
            .into_iter()
            .filter(|&h| Some(h) != self.active_event)
            .filter(|&h| self.queue.add_change(h, changes_at))
            .count();

        trace!("Target {target} changed at t={changes_at}, invalidated {invalidated} events");
        invalidated
    }

    /// Re-derive the trigger time of every event with a recorded change.
    ///
    /// Only reads the state. Events whose target has expired are dropped.
    /// Returns the number of events whose trigger time moved.
    pub fn update_changes(&mut self, state: &S) -> usize {
        let mut moved = 0;

        for (handle, changes_at) in self.queue.take_changes() {
            let Some(event) = self.queue.get(handle) else {
                debug!("Skipping change for expired event {handle:?}");
                continue;
            };
            let Some(target) = event.target() else {
                debug!(
                    "Dropping event {handle} ({}): target {} is gone",
                    event.class_id(),
                    event.target_id()
                );
                self.queue.remove(handle);
                continue;
            };

            let class = Arc::clone(event.class());
            let predicted =
                class.predict_trigger_time(&*target, state, changes_at, event.params());
            let time = self.clamp(predicted, changes_at, class.id());

            if self.queue.reschedule(handle, time) {
                trace!("Rescheduled {handle} ({}) to {time:?}", class.id());
                moved += 1;
            }
        }

        moved
    }

    // ==================== Execution ====================

    /// Run every event due at or before `max_time`, earliest first.
    ///
    /// Equal trigger times run in creation order. Returns the number of
    /// invocations.
    pub fn execute_events(&mut self, max_time: Time, state: &mut S) -> LoopResult<usize> {
        if let Some(active) = self.active_event {
            return Err(LoopError::Reentrant { active });
        }

        let mut executed = 0;

        while let Some((handle, time)) = self.queue.pop_due(max_time) {
            let Some(event) = self.queue.get(handle) else {
                continue;
            };
            let Some(target) = event.target() else {
                debug!(
                    "Dropping event {handle} ({}): target {} is gone",
                    event.class_id(),
                    event.target_id()
                );
                self.queue.remove(handle);
                continue;
            };
            let class = Arc::clone(event.class());
            let params = event.params().clone();

            if self.executed_this_reach >= self.config.max_events {
                self.queue.reschedule(handle, Some(time));
                error!(
                    "Executed {} events while advancing to t={max_time}, giving up at {} (t={time})",
                    self.executed_this_reach,
                    class.id()
                );
                return Err(LoopError::EventLimit {
                    max_time,
                    executed: self.executed_this_reach,
                });
            }

            trace!(
                "Executing {handle} ({}) on target {} at t={time}",
                class.id(),
                target.id()
            );
            // Firing supersedes invalidations recorded earlier in this pass
            if let Some(stale) = self.queue.clear_change(handle) {
                trace!("Dropped change at t={stale} for {handle}, it fires now");
            }

            self.now = self.now.max(time);
            self.active_event = Some(handle);
            class.invoke(self, &target, state, time, &params);
            self.active_event = None;

            executed += 1;
            self.executed_this_reach += 1;

            self.settle(handle, class.as_ref(), &target, state, time)?;
        }

        Ok(executed)
    }

    /// Decide what happens to an event that just fired.
    fn settle(
        &mut self,
        handle: EventHandle,
        class: &dyn EventClass<S>,
        target: &TargetRef,
        state: &S,
        fired_at: Time,
    ) -> LoopResult<()> {
        if !self.queue.contains(handle) {
            return Ok(());
        }

        if self.queue.pending_change(handle).is_some() {
            // Re-armed during its own invocation
            self.queue.reschedule(handle, None);
            return Ok(());
        }

        match class.trigger_type() {
            TriggerType::Once => {
                self.queue.remove(handle);
            }
            TriggerType::Repeat => {
                let predicted = self.queue.get(handle).and_then(|event| {
                    class.predict_trigger_time(&**target, state, fired_at, event.params())
                });
                match predicted {
                    None => {
                        debug!("Repeating event {handle} ({}) retired", class.id());
                        self.queue.remove(handle);
                    }
                    Some(next) if next <= fired_at => {
                        self.queue.remove(handle);
                        error!(
                            "Event class {} fired at t={fired_at} and asked to fire again at t={next}",
                            class.id()
                        );
                        return Err(LoopError::NonMonotonic {
                            class: class.id().to_owned(),
                            fired_at,
                            predicted: next,
                        });
                    }
                    Some(next) => {
                        self.queue.reschedule(handle, Some(next));
                    }
                }
            }
        }

        Ok(())
    }

    /// Advance the simulation to `max_time`.
    ///
    /// Alternates `update_changes` and `execute_events` until neither has
    /// work left at or before `max_time`. Afterwards nothing due at or before
    /// `max_time` is pending and `max_time` is committed. Returns the number
    /// of events executed.
    pub fn reach_time(&mut self, max_time: Time, state: &mut S) -> LoopResult<usize> {
        if let Some(active) = self.active_event {
            error!("reach_time(t={max_time}) called while event {active} is executing");
            return Err(LoopError::Reentrant { active });
        }
        if max_time < self.now {
            error!(
                "reach_time(t={max_time}) would go back before committed t={}",
                self.now
            );
            return Err(LoopError::TimeRegression {
                requested: max_time,
                committed: self.now,
            });
        }

        self.executed_this_reach = 0;
        let mut total = 0;
        let mut iterations = 0;

        loop {
            if iterations == self.config.max_iterations {
                error!("No fixpoint reached for t={max_time} after {iterations} iterations");
                return Err(LoopError::IterationLimit {
                    max_time,
                    iterations,
                });
            }
            iterations += 1;

            self.update_changes(state);
            let executed = self.execute_events(max_time, state)?;
            total += executed;

            if executed == 0 && !self.queue.has_changes() {
                break;
            }
        }

        self.now = max_time;
        trace!("Reached t={max_time}: {total} events in {iterations} iterations");
        Ok(total)
    }

    // ==================== Queries ====================

    /// Cancel a pending event.
    ///
    /// Refused for the event currently executing. Returns `true` if an event
    /// was removed.
    pub fn cancel(&mut self, event: EventHandle) -> bool {
        if self.active_event == Some(event) {
            debug!("Event {event} tried to cancel itself, ignored");
            return false;
        }
        match self.queue.remove(event) {
            Some(removed) => {
                debug!("Canceled event {event} ({})", removed.class_id());
                true
            }
            None => false,
        }
    }

    /// Is `event` still known to the loop (scheduled, dormant or executing)?
    #[must_use]
    pub fn is_pending(&self, event: EventHandle) -> bool {
        self.queue.contains(event)
    }

    #[must_use]
    pub fn event(&self, handle: EventHandle) -> Option<&Event<S>> {
        self.queue.get(handle)
    }

    #[must_use]
    pub fn queue(&self) -> &EventQueue<S> {
        &self.queue
    }

    #[must_use]
    pub fn active_event(&self) -> Option<EventHandle> {
        self.active_event
    }

    /// Committed simulation time.
    #[must_use]
    pub fn now(&self) -> Time {
        self.now
    }
}

impl<S> fmt::Debug for Loop<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loop")
            .field("now", &self.now)
            .field("classes", &self.classes.len())
            .field("filters", &self.filters.len())
            .field("queue", &self.queue)
            .field("targets", &self.curve_index)
            .field("active_event", &self.active_event)
            .finish()
    }
}
