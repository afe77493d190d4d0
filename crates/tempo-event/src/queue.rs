//! Time-ordered event queue with pending changes.

use std::hash::{Hash, Hasher};
use std::collections::BTreeSet;

use hashbrown::{Equivalent, HashMap};
use smallvec::SmallVec;
use tempo_curve::Time;

use crate::TargetId;
use crate::event::{Event, EventHandle, HandleAllocator};

/// Position of a scheduled event: trigger time, then creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    time: Time,
    seq: u64,
    handle: EventHandle,
}

/// Borrowed form of a `by_pair` key, so lookups need no `String`.
///
/// Hashes exactly like `(String, TargetId)`.
struct PairKey<'a> {
    class: &'a str,
    target: TargetId,
}

impl Hash for PairKey<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.class.hash(state);
        self.target.hash(state);
    }
}

impl Equivalent<(String, TargetId)> for PairKey<'_> {
    fn equivalent(&self, key: &(String, TargetId)) -> bool {
        self.class == key.0 && self.target == key.1
    }
}

/// All events known to the loop.
///
/// Events live in a handle-keyed map. The ones with a trigger time are also
/// in a time-ordered index; dormant events (predicted "never") and the event
/// currently executing are not. Changes are kept apart and only applied when
/// the loop drains them.
pub struct EventQueue<S> {
    handles: HandleAllocator,
    events: HashMap<EventHandle, Event<S>>,
    order: BTreeSet<QueueKey>,
    /// (class id, target) → events, for merging
    by_pair: HashMap<(String, TargetId), SmallVec<[EventHandle; 1]>>,
    by_target: HashMap<TargetId, SmallVec<[EventHandle; 4]>>,
    /// Earliest recorded invalidation per event
    changes: HashMap<EventHandle, Time>,
    next_seq: u64,
}

impl<S> Default for EventQueue<S> {
    fn default() -> Self {
        Self {
            handles: HandleAllocator::new(),
            events: HashMap::new(),
            order: BTreeSet::new(),
            by_pair: HashMap::new(),
            by_target: HashMap::new(),
            changes: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<S> EventQueue<S> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `event` and schedule it at its current time.
    pub(crate) fn insert(&mut self, mut event: Event<S>) -> EventHandle {
        let handle = self.handles.allocate();
        let seq = self.next_seq;
        self.next_seq += 1;
        event.bind(handle, seq);

        if let Some(time) = event.time() {
            self.order.insert(QueueKey { time, seq, handle });
        }
        self.by_pair
            .entry((event.class_id().to_owned(), event.target_id()))
            .or_default()
            .push(handle);
        self.by_target
            .entry(event.target_id())
            .or_default()
            .push(handle);
        self.events.insert(handle, event);

        handle
    }

    #[must_use]
    pub fn get(&self, handle: EventHandle) -> Option<&Event<S>> {
        self.events.get(&handle)
    }

    pub(crate) fn get_mut(&mut self, handle: EventHandle) -> Option<&mut Event<S>> {
        self.events.get_mut(&handle)
    }

    /// Is `handle` a live event (scheduled, dormant or executing)?
    #[must_use]
    pub fn contains(&self, handle: EventHandle) -> bool {
        self.handles.is_alive(handle) && self.events.contains_key(&handle)
    }

    /// First live event of `class_id` on `target`.
    #[must_use]
    pub fn find(&self, class_id: &str, target: TargetId) -> Option<EventHandle> {
        self.by_pair
            .get(&PairKey {
                class: class_id,
                target,
            })
            .and_then(|handles| handles.first().copied())
    }

    /// Events bound to `target`, in creation order.
    #[must_use]
    pub fn events_for_target(&self, target: TargetId) -> &[EventHandle] {
        match self.by_target.get(&target) {
            Some(handles) => handles.as_slice(),
            None => &[],
        }
    }

    /// Move `handle` to `time` (or make it dormant with `None`).
    ///
    /// Returns `true` if the trigger time changed.
    pub(crate) fn reschedule(&mut self, handle: EventHandle, time: Option<Time>) -> bool {
        let Some(event) = self.events.get_mut(&handle) else {
            return false;
        };

        let old = event.time();
        let seq = event.seq();
        event.set_time(time);

        if let Some(t) = old {
            self.order.remove(&QueueKey {
                time: t,
                seq,
                handle,
            });
        }
        if let Some(t) = time {
            self.order.insert(QueueKey { time: t, seq, handle });
        }

        old != time
    }

    /// Pop the earliest event due at or before `max_time`.
    ///
    /// The event stays in the queue, unscheduled, so that it can still be
    /// addressed while it executes.
    pub(crate) fn pop_due(&mut self, max_time: Time) -> Option<(EventHandle, Time)> {
        let first = self.order.first()?;
        if first.time > max_time {
            return None;
        }
        let key = self.order.pop_first()?;
        Some((key.handle, key.time))
    }

    /// Remove an event entirely.
    pub(crate) fn remove(&mut self, handle: EventHandle) -> Option<Event<S>> {
        if !self.handles.is_alive(handle) {
            return None;
        }
        let event = self.events.remove(&handle)?;
        self.handles.deallocate(handle);

        if let Some(time) = event.time() {
            self.order.remove(&QueueKey {
                time,
                seq: event.seq(),
                handle,
            });
        }

        let pair = (event.class_id().to_owned(), event.target_id());
        if let Some(handles) = self.by_pair.get_mut(&pair) {
            handles.retain(|h| *h != handle);
            if handles.is_empty() {
                self.by_pair.remove(&pair);
            }
        }
        if let Some(handles) = self.by_target.get_mut(&event.target_id()) {
            handles.retain(|h| *h != handle);
            if handles.is_empty() {
                self.by_target.remove(&event.target_id());
            }
        }
        self.changes.remove(&handle);

        Some(event)
    }

    /// Remove every event bound to `target`.
    pub(crate) fn remove_target(&mut self, target: TargetId) -> usize {
        let handles: SmallVec<[EventHandle; 4]> =
            self.by_target.get(&target).cloned().unwrap_or_default();
        handles
            .into_iter()
            .filter(|&h| self.remove(h).is_some())
            .count()
    }

    /// Record that `handle` must be re-evaluated from `changes_at`.
    ///
    /// Several changes before a drain collapse into the earliest one.
    /// Returns `false` for unknown handles.
    pub(crate) fn add_change(&mut self, handle: EventHandle, changes_at: Time) -> bool {
        if !self.contains(handle) {
            return false;
        }
        self.changes
            .entry(handle)
            .and_modify(|t| *t = (*t).min(changes_at))
            .or_insert(changes_at);
        true
    }

    /// Forget the change recorded for `handle`, returning its time.
    pub(crate) fn clear_change(&mut self, handle: EventHandle) -> Option<Time> {
        self.changes.remove(&handle)
    }

    /// Drain recorded changes, ordered by change time then creation order.
    pub(crate) fn take_changes(&mut self) -> Vec<(EventHandle, Time)> {
        let mut changes: Vec<_> = self
            .changes
            .drain()
            .map(|(handle, at)| {
                let seq = self.events.get(&handle).map_or(u64::MAX, Event::seq);
                (at, seq, handle)
            })
            .collect();
        changes.sort_unstable();
        changes.into_iter().map(|(at, _, h)| (h, at)).collect()
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    #[must_use]
    pub fn change_count(&self) -> usize {
        self.changes.len()
    }

    /// Pending invalidation time recorded for `handle`.
    #[must_use]
    pub fn pending_change(&self, handle: EventHandle) -> Option<Time> {
        self.changes.get(&handle).copied()
    }

    /// Trigger time of the earliest scheduled event.
    #[must_use]
    pub fn next_time(&self) -> Option<Time> {
        self.order.first().map(|k| k.time)
    }

    /// Scheduled events in firing order.
    pub fn iter_scheduled(&self) -> impl Iterator<Item = &Event<S>> + '_ {
        self.order.iter().filter_map(|k| self.events.get(&k.handle))
    }

    /// Number of live events, dormant ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events with a trigger time.
    #[must_use]
    pub fn scheduled_len(&self) -> usize {
        self.order.len()
    }
}

impl<S> std::fmt::Debug for EventQueue<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("events", &self.events.len())
            .field("scheduled", &self.order.len())
            .field("changes", &self.changes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::sync::Arc;

    use super::*;
    use crate::{EventClass, EventTarget, Loop, ParamMap, TargetRef};

    struct Named(&'static str);

    impl EventClass<()> for Named {
        fn id(&self) -> &str {
            self.0
        }

        fn predict_trigger_time(
            &self,
            _: &dyn EventTarget,
            _: &(),
            reference_time: Time,
            _: &ParamMap,
        ) -> Option<Time> {
            Some(reference_time)
        }

        fn invoke(&self, _: &mut Loop<()>, _: &TargetRef, _: &mut (), _: Time, _: &ParamMap) {}
    }

    struct Dummy(TargetId);

    impl EventTarget for Dummy {
        fn id(&self) -> TargetId {
            self.0
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn target() -> TargetRef {
        Arc::new(Dummy(TargetId::allocate()))
    }

    fn t(units: i64) -> Time {
        Time::from_int(units)
    }

    fn push(
        queue: &mut EventQueue<()>,
        class: &'static str,
        target: &TargetRef,
        at: Option<i64>,
    ) -> EventHandle {
        let class: Arc<dyn EventClass<()>> = Arc::new(Named(class));
        queue.insert(Event::new(class, target, ParamMap::new(), at.map(t)))
    }

    #[test]
    fn test_pop_in_time_order() {
        let mut queue = EventQueue::new();
        let a = target();

        let late = push(&mut queue, "late", &a, Some(8));
        let early = push(&mut queue, "early", &a, Some(2));

        assert_eq!(queue.next_time(), Some(t(2)));
        assert_eq!(queue.pop_due(t(10)), Some((early, t(2))));
        assert_eq!(queue.pop_due(t(5)), None);
        assert_eq!(queue.pop_due(t(10)), Some((late, t(8))));

        // Popped events stay addressable until removed
        assert!(queue.contains(early));
        assert_eq!(queue.scheduled_len(), 0);
    }

    #[test]
    fn test_ties_break_by_creation_order() {
        let mut queue = EventQueue::new();
        let a = target();

        let first = push(&mut queue, "x", &a, Some(5));
        let second = push(&mut queue, "y", &a, Some(5));
        let third = push(&mut queue, "z", &a, Some(5));

        // Rescheduling to the same time does not lose the creation rank
        queue.reschedule(first, Some(t(9)));
        queue.reschedule(first, Some(t(5)));

        let order: Vec<_> = std::iter::from_fn(|| queue.pop_due(t(5)))
            .map(|(h, _)| h)
            .collect();
        assert_eq!(order, vec![first, second, third]);
    }

    #[test]
    fn test_dormant_events_are_not_scheduled() {
        let mut queue = EventQueue::new();
        let a = target();

        let dormant = push(&mut queue, "never", &a, None);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.scheduled_len(), 0);
        assert_eq!(queue.pop_due(Time::MAX), None);

        assert!(queue.reschedule(dormant, Some(t(1))));
        assert_eq!(queue.pop_due(Time::MAX), Some((dormant, t(1))));
    }

    #[test]
    fn test_changes_keep_earliest() {
        let mut queue = EventQueue::new();
        let a = target();

        let e1 = push(&mut queue, "a", &a, Some(10));
        let e2 = push(&mut queue, "b", &a, Some(10));

        assert!(queue.add_change(e1, t(7)));
        assert!(queue.add_change(e1, t(3)));
        assert!(queue.add_change(e1, t(6)));
        assert!(queue.add_change(e2, t(3)));
        assert!(!queue.add_change(EventHandle::DANGLING, t(1)));

        assert_eq!(queue.pending_change(e1), Some(t(3)));
        assert_eq!(queue.take_changes(), vec![(e1, t(3)), (e2, t(3))]);
        assert!(!queue.has_changes());
    }

    #[test]
    fn test_clear_change() {
        let mut queue = EventQueue::new();
        let a = target();

        let e = push(&mut queue, "x", &a, Some(5));
        queue.add_change(e, t(2));

        assert_eq!(queue.clear_change(e), Some(t(2)));
        assert_eq!(queue.clear_change(e), None);
        assert!(!queue.has_changes());
        assert_eq!(queue.next_time(), Some(t(5)));
    }

    #[test]
    fn test_remove_cleans_indices() {
        let mut queue = EventQueue::new();
        let a = target();

        let e = push(&mut queue, "bounce", &a, Some(4));
        queue.add_change(e, t(1));
        assert_eq!(queue.find("bounce", a.id()), Some(e));
        assert_eq!(queue.events_for_target(a.id()), &[e]);

        assert!(queue.remove(e).is_some());
        assert!(queue.remove(e).is_none());
        assert!(!queue.contains(e));
        assert_eq!(queue.find("bounce", a.id()), None);
        assert!(queue.events_for_target(a.id()).is_empty());
        assert!(!queue.has_changes());
        assert_eq!(queue.next_time(), None);

        // Slot reuse must not revive the old handle
        let reused = push(&mut queue, "bounce", &a, Some(4));
        assert_eq!(reused.slot(), e.slot());
        assert!(!queue.contains(e));
    }

    #[test]
    fn test_remove_target() {
        let mut queue = EventQueue::new();
        let a = target();
        let b = target();

        push(&mut queue, "x", &a, Some(1));
        push(&mut queue, "y", &a, None);
        let kept = push(&mut queue, "x", &b, Some(1));

        assert_eq!(queue.remove_target(a.id()), 2);
        assert_eq!(queue.len(), 1);
        assert!(queue.contains(kept));
    }
}
