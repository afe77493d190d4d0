//! Scheduled events and their generation-checked handles.
//!
//! Handles use a generational index so a caller can keep one around after the
//! event executed or was canceled: the slot may be reused, but the generation
//! no longer matches and the handle reads as expired.

use std::fmt;
use std::sync::{Arc, Weak};

use tempo_curve::Time;

use crate::{EventClass, EventTarget, ParamMap, TargetId, TargetRef};

/// Generation counter to detect stale event handles.
/// Incremented each time a slot is recycled.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u32);

impl Generation {
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen{}", self.0)
    }
}

/// Non-owning reference to a scheduled event.
///
/// Holding a handle never keeps an event alive. Check it with
/// [`Loop::is_pending`](crate::Loop::is_pending) before relying on it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventHandle {
    slot: u32,
    generation: Generation,
}

impl EventHandle {
    /// A handle that never refers to a live event.
    ///
    /// Returned when an event could not be created.
    pub const DANGLING: EventHandle = EventHandle {
        slot: u32::MAX,
        generation: Generation(u32::MAX),
    };

    #[must_use]
    pub const fn new(slot: u32, generation: Generation) -> Self {
        Self { slot, generation }
    }

    #[must_use]
    pub const fn slot(self) -> u32 {
        self.slot
    }

    #[must_use]
    pub const fn generation(self) -> Generation {
        self.generation
    }

    /// Is this the [`DANGLING`](Self::DANGLING) handle?
    #[must_use]
    pub const fn is_dangling(self) -> bool {
        self.slot == u32::MAX
    }
}

impl fmt::Debug for EventHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dangling() {
            write!(f, "Event(dangling)")
        } else {
            write!(f, "Event({}v{})", self.slot, self.generation.0)
        }
    }
}

impl fmt::Display for EventHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.slot, self.generation.0)
    }
}

/// Hands out [`EventHandle`]s for the loop's event table.
///
/// A slot freed by a fired or cancelled event is recycled with its
/// generation bumped, so handles held by callers go stale instead of
/// aliasing the new occupant.
#[derive(Debug, Default)]
pub struct HandleAllocator {
    /// Current generation of every slot ever handed out.
    slots: Vec<Generation>,
    /// Slots awaiting reuse, most recently freed last.
    recycled: Vec<u32>,
}

impl HandleAllocator {
    /// Create an empty allocator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            recycled: Vec::new(),
        }
    }

    /// Allocate a handle, reusing a freed slot when one is available.
    pub fn allocate(&mut self) -> EventHandle {
        match self.recycled.pop() {
            Some(slot) => EventHandle::new(slot, self.slots[slot as usize]),
            None => {
                let slot = self.slots.len() as u32;
                self.slots.push(Generation::new());
                EventHandle::new(slot, Generation::new())
            }
        }
    }

    /// Release a handle's slot for reuse.
    ///
    /// Returns `false` for a handle that was already stale.
    pub fn deallocate(&mut self, handle: EventHandle) -> bool {
        if !self.is_alive(handle) {
            return false;
        }

        let slot = &mut self.slots[handle.slot as usize];
        *slot = slot.next();
        self.recycled.push(handle.slot);
        true
    }

    /// Is `handle` the current occupant of its slot?
    #[must_use]
    pub fn is_alive(&self, handle: EventHandle) -> bool {
        self.slots
            .get(handle.slot as usize)
            .is_some_and(|&generation| generation == handle.generation)
    }
}

/// One scheduled reaction.
///
/// Identity is the handle, not the time: the trigger time is recomputed every
/// time a dependency changes.
pub struct Event<S> {
    handle: EventHandle,
    class: Arc<dyn EventClass<S>>,
    target_id: TargetId,
    target: Weak<dyn EventTarget>,
    params: ParamMap,
    time: Option<Time>,
    seq: u64,
}

impl<S> Event<S> {
    pub(crate) fn new(
        class: Arc<dyn EventClass<S>>,
        target: &TargetRef,
        params: ParamMap,
        time: Option<Time>,
    ) -> Self {
        Self {
            handle: EventHandle::DANGLING,
            class,
            target_id: target.id(),
            target: Arc::downgrade(target),
            params,
            time,
            seq: 0,
        }
    }

    pub(crate) fn bind(&mut self, handle: EventHandle, seq: u64) {
        self.handle = handle;
        self.seq = seq;
    }

    #[must_use]
    pub fn handle(&self) -> EventHandle {
        self.handle
    }

    #[must_use]
    pub fn class(&self) -> &Arc<dyn EventClass<S>> {
        &self.class
    }

    #[must_use]
    pub fn class_id(&self) -> &str {
        self.class.id()
    }

    #[must_use]
    pub fn target_id(&self) -> TargetId {
        self.target_id
    }

    /// The target, if it is still alive.
    #[must_use]
    pub fn target(&self) -> Option<TargetRef> {
        self.target.upgrade()
    }

    #[must_use]
    pub fn params(&self) -> &ParamMap {
        &self.params
    }

    pub(crate) fn params_mut(&mut self) -> &mut ParamMap {
        &mut self.params
    }

    /// Current trigger time; `None` while dormant.
    #[must_use]
    pub fn time(&self) -> Option<Time> {
        self.time
    }

    pub(crate) fn set_time(&mut self, time: Option<Time>) {
        self.time = time;
    }

    /// Creation order, used to break ties between equal trigger times.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl<S> fmt::Debug for Event<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("handle", &self.handle)
            .field("class", &self.class.id())
            .field("target", &self.target_id)
            .field("time", &self.time)
            .finish_non_exhaustive()
    }
}
