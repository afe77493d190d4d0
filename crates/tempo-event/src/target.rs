//! Event targets and the weak curve index.
//!
//! Targets are owned by the simulation. The loop only keeps [`Weak`]
//! references keyed by [`TargetId`], so dropping a target needs no
//! cooperation from the scheduler: expired entries are treated as "gone".

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use hashbrown::HashMap;

/// Process-unique identifier of an event target.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetId(u64);

static NEXT_TARGET_ID: AtomicU64 = AtomicU64::new(1);

impl TargetId {
    /// Allocate a fresh id, never handed out before in this process.
    #[must_use]
    pub fn allocate() -> Self {
        Self(NEXT_TARGET_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Target({})", self.0)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An addressable entity whose curves events read and write.
///
/// # Example
///
/// ```ignore
/// struct Ball {
///     id: TargetId,
///     position: Continuous<(f64, f64)>,
/// }
///
/// impl EventTarget for Ball {
///     fn id(&self) -> TargetId {
///         self.id
///     }
///
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
/// }
/// ```
pub trait EventTarget: Any + Send + Sync {
    /// Stable identity of this target.
    fn id(&self) -> TargetId;

    /// Access to the concrete type, for downcasting in event classes.
    fn as_any(&self) -> &dyn Any;
}

impl<'a> dyn EventTarget + 'a {
    /// Downcast to a concrete target type.
    #[must_use]
    pub fn downcast_ref<T: EventTarget>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

impl<'a> fmt::Debug for dyn EventTarget + 'a {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.id())
    }
}

/// Shared handle to a target, as held by the simulation.
pub type TargetRef = Arc<dyn EventTarget>;

/// Identity-keyed index of live targets.
#[derive(Default)]
pub struct CurveIndex {
    targets: HashMap<TargetId, Weak<dyn EventTarget>>,
}

impl CurveIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `target` without extending its lifetime.
    ///
    /// Returns `false` if it was already tracked.
    pub fn insert(&mut self, target: &TargetRef) -> bool {
        self.targets
            .insert(target.id(), Arc::downgrade(target))
            .is_none()
    }

    /// Is `id` tracked (expired or not)?
    #[must_use]
    pub fn contains(&self, id: TargetId) -> bool {
        self.targets.contains_key(&id)
    }

    /// Look up a live target without touching the index.
    #[must_use]
    pub fn get(&self, id: TargetId) -> Option<TargetRef> {
        self.targets.get(&id).and_then(Weak::upgrade)
    }

    /// Look up a live target, dropping the entry if it has expired.
    pub fn resolve(&mut self, id: TargetId) -> Option<TargetRef> {
        let weak = self.targets.get(&id)?;
        if let Some(target) = weak.upgrade() {
            return Some(target);
        }
        self.targets.remove(&id);
        None
    }

    /// Drop every expired entry, returning their ids.
    pub fn prune(&mut self) -> Vec<TargetId> {
        let mut expired = Vec::new();
        self.targets.retain(|&id, weak| {
            let alive = weak.strong_count() > 0;
            if !alive {
                expired.push(id);
            }
            alive
        });
        expired.sort_unstable();
        expired
    }

    /// Number of tracked entries, including ones not yet pruned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl fmt::Debug for CurveIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurveIndex")
            .field("targets", &self.targets.len())
            .finish()
    }
}
