//! The observer multiset and lifecycle every cell state is built from by
//! composition, plus the `Observer`/`DynCell` trait objects that let the
//! graph talk about cells without knowing their value type.

use std::fmt;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::key::KeyRef;

/// Receives the two-phase propagation protocol from a cell it observes.
///
/// `will_update` fires once a wave reaches this observer, before the
/// source's new value is committed; `update` fires once the wave has fully
/// resolved, reporting whether the source's value actually changed.
///
/// Methods take `self: Rc<Self>` rather than `&self` so an observer that
/// needs to re-subscribe itself elsewhere (a watcher re-running and
/// rebinding its dependencies) can hand out further `Rc` clones of itself
/// without needing a second, independently-stored strong reference.
pub trait Observer {
    fn will_update(self: Rc<Self>, source: &KeyRef);
    fn update(self: Rc<Self>, source: &KeyRef, changed: bool);
}

pub type ObserverRef = Rc<dyn Observer>;

/// A cell, type-erased down to the operations the graph needs to manage
/// dependencies: its identity, and the ability to be observed. Used by the
/// argument tracker and by dynamic compute cells to hold a heterogeneous
/// set of dependencies.
pub trait DynCell: fmt::Debug {
    fn key(&self) -> KeyRef;
    fn add_observer(&self, observer: ObserverRef);
    fn remove_observer(&self, observer: &ObserverRef);
}

fn observer_id(observer: &ObserverRef) -> usize {
    Rc::as_ptr(observer) as *const () as usize
}

/// Lifecycle hooks a concrete cell state implements: `init` runs exactly
/// once, when a cell transitions from unobserved to observed; `pause` runs
/// when it transitions back. Stateless cells (constants, peeks) simply
/// accept the defaults.
/// Lifecycle hooks take `self: &Rc<Self>` rather than `&self` because a
/// concrete cell state's `init` typically needs to hand out an
/// `Rc<dyn Observer>` pointing at itself, to register on its arguments —
/// which a plain `&self` reference can't produce.
pub trait CellLifecycle {
    fn init(self: &Rc<Self>) {}
    fn pause(self: &Rc<Self>) {}
}

/// The part of every non-constant cell's state that doesn't depend on its
/// value type: who's observing it, and the init/pause transitions.
///
/// Composed into concrete state structs (`MutableCellState<T>`,
/// `ComputeCellState<T>`, ...) rather than inherited from, per this crate's
/// trait-composition design.
pub struct CellStateBase {
    key: KeyRef,
    observers: std::cell::RefCell<FxHashMap<usize, (Weak<dyn Observer>, u32)>>,
}

impl CellStateBase {
    pub fn new(key: KeyRef) -> Self {
        CellStateBase {
            key,
            observers: std::cell::RefCell::new(FxHashMap::default()),
        }
    }

    pub fn key(&self) -> &KeyRef {
        &self.key
    }

    fn prune(observers: &mut FxHashMap<usize, (Weak<dyn Observer>, u32)>) {
        observers.retain(|_, (w, _)| w.strong_count() > 0);
    }

    /// Registers `observer`. This is a multiset: registering the same
    /// observer twice (a dynamic compute cell tracking the same argument
    /// from two different recomputes, say) bumps its reference count rather
    /// than replacing the entry, and it takes a matching number of
    /// `remove_observer` calls to actually drop it. Returns `true` if this
    /// was the 0 -> 1 transition, i.e. the caller should run `init()`.
    pub fn add_observer(&self, observer: ObserverRef) -> bool {
        let mut observers = self.observers.borrow_mut();
        Self::prune(&mut observers);
        let became_active = observers.is_empty();
        observers
            .entry(observer_id(&observer))
            .and_modify(|(_, count)| *count += 1)
            .or_insert_with(|| (Rc::downgrade(&observer), 1));
        became_active
    }

    /// Deregisters one reference to `observer`, only actually removing it
    /// once its count reaches zero. Returns `true` if this was the 1 -> 0
    /// transition, i.e. the caller should run `pause()`.
    pub fn remove_observer(&self, observer: &ObserverRef) -> bool {
        let mut observers = self.observers.borrow_mut();
        let id = observer_id(observer);
        if let std::collections::hash_map::Entry::Occupied(mut entry) = observers.entry(id) {
            let (_, count) = entry.get_mut();
            *count -= 1;
            if *count == 0 {
                entry.remove();
            }
        }
        Self::prune(&mut observers);
        observers.is_empty()
    }

    pub fn has_observers(&self) -> bool {
        let mut observers = self.observers.borrow_mut();
        Self::prune(&mut observers);
        !observers.is_empty()
    }

    fn snapshot(&self) -> SmallVec<[Weak<dyn Observer>; 4]> {
        self.observers.borrow().values().map(|(w, _)| w.clone()).collect()
    }

    /// Notifies every live observer that a wave is starting. Panics raised
    /// by an observer's callback are caught and discarded: one misbehaving
    /// watcher must not corrupt propagation for the rest of the graph.
    pub fn notify_will_update(&self) {
        for weak in self.snapshot() {
            if let Some(observer) = weak.upgrade() {
                let key = self.key.clone();
                let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    observer.will_update(&key);
                }));
            }
        }
    }

    /// Notifies every live observer that the wave has resolved, reporting
    /// whether the value actually changed.
    pub fn notify_update(&self, changed: bool) {
        for weak in self.snapshot() {
            if let Some(observer) = weak.upgrade() {
                let key = self.key.clone();
                let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    observer.update(&key, changed);
                }));
            }
        }
    }
}

impl fmt::Debug for CellStateBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellStateBase").field("key", &self.key).finish()
    }
}

/// Registers `observer` on `state`'s base, running `lifecycle.init()` if
/// this was the first observer. Shared by every stateful cell's
/// `add_observer` implementation so the 0->1 transition rule lives in one
/// place.
pub(crate) fn add_observer_with_lifecycle<S: CellLifecycle>(
    base: &CellStateBase,
    lifecycle: &Rc<S>,
    observer: ObserverRef,
) {
    if base.add_observer(observer) {
        lifecycle.init();
    }
}

/// Deregisters `observer` on `state`'s base, running `lifecycle.pause()` if
/// this was the last observer.
pub(crate) fn remove_observer_with_lifecycle<S: CellLifecycle>(
    base: &CellStateBase,
    lifecycle: &Rc<S>,
    observer: &ObserverRef,
) {
    if base.remove_observer(observer) {
        lifecycle.pause();
    }
}
