//! A cell whose value is set directly by callers, the leaf of every
//! dependency graph.

use std::cell::{Cell as StdCell, RefCell};
use std::rc::Rc;

use crate::cell::{Cell, SettableCell};
use crate::cell_state::{
    add_observer_with_lifecycle, remove_observer_with_lifecycle, CellLifecycle, CellStateBase,
    ObserverRef,
};
use crate::key::{KeyRef, UniqueKey, ValueKey};
use crate::registry::{self, Batched};

pub(crate) struct MutableCellState<T> {
    base: CellStateBase,
    value: RefCell<T>,
    /// Whether the value has actually changed since the last drained
    /// update, accumulated across however many `set` calls land inside the
    /// current batch.
    pending_changed: StdCell<bool>,
}

impl<T> CellLifecycle for MutableCellState<T> {}

impl<T: PartialEq + 'static> Batched for MutableCellState<T> {
    fn run_deferred_update(&self) {
        let changed = self.pending_changed.replace(false);
        self.base.notify_update(changed);
    }
}

/// A cell that can be assigned to directly, e.g. `cell.set(5)`.
#[derive(Clone)]
pub struct MutableCell<T> {
    state: Rc<MutableCellState<T>>,
}

impl<T: Clone + PartialEq + 'static> MutableCell<T> {
    pub fn new(value: T) -> Self {
        Self::with_key(KeyRef::new(UniqueKey::new()), value)
    }

    /// Creates (or reuses, if `key` already identifies a live cell) a
    /// mutable cell under an explicit key, so multiple call sites
    /// constructing a cell with the same key share one underlying state.
    pub fn with_key(key: KeyRef, value: T) -> Self {
        let state = registry::get_or_build(key.clone(), || {
            Rc::new(MutableCellState {
                base: CellStateBase::new(key),
                value: RefCell::new(value),
                pending_changed: StdCell::new(false),
            })
        });
        MutableCell { state }
    }

    /// Assigns a new value. If `new_value` equals the current value, this is
    /// a complete no-op: no `will_update`/`update` pair fires at all.
    /// Otherwise observers' `will_update` fires immediately; `update` fires
    /// immediately too, unless called from within [`crate::batch`], in which
    /// case it's deferred until the batch ends.
    pub fn set(&self, new_value: T) {
        if *self.state.value.borrow() == new_value {
            return;
        }

        self.state.base.notify_will_update();
        *self.state.value.borrow_mut() = new_value;

        if registry::is_batching() {
            self.state.pending_changed.set(true);
            let id = Rc::as_ptr(&self.state) as *const () as usize;
            registry::enqueue_batched(id, self.state.clone());
        } else {
            self.state.base.notify_update(true);
        }
    }
}

impl<T: Clone + PartialEq + 'static> Cell for MutableCell<T> {
    type Value = T;

    fn key(&self) -> KeyRef {
        self.state.base.key().clone()
    }

    fn value(&self) -> T {
        self.state.value.borrow().clone()
    }

    fn add_observer(&self, observer: ObserverRef) {
        add_observer_with_lifecycle(&self.state.base, &self.state, observer);
    }

    fn remove_observer(&self, observer: &ObserverRef) {
        remove_observer_with_lifecycle(&self.state.base, &self.state, observer);
    }
}

impl<T: Clone + PartialEq + 'static> SettableCell for MutableCell<T> {
    fn set_value(&self, value: T) {
        self.set(value);
    }
}

/// Creates a mutable cell holding `value`.
pub fn variable<T: Clone + PartialEq + 'static>(value: T) -> MutableCell<T> {
    MutableCell::new(value)
}

/// Creates a mutable cell holding `value`, shared with any other
/// `variable_with_key` call using an equal `key`.
pub fn variable_with_key<T: Clone + PartialEq + 'static>(key: KeyRef, value: T) -> MutableCell<T> {
    MutableCell::with_key(key, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_updates_value() {
        let c = variable(1);
        c.set(2);
        assert_eq!(c.value(), 2);
    }

    #[test]
    fn shared_key_shares_state() {
        // Two calls with an *equal* (non-unique) key must resolve to the
        // same underlying state, unlike `variable()`'s implicit UniqueKey.
        let a = MutableCell::with_key(KeyRef::new(ValueKey("shared")), 1);
        let b = MutableCell::with_key(KeyRef::new(ValueKey("shared")), 99);
        a.set(7);
        assert_eq!(b.value(), 7);
    }
}
