//! Reads a cell's value without tracking it as a dependency, and without
//! forwarding its changes to any observer.

use std::rc::Rc;

use crate::cell::Cell;
use crate::cell_state::{
    add_observer_with_lifecycle, remove_observer_with_lifecycle, CellLifecycle, CellStateBase,
    Observer, ObserverRef,
};
use crate::key::{KeyRef, ValueKey};

struct PeekCellState<C> {
    base: CellStateBase,
    inner: C,
}

impl<C: Cell + 'static> CellLifecycle for PeekCellState<C> {
    fn init(self: &Rc<Self>) {
        // Subscribe to `inner` purely so it stays initialized (and, if it's
        // a compute cell, cached) for as long as this peek is observed —
        // not to forward anything, since `will_update`/`update` below are
        // no-ops.
        let observer: ObserverRef = self.clone();
        self.inner.add_observer(observer);
    }

    fn pause(self: &Rc<Self>) {
        let observer: ObserverRef = self.clone();
        self.inner.remove_observer(&observer);
    }
}

impl<C: Cell + 'static> Observer for PeekCellState<C> {
    fn will_update(self: Rc<Self>, _source: &KeyRef) {}
    fn update(self: Rc<Self>, _source: &KeyRef, _changed: bool) {}
}

/// A cell that reads the value of another cell but never notifies
/// observers and is never itself treated as a dependency when read through
/// [`crate::cell::Tracked::track`] — it simply is not observable.
#[derive(Clone)]
pub struct PeekCell<C: Cell> {
    state: Rc<PeekCellState<C>>,
}

impl<C: Cell + 'static> PeekCell<C> {
    pub fn new(inner: C) -> Self {
        let key = KeyRef::new(ValueKey(format!("peek({:?})", inner.key())));
        PeekCell {
            state: Rc::new(PeekCellState {
                base: CellStateBase::new(key),
                inner,
            }),
        }
    }
}

impl<C: Cell + 'static> Cell for PeekCell<C> {
    type Value = C::Value;

    fn key(&self) -> KeyRef {
        self.state.base.key().clone()
    }

    fn value(&self) -> C::Value {
        self.state.inner.value()
    }

    fn add_observer(&self, observer: ObserverRef) {
        add_observer_with_lifecycle(&self.state.base, &self.state, observer);
    }

    fn remove_observer(&self, observer: &ObserverRef) {
        remove_observer_with_lifecycle(&self.state.base, &self.state, observer);
    }
}

/// Creates a cell that reads the value of `cell` without notifying
/// observers when it changes, and without being tracked as a dependency
/// itself.
pub fn peek<C: Cell + 'static>(cell: C) -> PeekCell<C> {
    PeekCell::new(cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutable::variable;
    use std::cell::Cell as StdCell;

    #[test]
    fn reads_current_value() {
        let a = variable(1);
        let p = peek(a.clone());
        assert_eq!(p.value(), 1);
        a.set(5);
        assert_eq!(p.value(), 5);
    }

    struct Counter(Rc<StdCell<u32>>);
    impl Observer for Counter {
        fn will_update(self: Rc<Self>, _source: &KeyRef) {}
        fn update(self: Rc<Self>, _source: &KeyRef, _changed: bool) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn never_forwards_notifications_to_its_own_observers() {
        let a = variable(1);
        let p = peek(a.clone());

        let calls = Rc::new(StdCell::new(0));
        let observer: ObserverRef = Rc::new(Counter(calls.clone()));
        p.add_observer(observer.clone());

        a.set(2);
        assert_eq!(calls.get(), 0, "peek must not forward updates");
        p.remove_observer(&observer);
    }
}
