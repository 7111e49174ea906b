//! Adds caching to a cell that would otherwise recompute on every access
//! (any compute cell while nobody happens to be observing it — see the
//! note on that in [`crate::computed::static_cell`]).

use std::cell::RefCell;
use std::rc::Rc;

use crate::cell::Cell;
use crate::cell_state::{CellStateBase, Observer, ObserverRef};
use crate::key::{KeyRef, ValueKey};
use crate::propagation::PropagationState;

struct StoreCellState<C: Cell> {
    base: CellStateBase,
    prop: RefCell<PropagationState>,
    inner: C,
    cached: RefCell<Option<C::Value>>,
}

impl<C: Cell + 'static> Observer for StoreCellState<C> {
    fn will_update(self: Rc<Self>, _source: &KeyRef) {
        let mut prop = self.prop.borrow_mut();
        prop.handle_will_update(|| {}, || self.base.notify_will_update());
    }

    fn update(self: Rc<Self>, _source: &KeyRef, changed: bool) {
        let mut prop = self.prop.borrow_mut();
        prop.handle_update(
            changed,
            || true,
            |changed| {
                // Refresh eagerly: we're subscribed unconditionally, so
                // there is no reason to defer this to the next `value()`.
                *self.cached.borrow_mut() = Some(self.inner.value());
                self.base.notify_update(changed);
            },
            || {},
        );
    }
}

/// A cell that caches the value of `inner`, recomputing it only when
/// `inner` actually notifies a change, regardless of whether `StoreCell`
/// itself has any observers.
#[derive(Clone)]
pub struct StoreCell<C: Cell> {
    state: Rc<StoreCellState<C>>,
}

impl<C: Cell + 'static> StoreCell<C> {
    pub fn new(inner: C) -> Self {
        let state = Rc::new(StoreCellState {
            base: CellStateBase::new(KeyRef::new(ValueKey(format!("store({:?})", inner.key())))),
            prop: RefCell::new(PropagationState::new()),
            cached: RefCell::new(None),
            inner: inner.clone(),
        });

        // Unconditional subscription is the entire point of `store`: unlike
        // a plain compute cell, it must stay live (and therefore cached)
        // even while nobody is observing it.
        let observer: ObserverRef = state.clone();
        inner.add_observer(observer);

        StoreCell { state }
    }
}

impl<C: Cell + 'static> Cell for StoreCell<C> {
    type Value = C::Value;

    fn key(&self) -> KeyRef {
        self.state.base.key().clone()
    }

    fn value(&self) -> C::Value {
        let cached = self.state.cached.borrow().clone();
        match cached {
            Some(v) => v,
            None => {
                let v = self.state.inner.value();
                *self.state.cached.borrow_mut() = Some(v.clone());
                v
            }
        }
    }

    fn add_observer(&self, observer: ObserverRef) {
        self.state.base.add_observer(observer);
    }

    fn remove_observer(&self, observer: &ObserverRef) {
        self.state.base.remove_observer(observer);
    }
}

/// Wraps `cell` so its value is cached and only recomputed when `cell`
/// actually changes, rather than on every read.
pub fn store<C: Cell + 'static>(cell: C) -> StoreCell<C> {
    StoreCell::new(cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::computed::static_cell::computed1;
    use crate::mutable::variable;
    use std::cell::Cell as StdCell;
    use std::rc::Rc;

    #[test]
    fn caches_even_without_its_own_observers() {
        let calls = Rc::new(StdCell::new(0));
        let calls2 = calls.clone();

        let a = variable(1);
        let doubled = computed1(a.clone(), move |a| {
            calls2.set(calls2.get() + 1);
            Ok(a * 2)
        });
        let stored = store(doubled);

        assert_eq!(stored.value(), 2);
        assert_eq!(stored.value(), 2);
        assert_eq!(calls.get(), 1, "store must not recompute on repeated reads");
    }
}
