//! A cell holding the previous value of another cell, updated one step
//! behind it.

use std::cell::RefCell;
use std::rc::Rc;

use crate::cell::Cell;
use crate::cell_state::{
    add_observer_with_lifecycle, remove_observer_with_lifecycle, CellLifecycle, CellStateBase,
    Observer, ObserverRef,
};
use crate::error::CellError;
use crate::key::{KeyRef, ValueKey};
use crate::propagation::PropagationState;

struct PreviousCellState<C: Cell> {
    base: CellStateBase,
    prop: RefCell<PropagationState>,
    inner: C,
    current: RefCell<C::Value>,
    previous: RefCell<Option<C::Value>>,
}

impl<C: Cell + 'static> CellLifecycle for PreviousCellState<C> {
    fn init(self: &Rc<Self>) {
        // Only tracks while observed: if `inner` changes with nobody
        // watching this cell, that transition is simply missed, and
        // `value()` keeps raising `Uninitialized` until one actually occurs
        // after an observer is attached.
        let observer: ObserverRef = self.clone();
        self.inner.add_observer(observer);
    }

    fn pause(self: &Rc<Self>) {
        let observer: ObserverRef = self.clone();
        self.inner.remove_observer(&observer);
    }
}

impl<C: Cell + 'static> Observer for PreviousCellState<C> {
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
                if changed {
                    let new_current = self.inner.value();
                    let old_current = self.current.replace(new_current);
                    *self.previous.borrow_mut() = Some(old_current);
                }
                self.base.notify_update(changed);
            },
            || {},
        );
    }
}

/// A cell whose value is the value `inner` held just before its most
/// recent change while this cell was observed. Reading it before any
/// observer has been attached to it, or before the first change after that,
/// panics with [`CellError::Uninitialized`].
#[derive(Clone)]
pub struct PreviousCell<C: Cell> {
    state: Rc<PreviousCellState<C>>,
}

impl<C: Cell + 'static> PreviousCell<C> {
    pub fn new(inner: C) -> Self {
        let current = inner.value();
        let state = Rc::new(PreviousCellState {
            base: CellStateBase::new(KeyRef::new(ValueKey(format!("previous({:?})", inner.key())))),
            prop: RefCell::new(PropagationState::new()),
            current: RefCell::new(current),
            previous: RefCell::new(None),
            inner,
        });

        PreviousCell { state }
    }
}

impl<C: Cell + 'static> Cell for PreviousCell<C> {
    type Value = C::Value;

    fn key(&self) -> KeyRef {
        self.state.base.key().clone()
    }

    fn value(&self) -> C::Value {
        match self.state.previous.borrow().clone() {
            Some(v) => v,
            None => panic!("{}", CellError::Uninitialized),
        }
    }

    fn add_observer(&self, observer: ObserverRef) {
        add_observer_with_lifecycle(&self.state.base, &self.state, observer);
    }

    fn remove_observer(&self, observer: &ObserverRef) {
        remove_observer_with_lifecycle(&self.state.base, &self.state, observer);
    }
}

/// Creates a cell holding the value `cell` had just before its most recent
/// change while observed.
pub fn previous<C: Cell + 'static>(cell: C) -> PreviousCell<C> {
    PreviousCell::new(cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutable::variable;
    use crate::watcher::watch;

    #[test]
    #[should_panic]
    fn panics_before_first_change() {
        let a = variable(1);
        let prev = previous(a);
        prev.value();
    }

    #[test]
    #[should_panic]
    fn panics_if_never_observed_even_after_inner_changes() {
        let a = variable(1);
        let prev = previous(a.clone());
        a.set(2);
        prev.value();
    }

    #[test]
    fn tracks_one_step_behind_once_observed() {
        let a = variable(1);
        let prev = previous(a.clone());
        let _watch = watch({
            let prev = prev.clone();
            move |t| {
                t.track(&prev);
            }
        });

        a.set(2);
        assert_eq!(prev.value(), 1);
        a.set(3);
        assert_eq!(prev.value(), 2);
    }
}
