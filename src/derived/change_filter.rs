//! Suppresses notifications when a cell's new value compares equal to its
//! previous one.
//!
//! This is the one derived facility that trades the crate's usual
//! lazy-by-default evaluation for eager: to know whether to suppress a
//! notification it must compare the old and new values, which means
//! actually computing the new one as soon as a dependency changes rather
//! than waiting for the next `value()` read.

use std::cell::RefCell;
use std::rc::Rc;

use crate::cell::Cell;
use crate::cell_state::{CellStateBase, Observer, ObserverRef};
use crate::key::{KeyRef, ValueKey};
use crate::propagation::PropagationState;

struct ChangesOnlyCellState<C: Cell> {
    base: CellStateBase,
    prop: RefCell<PropagationState>,
    inner: C,
    old: RefCell<Option<C::Value>>,
}

impl<C: Cell + 'static> Observer for ChangesOnlyCellState<C>
where
    C::Value: PartialEq,
{
    fn will_update(self: Rc<Self>, _source: &KeyRef) {
        let mut prop = self.prop.borrow_mut();
        prop.handle_will_update(
            || *self.old.borrow_mut() = Some(self.inner.value()),
            || self.base.notify_will_update(),
        );
    }

    fn update(self: Rc<Self>, _source: &KeyRef, changed: bool) {
        let mut prop = self.prop.borrow_mut();
        prop.handle_update(
            changed,
            || match &*self.old.borrow() {
                Some(old) => *old != self.inner.value(),
                None => true,
            },
            |changed| self.base.notify_update(changed),
            || *self.old.borrow_mut() = None,
        );
    }
}

/// A cell that forwards `inner`'s value but only notifies its own
/// observers when it actually differs from the previous one (by `==`).
#[derive(Clone)]
pub struct ChangesOnlyCell<C: Cell> {
    state: Rc<ChangesOnlyCellState<C>>,
}

impl<C: Cell + 'static> ChangesOnlyCell<C>
where
    C::Value: PartialEq,
{
    pub fn new(inner: C) -> Self {
        let state = Rc::new(ChangesOnlyCellState {
            base: CellStateBase::new(KeyRef::new(ValueKey(format!(
                "changes_only({:?})",
                inner.key()
            )))),
            prop: RefCell::new(PropagationState::new()),
            old: RefCell::new(None),
            inner: inner.clone(),
        });

        // Must see every update from `inner` to compare against, regardless
        // of whether this cell itself currently has observers.
        let observer: ObserverRef = state.clone();
        inner.add_observer(observer);

        ChangesOnlyCell { state }
    }
}

impl<C: Cell + 'static> Cell for ChangesOnlyCell<C>
where
    C::Value: PartialEq,
{
    type Value = C::Value;

    fn key(&self) -> KeyRef {
        self.state.base.key().clone()
    }

    fn value(&self) -> C::Value {
        self.state.inner.value()
    }

    fn add_observer(&self, observer: ObserverRef) {
        self.state.base.add_observer(observer);
    }

    fn remove_observer(&self, observer: &ObserverRef) {
        self.state.base.remove_observer(observer);
    }
}

/// Wraps `cell` so its observers are only notified when its value actually
/// changes (by `==`), filtering out updates that recompute to an equal
/// value.
pub fn changes_only<C: Cell + 'static>(cell: C) -> ChangesOnlyCell<C>
where
    C::Value: PartialEq,
{
    ChangesOnlyCell::new(cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::computed::static_cell::computed1;
    use crate::mutable::variable;
    use crate::watcher::watch;
    use std::cell::Cell as StdCell;
    use std::rc::Rc;

    #[test]
    fn suppresses_notification_for_equal_values() {
        let a = variable(1);
        // Recomputes to the same parity every time `a` moves by 2.
        let parity = changes_only(computed1(a.clone(), |a| Ok(a % 2)));

        let notifications = Rc::new(StdCell::new(0));
        let n2 = notifications.clone();
        let _handle = watch(move |t| {
            t.track(&parity);
            n2.set(n2.get() + 1);
        });

        assert_eq!(notifications.get(), 1, "watcher always runs once immediately");

        a.set(3); // 3 % 2 == 1, same as 1 % 2 == 1: no change.
        assert_eq!(notifications.get(), 1);

        a.set(4); // 4 % 2 == 0: a real change.
        assert_eq!(notifications.get(), 2);
    }
}
