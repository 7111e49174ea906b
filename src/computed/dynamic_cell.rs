//! A compute cell whose dependencies are discovered at recompute time, by
//! recording which cells its closure actually reads through [`Tracked`],
//! rather than being declared up front.

use std::cell::{Cell as StdCell, RefCell};
use std::rc::Rc;

use crate::cell::{Cell, Tracked};
use crate::cell_state::{
    add_observer_with_lifecycle, remove_observer_with_lifecycle, CellLifecycle, CellStateBase,
    DynCell, Observer, ObserverRef,
};
use crate::error::{CellError, ComputeOutcome};
use crate::key::{KeyRef, UniqueKey};
use crate::propagation::PropagationState;
use crate::registry;
use crate::tracker;

type Slot<T> = Option<Result<T, CellError>>;
type ComputeFn<T> = Rc<dyn Fn(&Tracked) -> Result<T, ComputeOutcome>>;

/// The compute closure is type-erased for the same reason as in
/// `StaticComputeCellState`: a cell built with an explicit, shared key must
/// produce the same concrete state type no matter which closure instance
/// constructed it, or the registry's downcast back to `DynamicComputeCellState<T>`
/// would fail.
pub(crate) struct DynamicComputeCellState<T> {
    base: CellStateBase,
    prop: RefCell<PropagationState>,
    compute: ComputeFn<T>,
    slot: RefCell<Slot<T>>,
    stale: StdCell<bool>,
    /// The dependency set as of the last recompute, kept so a subsequent
    /// recompute can diff against it and only churn the observer
    /// registrations that actually changed.
    deps: RefCell<Vec<Rc<dyn DynCell>>>,
}

impl<T> DynamicComputeCellState<T>
where
    T: Clone + 'static,
{
    fn recompute(self: &Rc<Self>) {
        let (result, new_deps) = tracker::with_tracking(|| (self.compute)(&Tracked));

        if self.base.has_observers() {
            self.rebind_dependencies(new_deps);
        }

        match result {
            Ok(value) => *self.slot.borrow_mut() = Some(Ok(value)),
            Err(ComputeOutcome::Skip) => {
                if self.slot.borrow().is_none() {
                    *self.slot.borrow_mut() = Some(Err(CellError::Uninitialized));
                }
            }
            Err(ComputeOutcome::Err(e)) => {
                *self.slot.borrow_mut() = Some(Err(CellError::Compute(e.into())));
            }
        }
        self.stale.set(false);
    }

    fn rebind_dependencies(self: &Rc<Self>, new_deps: Vec<Rc<dyn DynCell>>) {
        let observer: ObserverRef = self.clone();
        let mut deps = self.deps.borrow_mut();

        for old in deps.iter() {
            if !new_deps.iter().any(|d| d.key() == old.key()) {
                old.remove_observer(&observer);
            }
        }
        for new in &new_deps {
            if !deps.iter().any(|d| d.key() == new.key()) {
                new.add_observer(observer.clone());
            }
        }

        *deps = new_deps;
    }
}

impl<T> CellLifecycle for DynamicComputeCellState<T>
where
    T: Clone + 'static,
{
    fn init(self: &Rc<Self>) {
        // Dependencies aren't known until the first recompute. Prime them
        // right away rather than waiting for the first external `value()`
        // call, so a newly-observed cell is already subscribed to its
        // arguments by the time anything upstream changes.
        self.stale.set(true);
        self.recompute();
    }

    fn pause(self: &Rc<Self>) {
        let observer: ObserverRef = self.clone();
        for dep in self.deps.borrow_mut().drain(..) {
            dep.remove_observer(&observer);
        }
    }
}

impl<T> Observer for DynamicComputeCellState<T>
where
    T: Clone + 'static,
{
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
                self.stale.set(changed);
                self.base.notify_update(changed);
            },
            || {},
        );
    }
}

/// A cell computed from whichever cells its closure reads via
/// [`Tracked::track`], rediscovered on every recompute.
#[derive(Clone)]
pub struct DynamicComputeCell<T> {
    state: Rc<DynamicComputeCellState<T>>,
}

impl<T> DynamicComputeCell<T>
where
    T: Clone + 'static,
{
    /// Builds a cell under its own private, never-shared key.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn(&Tracked) -> Result<T, ComputeOutcome> + 'static,
    {
        Self::build(KeyRef::new(UniqueKey::new()), Rc::new(compute))
    }

    /// Builds a cell under an explicit key: two `computed_dyn` calls given
    /// an equal `key` share one state (and so one cached value and one
    /// dependency set), even though each call's closure is a distinct
    /// object.
    pub fn with_key<F>(key: KeyRef, compute: F) -> Self
    where
        F: Fn(&Tracked) -> Result<T, ComputeOutcome> + 'static,
    {
        Self::build(key, Rc::new(compute))
    }

    fn build(key: KeyRef, compute: ComputeFn<T>) -> Self {
        let state = registry::get_or_build(key.clone(), || {
            Rc::new(DynamicComputeCellState {
                base: CellStateBase::new(key),
                prop: RefCell::new(PropagationState::new()),
                compute,
                slot: RefCell::new(None),
                stale: StdCell::new(true),
                deps: RefCell::new(Vec::new()),
            })
        });
        DynamicComputeCell { state }
    }
}

impl<T> Cell for DynamicComputeCell<T>
where
    T: Clone + 'static,
{
    type Value = T;

    fn key(&self) -> KeyRef {
        self.state.base.key().clone()
    }

    fn value(&self) -> T {
        if !self.state.base.has_observers() || self.state.stale.get() || self.state.slot.borrow().is_none() {
            self.state.recompute();
        }
        match self.state.slot.borrow().as_ref().expect("recomputed above") {
            Ok(v) => v.clone(),
            Err(e) => panic!("{e}"),
        }
    }

    fn add_observer(&self, observer: ObserverRef) {
        add_observer_with_lifecycle(&self.state.base, &self.state, observer);
    }

    fn remove_observer(&self, observer: &ObserverRef) {
        remove_observer_with_lifecycle(&self.state.base, &self.state, observer);
    }
}

/// Creates a cell whose value is computed by `f`, which discovers its own
/// dependencies by reading other cells through the [`Tracked`] handle it's
/// given.
pub fn computed_dyn<T, F>(f: F) -> DynamicComputeCell<T>
where
    F: Fn(&Tracked) -> Result<T, ComputeOutcome> + 'static,
    T: Clone + 'static,
{
    DynamicComputeCell::new(f)
}

/// Like [`computed_dyn`], but under an explicit, shareable key instead of a
/// private one.
pub fn computed_dyn_with_key<T, F>(key: KeyRef, f: F) -> DynamicComputeCell<T>
where
    F: Fn(&Tracked) -> Result<T, ComputeOutcome> + 'static,
    T: Clone + 'static,
{
    DynamicComputeCell::with_key(key, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ValueKey;
    use crate::mutable::variable;

    #[test]
    fn switches_dependencies_at_runtime() {
        let flag = variable(true);
        let a = variable(1);
        let b = variable(2);

        let (flag2, a2, b2) = (flag.clone(), a.clone(), b.clone());
        let selected = computed_dyn(move |t| {
            if t.track(&flag2) {
                Ok(t.track(&a2))
            } else {
                Ok(t.track(&b2))
            }
        });

        assert_eq!(selected.value(), 1);

        // While tracking `a`, changing `b` must not affect the result.
        b.set(20);
        assert_eq!(selected.value(), 1);

        flag.set(false);
        assert_eq!(selected.value(), 20);

        // Now tracking `b`; changing `a` must not affect the result.
        a.set(100);
        assert_eq!(selected.value(), 20);
    }

    #[test]
    fn explicit_key_shares_state_across_distinct_closures() {
        let key = KeyRef::new(ValueKey("shared-dynamic"));
        let calls = Rc::new(StdCell::new(0));
        let a = variable(1);

        let build = |calls: Rc<StdCell<i32>>| {
            let a = a.clone();
            DynamicComputeCell::with_key(key.clone(), move |t| {
                calls.set(calls.get() + 1);
                Ok(t.track(&a) * 10)
            })
        };

        let c1 = build(calls.clone());
        let c2 = build(calls.clone());

        assert_eq!(c1.value(), 10);
        assert_eq!(calls.get(), 1);
        assert_eq!(c2.value(), 10);
        assert_eq!(calls.get(), 1);
    }
}
