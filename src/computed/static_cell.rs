//! A compute cell whose argument cells are fixed at construction.

use std::cell::{Cell as StdCell, RefCell};
use std::rc::Rc;

use crate::cell::Cell;
use crate::cell_state::{
    add_observer_with_lifecycle, remove_observer_with_lifecycle, CellLifecycle, CellStateBase,
    Observer, ObserverRef,
};
use crate::computed::ComputeArgs;
use crate::error::{CellError, ComputeOutcome};
use crate::key::{KeyRef, UniqueKey, ValueKey};
use crate::propagation::PropagationState;
use crate::registry;

type Slot<T> = Option<Result<T, CellError>>;
type ComputeFn<Args, T> = Rc<dyn Fn(<Args as ComputeArgs>::Values) -> Result<T, ComputeOutcome>>;

/// The compute function is stored type-erased (`Rc<dyn Fn>`) rather than as
/// a generic parameter, so that `StaticComputeCellState<T, Args>` is one
/// concrete type regardless of which closure built it — which is what lets
/// two `computed` calls under an equal explicit key downcast to the *same*
/// state type in the registry, even though they were constructed with
/// distinct (if behaviorally identical) closures.
pub(crate) struct StaticComputeCellState<T, Args: ComputeArgs> {
    base: CellStateBase,
    prop: RefCell<PropagationState>,
    args: Args,
    compute: ComputeFn<Args, T>,
    slot: RefCell<Slot<T>>,
    stale: StdCell<bool>,
}

impl<T, Args> StaticComputeCellState<T, Args>
where
    Args: ComputeArgs,
    T: Clone + 'static,
{
    fn recompute(&self) {
        match (self.compute)(self.args.values()) {
            Ok(value) => *self.slot.borrow_mut() = Some(Ok(value)),
            Err(ComputeOutcome::Skip) => {
                // Preserve whatever value (or error) is already cached.
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
}

impl<T, Args> CellLifecycle for StaticComputeCellState<T, Args>
where
    Args: ComputeArgs + 'static,
    T: Clone + 'static,
{
    fn init(self: &Rc<Self>) {
        let observer: ObserverRef = self.clone();
        self.args.register(observer);
    }

    fn pause(self: &Rc<Self>) {
        let observer: ObserverRef = self.clone();
        self.args.deregister(&observer);
    }
}

impl<T, Args> Observer for StaticComputeCellState<T, Args>
where
    Args: ComputeArgs + 'static,
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

/// A cell computed, on demand, from a fixed set of argument cells.
#[derive(Clone)]
pub struct StaticComputeCell<T, Args: ComputeArgs> {
    state: Rc<StaticComputeCellState<T, Args>>,
}

impl<T, Args> StaticComputeCell<T, Args>
where
    Args: ComputeArgs + 'static,
    T: Clone + 'static,
{
    /// Builds a cell under a fresh, never-shared key. Two `computed` calls
    /// over the same argument cells get independent states, since there is
    /// no way to tell from the arguments alone whether two calls compute
    /// the same thing — only `with_key` can establish that two call sites
    /// are meant to share.
    pub fn new<F>(args: Args, compute: F) -> Self
    where
        F: Fn(Args::Values) -> Result<T, ComputeOutcome> + 'static,
    {
        Self::build(KeyRef::new(UniqueKey::new()), args, Rc::new(compute))
    }

    /// Builds a cell under an explicit key: two `computed` calls with an
    /// equal `key` share one state regardless of whether their argument
    /// cells or closures are the same, as long as they agree on `Args` and
    /// `T` (a key reused with an incompatible state type is a programmer
    /// error and triggers a panic from the registry).
    pub fn with_key<F>(key: KeyRef, args: Args, compute: F) -> Self
    where
        F: Fn(Args::Values) -> Result<T, ComputeOutcome> + 'static,
    {
        Self::build(key, args, Rc::new(compute))
    }

    fn build(key: KeyRef, args: Args, compute: ComputeFn<Args, T>) -> Self {
        let state = registry::get_or_build(key.clone(), || {
            Rc::new(StaticComputeCellState {
                base: CellStateBase::new(key),
                prop: RefCell::new(PropagationState::new()),
                args,
                compute,
                slot: RefCell::new(None),
                stale: StdCell::new(true),
            })
        });
        StaticComputeCell { state }
    }
}

impl<T, Args> Cell for StaticComputeCell<T, Args>
where
    Args: ComputeArgs + 'static,
    T: Clone + 'static,
{
    type Value = T;

    fn key(&self) -> KeyRef {
        self.state.base.key().clone()
    }

    fn value(&self) -> T {
        // Caching only pays off while this cell is itself observed: only
        // then is it registered on its own arguments and therefore able to
        // learn when they change. An unobserved compute cell always
        // recomputes fresh (see `store()` for a combinator that adds
        // caching back for cells nobody happens to be watching).
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

/// Creates a cell computed from one argument cell, under its own private
/// key. Two `computed1(a, f)` calls, even over an equal `a`, build
/// independent states — use [`StaticComputeCell::with_key`] to share.
pub fn computed1<A, T, F>(a: A, f: F) -> StaticComputeCell<T, (A,)>
where
    A: Cell + 'static,
    T: Clone + 'static,
    F: Fn(A::Value) -> Result<T, ComputeOutcome> + 'static,
{
    StaticComputeCell::new((a,), move |(a,)| f(a))
}

/// Creates a cell computed from two argument cells.
pub fn computed2<A, B, T, F>(a: A, b: B, f: F) -> StaticComputeCell<T, (A, B)>
where
    A: Cell + 'static,
    B: Cell + 'static,
    T: Clone + 'static,
    F: Fn(A::Value, B::Value) -> Result<T, ComputeOutcome> + 'static,
{
    StaticComputeCell::new((a, b), move |(a, b)| f(a, b))
}

/// Creates a cell computed from three argument cells.
pub fn computed3<A, B, C, T, F>(a: A, b: B, c: C, f: F) -> StaticComputeCell<T, (A, B, C)>
where
    A: Cell + 'static,
    B: Cell + 'static,
    C: Cell + 'static,
    T: Clone + 'static,
    F: Fn(A::Value, B::Value, C::Value) -> Result<T, ComputeOutcome> + 'static,
{
    StaticComputeCell::new((a, b, c), move |(a, b, c)| f(a, b, c))
}

/// Creates a cell computed from four argument cells.
pub fn computed4<A, B, C, D, T, F>(a: A, b: B, c: C, d: D, f: F) -> StaticComputeCell<T, (A, B, C, D)>
where
    A: Cell + 'static,
    B: Cell + 'static,
    C: Cell + 'static,
    D: Cell + 'static,
    T: Clone + 'static,
    F: Fn(A::Value, B::Value, C::Value, D::Value) -> Result<T, ComputeOutcome> + 'static,
{
    StaticComputeCell::new((a, b, c, d), move |(a, b, c, d)| f(a, b, c, d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutable::variable;

    #[test]
    fn recomputes_lazily_from_arguments() {
        let a = variable(2);
        let b = variable(3);
        let sum = computed2(a.clone(), b.clone(), |a, b| Ok(a + b));
        assert_eq!(sum.value(), 5);

        a.set(10);
        assert_eq!(sum.value(), 13);
    }

    #[test]
    fn none_preserves_previous_value() {
        let a = variable(1);
        let cell = computed1(a.clone(), |a| {
            if a < 0 {
                Err(ComputeOutcome::Skip)
            } else {
                Ok(a * 2)
            }
        });
        assert_eq!(cell.value(), 2);
        a.set(-1);
        assert_eq!(cell.value(), 2);
    }

    #[test]
    fn auto_keyed_calls_over_equal_arguments_do_not_share_state() {
        use std::cell::Cell as StdCell;

        // Two `computed1` calls over the same argument, but with different
        // compute functions, must never collide in the registry — sharing
        // by argument identity alone would silently apply the wrong
        // closure (or, across incompatible `T`/`Args`, panic on downcast).
        let a = variable(1);
        let calls = Rc::new(StdCell::new(0));
        let calls2 = calls.clone();
        let doubled = computed1(a.clone(), |a| Ok(a * 2));
        let negated = computed1(a.clone(), move |a| {
            calls2.set(calls2.get() + 1);
            Ok(-a)
        });

        assert_ne!(doubled.key(), negated.key());
        assert_eq!(doubled.value(), 2);
        assert_eq!(negated.value(), -1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn explicit_key_shares_state_across_distinct_closures() {
        use std::cell::Cell as StdCell;

        let key = KeyRef::new(ValueKey("shared-static"));
        let calls = Rc::new(StdCell::new(0));
        let a = variable(1);

        let build = |calls: Rc<StdCell<i32>>| {
            StaticComputeCell::with_key(key.clone(), (a.clone(),), move |(a,)| {
                calls.set(calls.get() + 1);
                Ok(a * 10)
            })
        };

        let c1 = build(calls.clone());
        let c2 = build(calls.clone());

        assert_eq!(c1.value(), 10);
        assert_eq!(calls.get(), 1);
        // c2 shares c1's cached state: reading it must not recompute.
        assert_eq!(c2.value(), 10);
        assert_eq!(calls.get(), 1);
    }
}
