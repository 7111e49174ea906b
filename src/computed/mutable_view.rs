//! Two-way bindings: a cell whose forward value is computed from other
//! cells, and whose assignment runs a user-supplied reverse computation
//! that writes back to those same cells.

use std::cell::{Cell as StdCell, RefCell};
use std::rc::Rc;

use crate::cell::{Cell, SettableCell, Tracked};
use crate::cell_state::{
    add_observer_with_lifecycle, remove_observer_with_lifecycle, CellLifecycle, CellStateBase,
    DynCell, Observer, ObserverRef,
};
use crate::computed::ComputeArgs;
use crate::error::{CellError, ComputeOutcome};
use crate::key::{KeyRef, UniqueKey};
use crate::propagation::PropagationState;
use crate::registry::{self, Batched};
use crate::tracker;

type Slot<T> = Option<Result<T, CellError>>;

// ---------------------------------------------------------------------
// Fixed-argument mutable view (`mutable_computed` / `cell_view`)
// ---------------------------------------------------------------------

pub(crate) struct StaticMutableCellState<T, Args, F, R> {
    base: CellStateBase,
    prop: RefCell<PropagationState>,
    args: Args,
    compute: F,
    reverse: R,
    slot: RefCell<Slot<T>>,
    stale: StdCell<bool>,
    /// Suppresses the propagation wave a reverse-triggered write to `args`
    /// would otherwise bounce back through this cell's own observer
    /// registration on those same args.
    reverse_in_progress: StdCell<bool>,
    pending_changed: StdCell<bool>,
}

impl<T, Args, F, R> StaticMutableCellState<T, Args, F, R>
where
    Args: ComputeArgs,
    F: Fn(Args::Values) -> Result<T, ComputeOutcome>,
    R: Fn(&Args, T),
    T: Clone + 'static,
{
    fn recompute(&self) {
        match (self.compute)(self.args.values()) {
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
}

impl<T, Args, F, R> Batched for StaticMutableCellState<T, Args, F, R>
where
    Args: ComputeArgs,
    F: Fn(Args::Values) -> Result<T, ComputeOutcome>,
    R: Fn(&Args, T),
    T: Clone + 'static,
{
    fn run_deferred_update(&self) {
        let changed = self.pending_changed.replace(false);
        self.stale.set(true);
        self.base.notify_update(changed);
    }
}

impl<T, Args, F, R> CellLifecycle for StaticMutableCellState<T, Args, F, R>
where
    Args: ComputeArgs,
    F: Fn(Args::Values) -> Result<T, ComputeOutcome> + 'static,
    R: Fn(&Args, T) + 'static,
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

impl<T, Args, F, R> Observer for StaticMutableCellState<T, Args, F, R>
where
    Args: ComputeArgs,
    F: Fn(Args::Values) -> Result<T, ComputeOutcome>,
    R: Fn(&Args, T),
    T: Clone + 'static,
{
    fn will_update(self: Rc<Self>, _source: &KeyRef) {
        if self.reverse_in_progress.get() {
            return;
        }
        let mut prop = self.prop.borrow_mut();
        prop.handle_will_update(|| {}, || self.base.notify_will_update());
    }

    fn update(self: Rc<Self>, _source: &KeyRef, changed: bool) {
        if self.reverse_in_progress.get() {
            return;
        }
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

/// A cell whose value is computed from a fixed set of argument cells and
/// which can also be assigned directly, running `reverse` to push the
/// assignment back onto those arguments.
#[derive(Clone)]
pub struct StaticMutableComputeCell<T, Args, F, R> {
    state: Rc<StaticMutableCellState<T, Args, F, R>>,
}

impl<T, Args, F, R> StaticMutableComputeCell<T, Args, F, R>
where
    Args: ComputeArgs + 'static,
    F: Fn(Args::Values) -> Result<T, ComputeOutcome> + 'static,
    R: Fn(&Args, T) + 'static,
    T: Clone + 'static,
{
    pub fn new(args: Args, compute: F, reverse: R) -> Self {
        StaticMutableComputeCell {
            state: Rc::new(StaticMutableCellState {
                base: CellStateBase::new(KeyRef::new(UniqueKey::new())),
                prop: RefCell::new(PropagationState::new()),
                args,
                compute,
                reverse,
                slot: RefCell::new(None),
                stale: StdCell::new(true),
                reverse_in_progress: StdCell::new(false),
                pending_changed: StdCell::new(false),
            }),
        }
    }

    /// Assigns a new value, running the reverse computation to write it
    /// back to this cell's arguments.
    pub fn set(&self, new_value: T) {
        self.state.base.notify_will_update();

        self.state.reverse_in_progress.set(true);
        let args = &self.state.args;
        let reverse = &self.state.reverse;
        let value = new_value.clone();
        registry::batch(|| {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                reverse(args, value);
            }));
        });
        self.state.reverse_in_progress.set(false);

        *self.state.slot.borrow_mut() = Some(Ok(new_value));

        if registry::is_batching() {
            self.state.stale.set(true);
            self.state.pending_changed.set(true);
            let id = Rc::as_ptr(&self.state) as *const () as usize;
            registry::enqueue_batched(id, self.state.clone());
        } else {
            self.state.stale.set(false);
            self.state.base.notify_update(true);
        }
    }
}

impl<T, Args, F, R> Cell for StaticMutableComputeCell<T, Args, F, R>
where
    Args: ComputeArgs + 'static,
    F: Fn(Args::Values) -> Result<T, ComputeOutcome> + 'static,
    R: Fn(&Args, T) + 'static,
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

impl<T, Args, F, R> SettableCell for StaticMutableComputeCell<T, Args, F, R>
where
    Args: ComputeArgs + 'static,
    F: Fn(Args::Values) -> Result<T, ComputeOutcome> + 'static,
    R: Fn(&Args, T) + 'static,
    T: Clone + 'static,
{
    fn set_value(&self, value: T) {
        self.set(value);
    }
}

/// Creates a two-way bound cell from a fixed set of argument cells:
/// `compute` derives its forward value, `reverse` writes an assignment
/// back onto `args`.
pub fn mutable_computed<Args, T, F, R>(
    args: Args,
    compute: F,
    reverse: R,
) -> StaticMutableComputeCell<T, Args, F, R>
where
    Args: ComputeArgs + 'static,
    F: Fn(Args::Values) -> Result<T, ComputeOutcome> + 'static,
    R: Fn(&Args, T) + 'static,
    T: Clone + 'static,
{
    StaticMutableComputeCell::new(args, compute, reverse)
}

// ---------------------------------------------------------------------
// Stateless mutable view (`cell_view`)
// ---------------------------------------------------------------------

/// A two-way bound view with no cache of its own: `value()` re-runs
/// `compute` against the arguments' current values on every call, and
/// `add_observer`/`remove_observer` forward directly onto those arguments
/// rather than this cell holding any observer state. Cheaper than
/// [`mutable_computed`] when the view is read rarely relative to how often
/// its arguments change, since there is nothing to keep in sync.
#[derive(Clone)]
pub struct CellView<Args, T, F, R> {
    key: KeyRef,
    args: Args,
    compute: Rc<F>,
    reverse: Rc<R>,
    _marker: std::marker::PhantomData<T>,
}

impl<Args, T, F, R> CellView<Args, T, F, R>
where
    Args: ComputeArgs + 'static,
    F: Fn(Args::Values) -> Result<T, ComputeOutcome> + 'static,
    R: Fn(&Args, T) + 'static,
    T: Clone + 'static,
{
    pub fn new(args: Args, compute: F, reverse: R) -> Self {
        CellView {
            key: KeyRef::new(UniqueKey::new()),
            args,
            compute: Rc::new(compute),
            reverse: Rc::new(reverse),
            _marker: std::marker::PhantomData,
        }
    }

    /// Runs `reverse` inside its own batch scope, so however many of this
    /// view's arguments it assigns only produce one wave each, then swallows
    /// any panic it raises (the forward recompute the next `value()` call
    /// performs is unaffected either way, since this cell holds no cache to
    /// have gotten out of sync).
    pub fn set(&self, new_value: T) {
        let args = &self.args;
        let reverse = &self.reverse;
        let value = new_value;
        registry::batch(|| {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                reverse(args, value);
            }));
        });
    }
}

impl<Args, T, F, R> Cell for CellView<Args, T, F, R>
where
    Args: ComputeArgs + 'static,
    F: Fn(Args::Values) -> Result<T, ComputeOutcome> + 'static,
    R: Fn(&Args, T) + 'static,
    T: Clone + 'static,
{
    type Value = T;

    fn key(&self) -> KeyRef {
        self.key.clone()
    }

    fn value(&self) -> T {
        match (self.compute)(self.args.values()) {
            Ok(v) => v,
            Err(ComputeOutcome::Skip) => panic!("{}", CellError::Uninitialized),
            Err(ComputeOutcome::Err(e)) => panic!("{}", CellError::Compute(e.into())),
        }
    }

    fn add_observer(&self, observer: ObserverRef) {
        self.args.register(observer);
    }

    fn remove_observer(&self, observer: &ObserverRef) {
        self.args.deregister(observer);
    }
}

impl<Args, T, F, R> SettableCell for CellView<Args, T, F, R>
where
    Args: ComputeArgs + 'static,
    F: Fn(Args::Values) -> Result<T, ComputeOutcome> + 'static,
    R: Fn(&Args, T) + 'static,
    T: Clone + 'static,
{
    fn set_value(&self, value: T) {
        self.set(value);
    }
}

/// Creates a two-way bound view with no cache of its own: `compute` re-runs
/// on every `value()` call, and `reverse` writes an assignment back onto
/// `args` inside its own batch scope.
pub fn cell_view<Args, T, F, R>(args: Args, compute: F, reverse: R) -> CellView<Args, T, F, R>
where
    Args: ComputeArgs + 'static,
    F: Fn(Args::Values) -> Result<T, ComputeOutcome> + 'static,
    R: Fn(&Args, T) + 'static,
    T: Clone + 'static,
{
    CellView::new(args, compute, reverse)
}

// ---------------------------------------------------------------------
// Dynamically-tracked mutable view (`mutable_computed_dyn`)
// ---------------------------------------------------------------------

pub(crate) struct DynamicMutableCellState<T, F, R> {
    base: CellStateBase,
    prop: RefCell<PropagationState>,
    compute: F,
    reverse: R,
    slot: RefCell<Slot<T>>,
    stale: StdCell<bool>,
    deps: RefCell<Vec<Rc<dyn DynCell>>>,
    reverse_in_progress: StdCell<bool>,
    pending_changed: StdCell<bool>,
}

impl<T, F, R> Batched for DynamicMutableCellState<T, F, R>
where
    F: Fn(&Tracked) -> Result<T, ComputeOutcome>,
    R: Fn(&Tracked, T),
    T: Clone + 'static,
{
    fn run_deferred_update(&self) {
        let changed = self.pending_changed.replace(false);
        self.base.notify_update(changed);
    }
}

impl<T, F, R> DynamicMutableCellState<T, F, R>
where
    F: Fn(&Tracked) -> Result<T, ComputeOutcome>,
    R: Fn(&Tracked, T),
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

impl<T, F, R> CellLifecycle for DynamicMutableCellState<T, F, R>
where
    F: Fn(&Tracked) -> Result<T, ComputeOutcome>,
    R: Fn(&Tracked, T),
    T: Clone + 'static,
{
    fn init(self: &Rc<Self>) {
        // Dependencies aren't known until the first recompute; prime them
        // immediately rather than waiting for the first external `value()`
        // call, same as `DynamicComputeCellState::init`.
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

impl<T, F, R> Observer for DynamicMutableCellState<T, F, R>
where
    F: Fn(&Tracked) -> Result<T, ComputeOutcome>,
    R: Fn(&Tracked, T),
    T: Clone + 'static,
{
    fn will_update(self: Rc<Self>, _source: &KeyRef) {
        if self.reverse_in_progress.get() {
            return;
        }
        let mut prop = self.prop.borrow_mut();
        prop.handle_will_update(|| {}, || self.base.notify_will_update());
    }

    fn update(self: Rc<Self>, _source: &KeyRef, changed: bool) {
        if self.reverse_in_progress.get() {
            return;
        }
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

/// A two-way bound cell whose forward dependencies are discovered at
/// recompute time, like [`crate::computed::dynamic_cell::DynamicComputeCell`].
#[derive(Clone)]
pub struct DynamicMutableComputeCell<T, F, R> {
    state: Rc<DynamicMutableCellState<T, F, R>>,
}

impl<T, F, R> DynamicMutableComputeCell<T, F, R>
where
    F: Fn(&Tracked) -> Result<T, ComputeOutcome> + 'static,
    R: Fn(&Tracked, T) + 'static,
    T: Clone + 'static,
{
    pub fn new(compute: F, reverse: R) -> Self {
        DynamicMutableComputeCell {
            state: Rc::new(DynamicMutableCellState {
                base: CellStateBase::new(KeyRef::new(UniqueKey::new())),
                prop: RefCell::new(PropagationState::new()),
                compute,
                reverse,
                slot: RefCell::new(None),
                stale: StdCell::new(true),
                deps: RefCell::new(Vec::new()),
                reverse_in_progress: StdCell::new(false),
                pending_changed: StdCell::new(false),
            }),
        }
    }

    /// Assigns a new value, running the reverse computation under its own
    /// batch scope so that however many cells it writes to only produce one
    /// wave each.
    pub fn set(&self, new_value: T) {
        self.state.base.notify_will_update();

        self.state.reverse_in_progress.set(true);
        let reverse = &self.state.reverse;
        let value = new_value.clone();
        registry::batch(|| {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                reverse(&Tracked, value);
            }));
        });
        self.state.reverse_in_progress.set(false);

        *self.state.slot.borrow_mut() = Some(Ok(new_value));
        self.state.stale.set(false);

        if registry::is_batching() {
            self.state.pending_changed.set(true);
            let id = Rc::as_ptr(&self.state) as *const () as usize;
            registry::enqueue_batched(id, self.state.clone());
        } else {
            self.state.base.notify_update(true);
        }
    }
}

impl<T, F, R> Cell for DynamicMutableComputeCell<T, F, R>
where
    F: Fn(&Tracked) -> Result<T, ComputeOutcome> + 'static,
    R: Fn(&Tracked, T) + 'static,
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

impl<T, F, R> SettableCell for DynamicMutableComputeCell<T, F, R>
where
    F: Fn(&Tracked) -> Result<T, ComputeOutcome> + 'static,
    R: Fn(&Tracked, T) + 'static,
    T: Clone + 'static,
{
    fn set_value(&self, value: T) {
        self.set(value);
    }
}

/// Creates a two-way bound cell whose forward computation discovers its
/// own dependencies, like [`crate::computed::dynamic_cell::computed_dyn`].
pub fn mutable_computed_dyn<T, F, R>(compute: F, reverse: R) -> DynamicMutableComputeCell<T, F, R>
where
    F: Fn(&Tracked) -> Result<T, ComputeOutcome> + 'static,
    R: Fn(&Tracked, T) + 'static,
    T: Clone + 'static,
{
    DynamicMutableComputeCell::new(compute, reverse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutable::variable;

    #[test]
    fn round_trips_through_reverse_computation() {
        let celsius = variable(0.0_f64);

        let fahrenheit = mutable_computed(
            (celsius.clone(),),
            |(c,)| Ok(c * 9.0 / 5.0 + 32.0),
            |(c,): &(crate::mutable::MutableCell<f64>,), f: f64| c.set((f - 32.0) * 5.0 / 9.0),
        );

        assert_eq!(fahrenheit.value(), 32.0);

        fahrenheit.set(212.0);
        assert_eq!(celsius.value(), 100.0);
        assert_eq!(fahrenheit.value(), 100.0 * 9.0 / 5.0 + 32.0);
    }

    #[test]
    fn cell_view_recomputes_on_every_read_and_writes_through_reverse() {
        let inches = variable(12.0_f64);

        let cm = cell_view(
            (inches.clone(),),
            |(i,)| Ok(i * 2.54),
            |(i,): &(crate::mutable::MutableCell<f64>,), v: f64| i.set(v / 2.54),
        );

        assert_eq!(cm.value(), 12.0 * 2.54);
        cm.set(100.0);
        assert_eq!(inches.value(), 100.0 / 2.54);
        assert_eq!(cm.value(), 100.0);
    }
}
