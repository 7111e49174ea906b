//! The public [`Cell`] trait every cell flavor implements, and the
//! [`Tracked`] handle passed into dynamic compute/watcher closures so they
//! can read other cells while being recorded as dependencies.

use std::rc::Rc;

use crate::cell_state::{DynCell, ObserverRef};
use crate::key::KeyRef;
use crate::tracker;

/// A node in the reactive graph holding a value of type `Value`.
///
/// Cloning a `Cell` is always a cheap handle copy (an `Rc` bump, typically)
/// — it never duplicates the underlying state, which is shared and
/// reference-counted in the registry.
pub trait Cell: Clone {
    type Value: Clone;

    /// This cell's identity. Two cells with equal keys share one state.
    fn key(&self) -> KeyRef;

    /// The cell's current value, recomputing it first if necessary.
    ///
    /// If the cell's last compute attempt produced an error, this panics
    /// with that error's message. Use [`crate::derived::maybe_cell`] to
    /// observe failure without unwinding.
    fn value(&self) -> Self::Value;

    fn add_observer(&self, observer: ObserverRef);
    fn remove_observer(&self, observer: &ObserverRef);
}

/// Type-erases a `Cell` down to a `DynCell` so it can sit in a
/// heterogeneous dependency set (the tracker, a dynamic compute cell's
/// argument list).
pub(crate) struct CellAdapter<C>(pub C);

impl<C: Cell + 'static> std::fmt::Debug for CellAdapter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CellAdapter({:?})", self.0.key())
    }
}

impl<C: Cell + 'static> DynCell for CellAdapter<C> {
    fn key(&self) -> KeyRef {
        self.0.key()
    }

    fn add_observer(&self, observer: ObserverRef) {
        self.0.add_observer(observer);
    }

    fn remove_observer(&self, observer: &ObserverRef) {
        self.0.remove_observer(observer);
    }
}

/// A [`Cell`] that can also be assigned to. Kept separate from `Cell`
/// itself (rather than folding `set_value` into it) because constant and
/// purely-derived cells never implement it — only the mutable leaf and
/// view flavors do.
pub trait SettableCell: Cell {
    fn set_value(&self, value: Self::Value);
}

/// Passed into dynamic compute cell and watcher closures. Reading a cell
/// through `track` both returns its value and records the cell as a
/// dependency of the current recomputation.
#[derive(Clone, Copy)]
pub struct Tracked;

impl Tracked {
    pub fn track<C: Cell + 'static>(&self, cell: &C) -> C::Value {
        tracker::track(Rc::new(CellAdapter(cell.clone())));
        cell.value()
    }
}
