//! A single-threaded reactive cell graph.
//!
//! Values live in [`Cell`]s: primitive leaves ([`constant`], [`variable`]),
//! cells computed from other cells ([`computed1`]..[`computed4`],
//! [`computed_dyn`]), and mutable *views* whose assignment runs a
//! user-supplied reverse computation ([`mutable_computed`], [`cell_view`]).
//! Observers attached to any cell are notified exactly when that cell's
//! value changes, with no intermediate (glitch) value ever visible from one
//! update wave — even across diamond-shaped dependency graphs, and even
//! when a dynamic cell's argument set differs from one recompute to the
//! next.
//!
//! ```
//! use reactive_cells::{variable, computed2, watch, Cell};
//!
//! let a = variable(1);
//! let b = variable(2);
//! let sum = computed2(a.clone(), b.clone(), |a, b| Ok(a + b));
//!
//! let seen = std::rc::Rc::new(std::cell::Cell::new(0));
//! let seen2 = seen.clone();
//! let _watch = watch(move |t| seen2.set(t.track(&sum)));
//! assert_eq!(seen.get(), 3);
//!
//! a.set(10);
//! assert_eq!(seen.get(), 12);
//! ```
//!
//! See the module docs for [`computed`] and [`derived`] for the rest of the
//! public surface, and [`propagation`] for how the engine collapses a
//! diamond-shaped update into exactly one notification per observer.

#![warn(rust_2018_idioms)]

mod cell;
mod cell_state;
pub mod computed;
mod constant;
pub mod derived;
mod error;
mod key;
mod mutable;
mod ops;
mod propagation;
mod registry;
mod tracker;
mod watcher;

pub use cell::{Cell, SettableCell, Tracked};
pub use cell_state::{DynCell, Observer, ObserverRef};
pub use computed::dynamic_cell::{computed_dyn, computed_dyn_with_key, DynamicComputeCell};
pub use computed::mutable_view::{
    cell_view, mutable_computed, mutable_computed_dyn, CellView, DynamicMutableComputeCell,
    StaticMutableComputeCell,
};
pub use computed::static_cell::{computed1, computed2, computed3, computed4, StaticComputeCell};
pub use constant::{constant, ConstCell};
pub use derived::{changes_only, maybe_cell, peek, previous, store, Maybe};
pub use error::{CellError, ComputeOutcome, ComputeResult};
pub use key::{Key, KeyRef, UniqueKey, ValueKey, ValueKey2};
pub use mutable::{variable, variable_with_key, MutableCell};
pub use ops::{add, eq, mul, not};
pub use registry::{batch, BatchGuard};
pub use watcher::{watch, WatchHandle};

/// Aborts the current compute, asking the cell to keep whatever value it
/// already has cached. Call only from inside a `computed`/`mutable_computed`
/// closure; the `?` form (`Err(none())`) is the usual way to use it from a
/// closure whose body isn't already written against [`ComputeResult`].
///
/// ```
/// use reactive_cells::{variable, computed1, none, Cell};
///
/// let a = variable(10);
/// let evens = computed1(a.clone(), |a| if a % 2 != 0 { Err(none()) } else { Ok(a) });
/// assert_eq!(evens.value(), 10);
/// a.set(7);
/// assert_eq!(evens.value(), 10, "odd write is skipped; previous value is kept");
/// a.set(4);
/// assert_eq!(evens.value(), 4);
/// ```
pub fn none() -> ComputeOutcome {
    ComputeOutcome::Skip
}
