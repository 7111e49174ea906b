//! Cells whose value is derived from other cells: the fixed-argument
//! ([`static_cell`]) and dynamically-tracked ([`dynamic_cell`]) compute
//! cells, and the two-way-binding mutable view ([`mutable_view`]).

pub mod dynamic_cell;
pub mod mutable_view;
pub mod static_cell;

use crate::cell::Cell;
use crate::cell_state::ObserverRef;

/// A fixed tuple of argument cells a [`static_cell`] computes from.
///
/// Implemented for tuples of arity 1 through 4, which covers the
/// `computed1..computed4` constructors; anything needing more arguments, or
/// a variable/unknown set of arguments, wants
/// [`dynamic_cell`](crate::computed::dynamic_cell) instead.
pub trait ComputeArgs: Clone {
    type Values;

    fn values(&self) -> Self::Values;
    fn register(&self, observer: ObserverRef);
    fn deregister(&self, observer: &ObserverRef);
}

macro_rules! impl_compute_args {
    ($($idx:tt : $name:ident),+) => {
        impl<$($name: Cell + 'static),+> ComputeArgs for ($($name,)+) {
            type Values = ($($name::Value,)+);

            fn values(&self) -> Self::Values {
                ($(self.$idx.value(),)+)
            }

            fn register(&self, observer: ObserverRef) {
                $(self.$idx.add_observer(observer.clone());)+
                let _ = &observer;
            }

            fn deregister(&self, observer: &ObserverRef) {
                $(self.$idx.remove_observer(observer);)+
            }
        }
    };
}

impl_compute_args!(0: A);
impl_compute_args!(0: A, 1: B);
impl_compute_args!(0: A, 1: B, 2: C);
impl_compute_args!(0: A, 1: B, 2: C, 3: D);
