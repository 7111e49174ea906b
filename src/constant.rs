//! A cell holding a value that never changes.

use crate::cell::Cell;
use crate::cell_state::ObserverRef;
use crate::key::{KeyRef, ValueKey};

/// A cell whose value is fixed at construction. Adding or removing
/// observers is a no-op since the value never changes, so there is never
/// anything to notify.
///
/// Two `ConstCell`s holding equal values share the same key, but since a
/// constant cell carries no observer state at all there's nothing to
/// actually share; the shared key only matters if a constant is used as an
/// argument key elsewhere in the graph.
#[derive(Clone)]
pub struct ConstCell<T> {
    value: T,
}

impl<T: Clone + Eq + std::hash::Hash + std::fmt::Debug + 'static> ConstCell<T> {
    pub fn new(value: T) -> Self {
        ConstCell { value }
    }
}

impl<T: Clone + Eq + std::hash::Hash + std::fmt::Debug + 'static> Cell for ConstCell<T> {
    type Value = T;

    fn key(&self) -> KeyRef {
        KeyRef::new(ValueKey(self.value.clone()))
    }

    fn value(&self) -> T {
        self.value.clone()
    }

    fn add_observer(&self, _observer: ObserverRef) {}

    fn remove_observer(&self, _observer: &ObserverRef) {}
}

/// Creates a cell holding a constant value.
pub fn constant<T: Clone + Eq + std::hash::Hash + std::fmt::Debug + 'static>(value: T) -> ConstCell<T> {
    ConstCell::new(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_its_value() {
        let c = constant(42);
        assert_eq!(c.value(), 42);
    }

    #[test]
    fn equal_values_share_a_key() {
        assert_eq!(constant(1).key(), constant(1).key());
        assert_ne!(constant(1).key(), constant(2).key());
    }
}
