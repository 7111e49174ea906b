//! Thin arithmetic and comparison combinators over cells.
//!
//! Deliberately minimal: a real operator algebra (numeric promotion,
//! saturating vs. checked variants, the full boolean algebra) is explicitly
//! out of scope, but *some* way to write `a + b` over cells is needed for
//! the rest of the crate's examples and tests to read naturally.

use std::ops::{Add, Mul};

use crate::cell::Cell;
use crate::computed::static_cell::{computed1, computed2};

/// `a + b`, recomputed whenever either argument changes.
pub fn add<A, B, T>(
    a: A,
    b: B,
) -> impl Cell<Value = T>
where
    A: Cell + 'static,
    B: Cell + 'static,
    A::Value: Add<B::Value, Output = T>,
    T: Clone + 'static,
{
    computed2(a, b, |a, b| Ok(a + b))
}

/// `a * b`, recomputed whenever either argument changes.
pub fn mul<A, B, T>(
    a: A,
    b: B,
) -> impl Cell<Value = T>
where
    A: Cell + 'static,
    B: Cell + 'static,
    A::Value: Mul<B::Value, Output = T>,
    T: Clone + 'static,
{
    computed2(a, b, |a, b| Ok(a * b))
}

/// `!a`, recomputed whenever `a` changes.
pub fn not<A>(a: A) -> impl Cell<Value = bool>
where
    A: Cell<Value = bool> + 'static,
{
    computed1(a, |a| Ok(!a))
}

/// `a == b`, recomputed whenever either argument changes.
pub fn eq<A, B, T>(a: A, b: B) -> impl Cell<Value = bool>
where
    A: Cell<Value = T> + 'static,
    B: Cell<Value = T> + 'static,
    T: PartialEq + Clone + 'static,
{
    computed2(a, b, |a, b| Ok(a == b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutable::variable;

    #[test]
    fn add_tracks_both_arguments() {
        let a = variable(1);
        let b = variable(2);
        let sum = add(a.clone(), b.clone());
        assert_eq!(sum.value(), 3);
        a.set(10);
        assert_eq!(sum.value(), 12);
    }
}
