//! Reifies whether reading a cell succeeded, instead of letting a failed
//! compute surface as a panic.

use std::fmt;
use std::rc::Rc;

use crate::cell::{Cell, SettableCell};
use crate::cell_state::ObserverRef;
use crate::error::CellError;
use crate::key::{KeyRef, ValueKey};

/// The outcome of reading a cell's value: either the value itself, or the
/// error its last compute attempt produced.
///
/// Distinct from the crate's internal short-circuit sentinel
/// ([`crate::error::ComputeOutcome`]) — that one only ever exists inside a
/// compute closure and is never observed by a caller; `Maybe` is the
/// public, caller-visible reification of failure.
#[derive(Debug, Clone)]
pub enum Maybe<T> {
    Ok(T),
    Err(CellError),
}

impl<T> Maybe<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Maybe::Ok(_))
    }

    pub fn unwrap(self) -> T {
        match self {
            Maybe::Ok(v) => v,
            Maybe::Err(e) => panic!("{e}"),
        }
    }
}

impl<T> From<Maybe<T>> for Result<T, CellError> {
    fn from(m: Maybe<T>) -> Self {
        match m {
            Maybe::Ok(v) => Ok(v),
            Maybe::Err(e) => Err(e),
        }
    }
}

#[derive(Debug)]
struct PanicError(String);

impl fmt::Display for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for PanicError {}

fn describe_panic(payload: Box<dyn std::any::Any + Send>) -> CellError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "cell computation failed".to_string());
    CellError::compute(PanicError(message))
}

/// A cell that reads `inner`'s value but, instead of propagating a failed
/// compute as a panic, reifies it as `Maybe::Err`.
#[derive(Clone)]
pub struct MaybeCell<C> {
    inner: C,
}

impl<C: Cell + 'static> MaybeCell<C> {
    pub fn new(inner: C) -> Self {
        MaybeCell { inner }
    }
}

impl<C: Cell + 'static> Cell for MaybeCell<C> {
    type Value = Maybe<C::Value>;

    fn key(&self) -> KeyRef {
        KeyRef::new(ValueKey(format!("maybe({:?})", self.inner.key())))
    }

    fn value(&self) -> Maybe<C::Value> {
        let inner = &self.inner;
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| inner.value())) {
            Ok(v) => Maybe::Ok(v),
            Err(payload) => Maybe::Err(describe_panic(payload)),
        }
    }

    fn add_observer(&self, observer: ObserverRef) {
        self.inner.add_observer(observer);
    }

    fn remove_observer(&self, observer: &ObserverRef) {
        self.inner.remove_observer(observer);
    }
}

/// Wraps `cell` so reading its value never panics: a failed compute is
/// reported as `Maybe::Err` instead.
pub fn maybe_cell<C: Cell + 'static>(cell: C) -> MaybeCell<C> {
    MaybeCell::new(cell)
}

impl<C: SettableCell + 'static> MaybeCell<C> {
    /// Assigns `inner` when given `Maybe::Ok`; a `Maybe::Err` write is
    /// silently dropped, since there is no value to forward.
    pub fn set(&self, value: Maybe<C::Value>) {
        if let Maybe::Ok(v) = value {
            self.inner.set_value(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::computed::static_cell::computed1;
    use crate::mutable::variable;
    use crate::error::ComputeOutcome;

    #[test]
    fn reifies_success() {
        let a = variable(2);
        let doubled = computed1(a, |a| Ok(a * 2));
        let m = maybe_cell(doubled);
        assert!(matches!(m.value(), Maybe::Ok(4)));
    }

    #[test]
    fn reifies_failure_without_panicking() {
        let a = variable(-1);
        let checked = computed1(a, |a| {
            if a < 0 {
                Err(ComputeOutcome::Err("negative".into()))
            } else {
                Ok(a)
            }
        });
        let m = maybe_cell(checked);
        assert!(!m.value().is_ok());
    }

    #[test]
    fn mutable_form_forwards_ok_and_drops_err() {
        let a = variable(1);
        let m = maybe_cell(a.clone());

        m.set(Maybe::Ok(5));
        assert_eq!(a.value(), 5);

        m.set(Maybe::Err(CellError::Uninitialized));
        assert_eq!(a.value(), 5, "an Err write must be dropped, not forwarded");
    }
}
