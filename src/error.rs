//! The error taxonomy. `CellError` is what observers and `value()` callers
//! ultimately see; `ComputeOutcome` is the private sentinel a compute
//! closure returns to short-circuit, never exposed as a public error
//! variant (see [`crate::none`]).

use std::fmt;
use std::rc::Rc;

/// An error surfaced by reading a cell's value.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CellError {
    /// A `previous()` cell read before its argument has ever changed, or a
    /// mutable-view cell read before it has ever been assigned.
    #[error("cell has no value yet")]
    Uninitialized,

    /// A compute or reverse-compute function returned an error.
    #[error("{0}")]
    Compute(Rc<dyn std::error::Error>),
}

impl CellError {
    pub fn compute<E: std::error::Error + 'static>(err: E) -> Self {
        CellError::Compute(Rc::new(err))
    }
}

/// The result type a compute (or reverse-compute) closure returns.
///
/// Distinct from [`CellError`]: a compute function can *additionally*
/// abort without producing any error at all (see [`crate::none`]), which
/// is not something a caller reading `.value()` should ever see — the
/// cell's previous value is preserved instead. A sentinel return rather
/// than a thrown exception, so short-circuiting costs nothing on the hot
/// path.
pub type ComputeResult<T> = Result<T, ComputeOutcome>;

pub enum ComputeOutcome {
    /// Abort this computation; keep whatever value the cell already has.
    Skip,
    /// Abort this computation with an error; the cell's observers still
    /// run, and reading `.value()` will panic with this error (or, via
    /// [`crate::derived::maybe`], return it as a `Maybe::Err`).
    Err(Box<dyn std::error::Error>),
}

impl fmt::Debug for ComputeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeOutcome::Skip => write!(f, "ComputeOutcome::Skip"),
            ComputeOutcome::Err(e) => write!(f, "ComputeOutcome::Err({e})"),
        }
    }
}

impl<E: std::error::Error + 'static> From<E> for ComputeOutcome {
    fn from(err: E) -> Self {
        ComputeOutcome::Err(Box::new(err))
    }
}
