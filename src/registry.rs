//! The per-thread graph state: a weak-referenced table mapping keys to
//! cell states (so non-unique keys are shared, and cells with no observers
//! and no live handle are garbage), plus the batching machinery `batch()`
//! and mutable cells build on.
//!
//! A `thread_local!` `GraphContext`, per this crate's single-threaded
//! design: every cell created on a thread lives in that thread's graph,
//! and `Cell` handles are `!Send` so one never strays onto another.

use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::trace;
use rustc_hash::FxHashMap;

use crate::key::KeyRef;

/// Anything that can finish a deferred update once a batch ends.
pub(crate) trait Batched {
    fn run_deferred_update(&self);
}

#[derive(Default)]
struct BatchState {
    depth: u32,
    pending: Vec<(usize, Rc<dyn Batched>)>,
}

#[derive(Default)]
pub(crate) struct GraphContext {
    states: RefCell<FxHashMap<KeyRef, Weak<dyn Any>>>,
    batch: RefCell<BatchState>,
}

thread_local! {
    static GRAPH: GraphContext = GraphContext::default();
}

/// Looks up the live state registered under `key`, or builds and registers
/// one with `build` if none exists (or the previous one has been dropped).
/// Unique keys always build fresh and are never registered, since by
/// definition nothing else could ever look them up again.
pub(crate) fn get_or_build<S: Any + 'static>(key: KeyRef, build: impl FnOnce() -> Rc<S>) -> Rc<S> {
    if key.is_unique() {
        return build();
    }

    GRAPH.with(|graph| {
        let mut states = graph.states.borrow_mut();
        if let Some(existing) = states.get(&key).and_then(Weak::upgrade) {
            trace!("reusing cell state for {key:?}");
            return existing
                .downcast::<S>()
                .unwrap_or_else(|_| panic!("key {key:?} reused with a different state type"));
        }

        trace!("building cell state for {key:?}");
        let state = build();
        states.insert(key, Rc::downgrade(&(state.clone() as Rc<dyn Any>)));
        state
    })
}

fn enter_batch() {
    GRAPH.with(|graph| graph.batch.borrow_mut().depth += 1);
}

/// Leaves one level of batch nesting, draining and running the pending
/// deferred updates if this was the outermost level.
fn exit_batch() {
    let pending = GRAPH.with(|graph| {
        let mut batch = graph.batch.borrow_mut();
        batch.depth -= 1;
        if batch.depth == 0 {
            std::mem::take(&mut batch.pending)
        } else {
            Vec::new()
        }
    });

    for (_, cell) in pending {
        cell.run_deferred_update();
    }
}

/// Runs `f` with batched writes: mutable cell assignments inside `f` apply
/// immediately, but the resulting `update` notifications are deferred until
/// the outermost `batch()` call returns, so a cell written to multiple
/// times only notifies its observers once. Nested `batch()` calls collapse
/// into the outer one.
pub fn batch(f: impl FnOnce()) {
    enter_batch();
    f();
    exit_batch();
}

/// A scoped, RAII form of [`batch`]: batching starts when the guard is
/// created and ends when it is dropped, rather than being scoped to a
/// closure. Useful when the writes to batch don't fit neatly inside one
/// `FnOnce` body (e.g. they're spread across several methods of a type
/// that itself holds the guard for its lifetime).
///
/// ```
/// use reactive_cells::{variable, BatchGuard};
///
/// let a = variable(1);
/// {
///     let _guard = BatchGuard::new();
///     a.set(2);
///     a.set(3);
/// } // update notifications fire here, once, as the guard drops.
/// assert_eq!(a.value(), 3);
/// ```
pub struct BatchGuard {
    _private: (),
}

impl BatchGuard {
    /// Opens a new batch scope. Nests the same way [`batch`] does: creating
    /// a `BatchGuard` while an outer `batch()`/`BatchGuard` is already open
    /// just increments the depth counter, and notifications still wait for
    /// the outermost scope to close.
    pub fn new() -> Self {
        enter_batch();
        BatchGuard { _private: () }
    }
}

impl Default for BatchGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        exit_batch();
    }
}

pub(crate) fn is_batching() -> bool {
    GRAPH.with(|graph| graph.batch.borrow().depth > 0)
}

/// Queues `cell`'s deferred update to run when the outermost batch ends.
/// Queuing the same cell (by pointer identity) twice in one batch is a
/// no-op: it will still only be updated once when the batch drains.
pub(crate) fn enqueue_batched(id: usize, cell: Rc<dyn Batched>) {
    GRAPH.with(|graph| {
        let mut batch = graph.batch.borrow_mut();
        if !batch.pending.iter().any(|(existing, _)| *existing == id) {
            batch.pending.push((id, cell));
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batching_nests_without_double_draining() {
        let ran = Rc::new(RefCell::new(0));

        struct Counter(Rc<RefCell<i32>>);
        impl Batched for Counter {
            fn run_deferred_update(&self) {
                *self.0.borrow_mut() += 1;
            }
        }

        let counter: Rc<dyn Batched> = Rc::new(Counter(ran.clone()));

        batch(|| {
            batch(|| {
                enqueue_batched(1, counter.clone());
            });
            assert_eq!(*ran.borrow(), 0, "inner batch must not drain yet");
        });

        assert_eq!(*ran.borrow(), 1);
    }

    #[test]
    fn batch_guard_drains_on_drop() {
        let ran = Rc::new(RefCell::new(0));

        struct Counter(Rc<RefCell<i32>>);
        impl Batched for Counter {
            fn run_deferred_update(&self) {
                *self.0.borrow_mut() += 1;
            }
        }

        let counter: Rc<dyn Batched> = Rc::new(Counter(ran.clone()));

        {
            let _guard = BatchGuard::new();
            enqueue_batched(1, counter.clone());
            assert_eq!(*ran.borrow(), 0, "guard must not drain before it drops");
        }

        assert_eq!(*ran.borrow(), 1);
    }

    #[test]
    fn batch_guard_nests_with_closure_form() {
        let ran = Rc::new(RefCell::new(0));

        struct Counter(Rc<RefCell<i32>>);
        impl Batched for Counter {
            fn run_deferred_update(&self) {
                *self.0.borrow_mut() += 1;
            }
        }

        let counter: Rc<dyn Batched> = Rc::new(Counter(ran.clone()));

        {
            let _guard = BatchGuard::new();
            batch(|| {
                enqueue_batched(1, counter.clone());
            });
            assert_eq!(*ran.borrow(), 0, "outer guard is still open; must not drain yet");
        }

        assert_eq!(*ran.borrow(), 1);
    }
}
