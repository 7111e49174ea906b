//! Records which cells a dynamic compute cell's or watcher's closure
//! actually read, so it can observe exactly those cells instead of a fixed
//! set declared up front. A thread-local stack of recording frames — a
//! frame per concurrently-unwinding recompute, since a compute function can
//! itself read a cell whose own lazy recompute reenters tracking.

use std::cell::RefCell;
use std::rc::Rc;

use crate::cell_state::DynCell;
use crate::key::KeyRef;

thread_local! {
    static FRAMES: RefCell<Vec<RefCell<Vec<Rc<dyn DynCell>>>>> = RefCell::new(Vec::new());
}

/// Records that `cell` was read as a dependency of the innermost active
/// recording frame, if any. Deduplicates by key so reading the same cell
/// twice in one computation only yields one dependency.
pub fn track(cell: Rc<dyn DynCell>) {
    FRAMES.with(|frames| {
        let frames = frames.borrow();
        if let Some(frame) = frames.last() {
            let mut frame = frame.borrow_mut();
            let key: KeyRef = cell.key();
            if !frame.iter().any(|c| c.key() == key) {
                frame.push(cell);
            }
        }
    });
}

/// Pops the innermost recording frame on drop, regardless of whether the
/// scope it guards exits normally or by unwinding. Without this, a compute
/// closure that panics (reachable since `value()` panics on a cached compute
/// error, and observer dispatch only swallows the panic one frame up via
/// `catch_unwind`) would leave a stale frame on the stack, silently
/// corrupting every tracking call made afterwards on this thread.
struct FrameGuard;

impl Drop for FrameGuard {
    fn drop(&mut self) {
        FRAMES.with(|frames| {
            frames.borrow_mut().pop();
        });
    }
}

/// Runs `f` with a fresh recording frame active, returning `f`'s result
/// together with the set of cells it read (in first-read order).
pub fn with_tracking<R>(f: impl FnOnce() -> R) -> (R, Vec<Rc<dyn DynCell>>) {
    FRAMES.with(|frames| frames.borrow_mut().push(RefCell::new(Vec::new())));
    let _guard = FrameGuard;
    let result = f();
    let deps = FRAMES.with(|frames| {
        frames
            .borrow()
            .last()
            .expect("tracking frame pushed above")
            .borrow()
            .clone()
    });
    (result, deps)
}
