//! Imperative side effects driven by the graph: a watcher runs once
//! immediately (recording whatever cells it reads as dependencies), then
//! reruns whenever any of those cells actually changes.

use std::cell::{Cell as StdCell, RefCell};
use std::rc::Rc;

use crate::cell::Tracked;
use crate::cell_state::{DynCell, Observer, ObserverRef};
use crate::key::KeyRef;
use crate::propagation::PropagationState;
use crate::tracker;

struct WatcherState<F> {
    prop: RefCell<PropagationState>,
    callback: RefCell<F>,
    deps: RefCell<Vec<Rc<dyn DynCell>>>,
    stopped: StdCell<bool>,
}

impl<F: FnMut(&Tracked) + 'static> WatcherState<F> {
    fn run(self: &Rc<Self>) {
        if self.stopped.get() {
            return;
        }

        let (_, new_deps) = tracker::with_tracking(|| (self.callback.borrow_mut())(&Tracked));
        self.rebind_dependencies(new_deps);
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

impl<F: FnMut(&Tracked) + 'static> Observer for WatcherState<F> {
    fn will_update(self: Rc<Self>, _source: &KeyRef) {
        let mut prop = self.prop.borrow_mut();
        prop.handle_will_update(|| {}, || {});
    }

    fn update(self: Rc<Self>, _source: &KeyRef, changed: bool) {
        let mut prop = self.prop.borrow_mut();
        let this = self.clone();
        prop.handle_update(
            changed,
            || true,
            move |changed| {
                if changed {
                    this.run();
                }
            },
            || {},
        );
    }
}

/// A handle to a running watcher. Dropping it, or calling [`stop`](Self::stop)
/// explicitly, unsubscribes the watcher from everything it was observing;
/// it will not run again.
pub struct WatchHandle<F> {
    state: Rc<WatcherState<F>>,
}

impl<F: FnMut(&Tracked) + 'static> WatchHandle<F> {
    /// Stops the watcher early. Idempotent.
    pub fn stop(&self) {
        if self.state.stopped.replace(true) {
            return;
        }
        let observer: ObserverRef = self.state.clone();
        for dep in self.state.deps.borrow_mut().drain(..) {
            dep.remove_observer(&observer);
        }
    }
}

impl<F> Drop for WatchHandle<F> {
    fn drop(&mut self) {
        if !self.state.stopped.replace(true) {
            let observer: ObserverRef = self.state.clone();
            for dep in self.state.deps.borrow_mut().drain(..) {
                dep.remove_observer(&observer);
            }
        }
    }
}

/// Runs `f` immediately, tracking whichever cells it reads through the
/// given [`Tracked`] handle as dependencies, then reruns it every time one
/// of those cells actually changes. Returns a handle that stops the
/// watcher when dropped or when [`WatchHandle::stop`] is called.
pub fn watch<F: FnMut(&Tracked) + 'static>(f: F) -> WatchHandle<F> {
    let state = Rc::new(WatcherState {
        prop: RefCell::new(PropagationState::new()),
        callback: RefCell::new(f),
        deps: RefCell::new(Vec::new()),
        stopped: StdCell::new(false),
    });

    state.run();

    WatchHandle { state }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutable::variable;

    #[test]
    fn runs_immediately_and_on_change() {
        let a = variable(1);
        let seen = Rc::new(StdCell::new(0));
        let seen2 = seen.clone();
        let a2 = a.clone();

        let _handle = watch(move |t| {
            seen2.set(t.track(&a2));
        });

        assert_eq!(seen.get(), 1);
        a.set(42);
        assert_eq!(seen.get(), 42);
    }

    #[test]
    fn stops_on_drop() {
        let a = variable(1);
        let seen = Rc::new(StdCell::new(0));
        let seen2 = seen.clone();
        let a2 = a.clone();

        let handle = watch(move |t| {
            seen2.set(t.track(&a2));
        });
        assert_eq!(seen.get(), 1);

        handle.stop();
        a.set(99);
        assert_eq!(seen.get(), 1, "watcher must not run after being stopped");
    }
}
