//! The will_update/update counter pairing that collapses a diamond-shaped
//! dependency fan-in into exactly one observer notification per wave.
//!
//! A cell with two paths to a common ancestor (the textbook diamond: `a`
//! feeds both `b` and `c`, which both feed `d`) receives two
//! `will_update`/`update` calls per write to `a` — one per path. Without
//! this bookkeeping `d`'s own observers would be notified twice, and worse,
//! could observe `d` in a half-updated state between the two.

/// Counts in-flight `will_update`/`update` calls for a single cell and
/// decides when the cell's *own* observers should actually be notified:
/// only on the first `will_update` of a wave, and only on the last matching
/// `update`.
#[derive(Debug, Default)]
pub(crate) struct PropagationState {
    waiting: u32,
    any_changed: bool,
}

impl PropagationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call from `Observer::will_update`. `pre` runs once, before the cell's
    /// own observers are told a wave has started, only on the first
    /// `will_update` seen this wave. `notify` is the actual
    /// "tell my own observers" step, also run only once.
    pub fn handle_will_update(&mut self, pre: impl FnOnce(), notify: impl FnOnce()) {
        if self.waiting == 0 {
            pre();
            notify();
        }
        self.waiting += 1;
    }

    /// Call from `Observer::update`. `did_change` decides whether the final
    /// notification should report a change; it is only invoked once the
    /// last pending `will_update` has been matched, so a cell may use it to
    /// do expensive work (e.g. recompute-and-compare) exactly once per wave.
    /// `notify` is the actual "tell my own observers" step. `post` runs
    /// after, for any wave-scoped cleanup.
    pub fn handle_update(
        &mut self,
        changed: bool,
        did_change: impl FnOnce() -> bool,
        notify: impl FnOnce(bool),
        post: impl FnOnce(),
    ) {
        self.any_changed |= changed;
        debug_assert!(self.waiting > 0, "update() with no matching will_update()");
        self.waiting = self.waiting.saturating_sub(1);

        if self.waiting == 0 {
            let changed = self.any_changed && did_change();
            notify(changed);
            post();
            self.any_changed = false;
        }
    }

    #[cfg(test)]
    pub fn is_mid_wave(&self) -> bool {
        self.waiting > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn collapses_diamond_into_one_notification() {
        let state = Cell::new(PropagationState::new());
        let notify_count = Cell::new(0);
        let pre_count = Cell::new(0);

        // Two incoming paths: will_update fires twice.
        for _ in 0..2 {
            let mut s = state.take();
            s.handle_will_update(|| pre_count.set(pre_count.get() + 1), || {});
            state.set(s);
        }
        assert_eq!(pre_count.get(), 1);

        // First update() of the two must not notify yet.
        let mut s = state.take();
        s.handle_update(true, || true, |_| notify_count.set(notify_count.get() + 1), || {});
        state.set(s);
        assert_eq!(notify_count.get(), 0);

        // Second (last) update() notifies exactly once.
        let mut s = state.take();
        s.handle_update(false, || true, |_| notify_count.set(notify_count.get() + 1), || {});
        state.set(s);
        assert_eq!(notify_count.get(), 1);
    }

    #[test]
    fn did_change_suppresses_notification_when_false() {
        let mut s = PropagationState::new();
        s.handle_will_update(|| {}, || {});
        let mut notified = None;
        s.handle_update(true, || false, |c| notified = Some(c), || {});
        assert_eq!(notified, Some(false));
    }
}
