//! Host-driven frame clock.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Handle returned by [`FrameClock::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TickerId(pub u64);

pub type TickCallback = Rc<dyn Fn(f64)>;

#[derive(Default)]
struct ClockInner {
    next_id: u64,
    callbacks: Vec<(TickerId, TickCallback)>,
    elapsed: f64,
}

/// Shared ticker. The host calls [`FrameClock::tick`] once per frame with the
/// elapsed seconds; callbacks run in registration order.
#[derive(Clone, Default)]
pub struct FrameClock {
    inner: Rc<RefCell<ClockInner>>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, callback: TickCallback) -> TickerId {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = TickerId(inner.next_id);
        inner.callbacks.push((id, callback));
        id
    }

    /// Returns whether the callback was registered.
    pub fn remove(&self, id: TickerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.callbacks.len();
        inner.callbacks.retain(|(cid, _)| *cid != id);
        inner.callbacks.len() != before
    }

    fn is_registered(&self, id: TickerId) -> bool {
        self.inner.borrow().callbacks.iter().any(|(cid, _)| *cid == id)
    }

    /// Advance by `dt` seconds. Non-finite or negative deltas are ignored.
    pub fn tick(&self, dt: f64) {
        if !dt.is_finite() || dt < 0.0 {
            log::warn!("ignoring frame delta {dt}");
            return;
        }
        let snapshot = {
            let mut inner = self.inner.borrow_mut();
            inner.elapsed += dt;
            inner.callbacks.clone()
        };
        for (id, cb) in snapshot {
            // removed by an earlier callback this frame
            if self.is_registered(id) {
                cb(dt);
            }
        }
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.inner.borrow().callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total seconds ticked since creation.
    pub fn elapsed(&self) -> f64 {
        self.inner.borrow().elapsed
    }
}

impl std::fmt::Debug for FrameClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameClock")
            .field("callbacks", &self.len())
            .field("elapsed", &self.elapsed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn callbacks_receive_delta_in_order() {
        let clock = FrameClock::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for tag in 0..3 {
            let seen = seen.clone();
            clock.add(Rc::new(move |dt: f64| seen.borrow_mut().push((tag, dt))));
        }
        clock.tick(0.5);
        assert_eq!(*seen.borrow(), vec![(0, 0.5), (1, 0.5), (2, 0.5)]);
        assert_eq!(clock.elapsed(), 0.5);
    }

    #[test]
    fn callback_can_remove_itself_and_others() {
        let clock = FrameClock::new();
        let hits = Rc::new(Cell::new(0));
        let id_slot: Rc<Cell<Option<TickerId>>> = Rc::new(Cell::new(None));
        let (c, slot, h) = (clock.clone(), id_slot.clone(), hits.clone());
        clock.add(Rc::new(move |_: f64| {
            h.set(h.get() + 1);
            if let Some(id) = slot.get() {
                c.remove(id);
            }
        }));
        let h2 = hits.clone();
        let second = clock.add(Rc::new(move |_: f64| h2.set(h2.get() + 100)));
        id_slot.set(Some(second));
        clock.tick(0.016);
        assert_eq!(hits.get(), 1);
        assert_eq!(clock.len(), 1);
    }

    #[test]
    fn bad_deltas_are_ignored() {
        let clock = FrameClock::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        clock.add(Rc::new(move |_: f64| h.set(h.get() + 1)));
        clock.tick(f64::NAN);
        clock.tick(-1.0);
        assert_eq!(hits.get(), 0);
        assert!(!clock.is_empty());
    }
}
