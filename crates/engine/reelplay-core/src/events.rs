//! Lifecycle events and the per-backend subscriber list.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::playback::PlaybackState;

/// Events a backend publishes to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineEvent {
    /// Transport entered Playing
    Start,
    /// Time changed (frame advance or seek)
    Update,
    /// Playhead reached the end of the timeline
    Complete,
}

impl EngineEvent {
    pub const ALL: [EngineEvent; 3] = [Self::Start, Self::Update, Self::Complete];

    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Update => "update",
            Self::Complete => "complete",
        }
    }

    #[inline]
    fn slot(&self) -> usize {
        match self {
            Self::Start => 0,
            Self::Update => 1,
            Self::Complete => 2,
        }
    }
}

impl TryFrom<&str> for EngineEvent {
    type Error = EngineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "start" => Ok(Self::Start),
            "update" => Ok(Self::Update),
            "complete" => Ok(Self::Complete),
            other => Err(EngineError::new(format!("unknown event '{other}'"))),
        }
    }
}

/// Subscriber callback. Compared by pointer identity in [`EventBus::off`].
pub type Listener = Rc<dyn Fn(&PlaybackState)>;

/// Synchronous multi-subscriber notification.
///
/// Listeners run in subscription order on a snapshot of the list, so a
/// listener may subscribe or unsubscribe while an event is dispatching.
/// A panicking listener is logged and skipped.
///
/// Emitting an event from inside one of its own listeners does not recurse:
/// the emission is coalesced and delivered, with a freshly read state, once
/// the current pass over the subscribers has finished.
#[derive(Default)]
pub struct EventBus {
    listeners: RefCell<[Vec<Listener>; 3]>,
    dispatching: Cell<[bool; 3]>,
    pending: Cell<[bool; 3]>,
}

/// Passes one `emit` call may run before further nested emissions are dropped.
const MAX_DISPATCH_PASSES: usize = 8;

fn set_flag(cell: &Cell<[bool; 3]>, slot: usize, value: bool) -> bool {
    let mut flags = cell.get();
    let prev = flags[slot];
    flags[slot] = value;
    cell.set(flags);
    prev
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, event: EngineEvent, listener: Listener) {
        self.listeners.borrow_mut()[event.slot()].push(listener);
    }

    /// Remove the first registration of `listener`. Returns whether one was found.
    pub fn off(&self, event: EngineEvent, listener: &Listener) -> bool {
        let mut lists = self.listeners.borrow_mut();
        let list = &mut lists[event.slot()];
        match list.iter().position(|l| Rc::ptr_eq(l, listener)) {
            Some(idx) => {
                list.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        for list in self.listeners.borrow_mut().iter_mut() {
            list.clear();
        }
    }

    /// Deliver `state` to every subscriber of `event`.
    /// Returns the failures of listeners that panicked.
    pub fn emit(&self, event: EngineEvent, state: &PlaybackState) -> Vec<EngineError> {
        self.emit_with(event, &|| *state)
    }

    /// Deliver the state read by `state` to every subscriber of `event`.
    ///
    /// `state` is read again for each coalesced re-emission, so subscribers
    /// always end on the latest value.
    pub fn emit_with(
        &self,
        event: EngineEvent,
        state: &dyn Fn() -> PlaybackState,
    ) -> Vec<EngineError> {
        let slot = event.slot();
        if set_flag(&self.dispatching, slot, true) {
            log::trace!("coalescing nested '{}' emission", event.name());
            set_flag(&self.pending, slot, true);
            return Vec::new();
        }

        let mut failures = Vec::new();
        let mut passes = 0;
        loop {
            passes += 1;
            let current = state();
            let snapshot: Vec<Listener> = self.listeners.borrow()[slot].clone();
            for listener in snapshot {
                if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(&current))) {
                    let err = EngineError::Listener {
                        event: event.name().to_string(),
                        reason: panic_reason(payload.as_ref()),
                    };
                    log::error!("{err}");
                    failures.push(err);
                }
            }
            if !set_flag(&self.pending, slot, false) {
                break;
            }
            if passes >= MAX_DISPATCH_PASSES {
                log::warn!(
                    "'{}' listeners kept re-emitting; dropped after {passes} passes",
                    event.name()
                );
                break;
            }
        }

        set_flag(&self.dispatching, slot, false);
        failures
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "listener panicked".to_string()
    }
}
