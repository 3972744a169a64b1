//! Playback state machine shared by both backends.
//!
//! Backends own a [`Transport`] and supply their own rendering step. No
//! `RefCell` borrow is held while events are emitted, so listeners are free
//! to call back into the backend.

use std::cell::{Cell, Ref, RefCell};

use hashbrown::HashMap;

use crate::events::{EngineEvent, EventBus};
use crate::model::{AnimationElement, TimelineData};
use crate::playback::{PlaybackPhase, PlaybackState};
use crate::props::PropertyBag;
use crate::schedule::Schedule;
use crate::tween::Easing;

/// Elements of the loaded timeline and their live property bags.
#[derive(Debug, Default)]
pub(crate) struct Scene {
    pub elements: Vec<AnimationElement>,
    pub states: HashMap<String, PropertyBag>,
}

/// Outcome of one frame step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FrameStep {
    pub advanced: bool,
    pub completed: bool,
}

pub(crate) struct Transport {
    schedule: RefCell<Schedule>,
    scene: RefCell<Scene>,
    phase: Cell<PlaybackPhase>,
    rate: Cell<f64>,
    easing: Easing,
    events: EventBus,
    destroyed: Cell<bool>,
}

impl Transport {
    pub fn new(easing: Easing) -> Self {
        Self {
            schedule: RefCell::new(Schedule::default()),
            scene: RefCell::new(Scene::default()),
            phase: Cell::new(PlaybackPhase::Idle),
            rate: Cell::new(1.0),
            easing,
            events: EventBus::new(),
            destroyed: Cell::new(false),
        }
    }

    #[inline]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    #[inline]
    pub fn phase(&self) -> PlaybackPhase {
        self.phase.get()
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        !self.destroyed.get() && self.phase.get() != PlaybackPhase::Idle
    }

    pub fn scene(&self) -> Ref<'_, Scene> {
        self.scene.borrow()
    }

    pub fn element_state(&self, element_id: &str) -> Option<PropertyBag> {
        self.scene.borrow().states.get(element_id).cloned()
    }

    pub fn state(&self) -> PlaybackState {
        let schedule = self.schedule.borrow();
        PlaybackState::derive(
            schedule.time(),
            schedule.duration(),
            schedule.is_active(),
            self.rate.get(),
        )
    }

    /// Replace the schedule and reseed element state. Leaves the transport
    /// Ready at time 0; the caller seeks to 0 to render and notify.
    pub fn load(&self, timeline: &TimelineData, elements: &[AnimationElement]) {
        let mut schedule = Schedule::build(timeline, elements, self.easing);
        schedule.set_time_scale(self.rate.get());
        *self.schedule.borrow_mut() = schedule;
        *self.scene.borrow_mut() = Scene {
            elements: elements.to_vec(),
            states: elements
                .iter()
                .map(|e| (e.id.clone(), e.initial_props.clone()))
                .collect(),
        };
        self.phase.set(PlaybackPhase::Ready);
    }

    fn apply(&self) {
        let schedule = self.schedule.borrow();
        schedule.apply(&mut self.scene.borrow_mut().states);
    }

    fn emit(&self, event: EngineEvent) {
        self.events.emit_with(event, &|| self.state());
    }

    pub fn play(&self, render: &dyn Fn()) {
        if !self.is_loaded() {
            log::debug!("play ignored: nothing loaded");
            return;
        }
        if self.phase.get().is_playing() {
            return;
        }
        {
            let mut schedule = self.schedule.borrow_mut();
            if schedule.duration() <= 0.0 {
                return;
            }
            if schedule.time() >= schedule.duration() {
                schedule.seek(0.0);
            }
            schedule.set_active(true);
        }
        self.apply();
        render();
        self.phase.set(PlaybackPhase::Playing);
        self.emit(EngineEvent::Start);
    }

    pub fn pause(&self) {
        if !self.is_loaded() || !self.phase.get().is_playing() {
            return;
        }
        self.schedule.borrow_mut().set_active(false);
        self.phase.set(PlaybackPhase::Paused);
    }

    pub fn seek(&self, time: f64, render: &dyn Fn()) {
        if !self.is_loaded() {
            log::debug!("seek ignored: nothing loaded");
            return;
        }
        if !time.is_finite() {
            log::warn!("seek to non-finite time {time} ignored");
            return;
        }
        {
            let mut schedule = self.schedule.borrow_mut();
            let was_active = schedule.is_active();
            schedule.set_active(false);
            schedule.seek(time);
            drop(schedule);
            self.apply();
            render();
            self.schedule.borrow_mut().set_active(was_active);
        }
        self.emit(EngineEvent::Update);
    }

    pub fn set_rate(&self, rate: f64) {
        if !rate.is_finite() || rate < 0.0 {
            log::warn!("rate {rate} ignored");
            return;
        }
        self.rate.set(rate);
        self.schedule.borrow_mut().set_time_scale(rate);
    }

    /// Advance the clock while playing and refresh element state.
    pub fn step(&self, dt: f64) -> FrameStep {
        if !self.is_loaded() || !self.phase.get().is_playing() {
            return FrameStep::default();
        }
        let completed = self.schedule.borrow_mut().advance(dt);
        self.apply();
        if completed {
            self.phase.set(PlaybackPhase::Paused);
        }
        FrameStep {
            advanced: true,
            completed,
        }
    }

    /// Emit the events for a step once the frame has been rendered.
    pub fn finish(&self, step: FrameStep) {
        if step.advanced {
            self.emit(EngineEvent::Update);
        }
        // an update listener may have torn the transport down
        if step.completed && !self.is_destroyed() {
            self.emit(EngineEvent::Complete);
        }
    }

    pub fn destroy(&self) {
        self.destroyed.set(true);
        self.phase.set(PlaybackPhase::Idle);
        *self.schedule.borrow_mut() = Schedule::default();
        *self.scene.borrow_mut() = Scene::default();
        self.events.clear();
    }
}
