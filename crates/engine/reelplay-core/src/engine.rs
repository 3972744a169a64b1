//! Engine orchestrator: one active backend, a uniform control surface, and
//! backend hot-swap.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::backend::{Backend, BackendFactory, BackendKind, DefaultBackendFactory};
use crate::clock::FrameClock;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{EngineEvent, Listener};
use crate::model::{AnimationElement, ProjectData, TimelineData};
use crate::playback::{PlaybackPhase, PlaybackState};
use crate::props::{PropValue, PropertyBag};
use crate::stage::Stage;

/// Timeline playback engine.
///
/// All methods take `&self` so an event listener holding a handle to the
/// engine may call back into it (for example `seek` from an `update`
/// listener). Control calls on an engine without a backend are no-ops.
pub struct Engine {
    config: EngineConfig,
    factory: Box<dyn BackendFactory>,
    clock: FrameClock,
    target: RefCell<Option<Stage>>,
    backend: RefCell<Option<Rc<dyn Backend>>>,
    loaded: RefCell<Option<(TimelineData, Vec<AnimationElement>)>>,
    destroyed: Cell<bool>,
}

impl Engine {
    /// Create an engine rendering into `target` with the given backend.
    pub fn new(target: Option<Stage>, kind: BackendKind) -> Self {
        Self::with_config(target, kind, EngineConfig::default())
    }

    pub fn with_config(target: Option<Stage>, kind: BackendKind, config: EngineConfig) -> Self {
        Self::with_factory(target, kind, config, Box::new(DefaultBackendFactory))
    }

    /// Create an engine whose backends come from `factory`.
    ///
    /// A backend that fails to construct is logged and leaves the engine
    /// uninitialized; `load_timeline` then reports `AdapterNotInitialized`.
    pub fn with_factory(
        target: Option<Stage>,
        kind: BackendKind,
        config: EngineConfig,
        factory: Box<dyn BackendFactory>,
    ) -> Self {
        let engine = Self {
            config,
            factory,
            clock: FrameClock::new(),
            target: RefCell::new(target),
            backend: RefCell::new(None),
            loaded: RefCell::new(None),
            destroyed: Cell::new(false),
        };
        if let Err(err) = engine.install(kind) {
            log::error!("engine: could not create {kind} backend: {err}");
        }
        engine
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The clock the host drives once per frame.
    #[inline]
    pub fn frame_clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Advance the frame clock by `dt` seconds.
    pub fn tick(&self, dt: f64) {
        self.clock.tick(dt);
    }

    pub fn target(&self) -> Option<Stage> {
        self.target.borrow().clone()
    }

    pub fn active_backend(&self) -> Option<BackendKind> {
        self.active().map(|b| b.kind())
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    fn active(&self) -> Option<Rc<dyn Backend>> {
        self.backend.borrow().clone()
    }

    /// Create and attach a backend of `kind`. Requires a target.
    fn install(&self, kind: BackendKind) -> crate::Result<()> {
        let Some(stage) = self.target() else {
            log::debug!("engine: no target, {kind} backend not created");
            return Ok(());
        };
        let backend = self.factory.create(kind, &self.clock, &self.config)?;
        if let Err(err) = backend.init(&stage) {
            backend.destroy();
            return Err(err);
        }
        *self.backend.borrow_mut() = Some(backend);
        Ok(())
    }

    /// Swap the active backend.
    ///
    /// The current backend is destroyed before the new one is constructed.
    /// A previously loaded timeline is reloaded into the new backend, which
    /// starts again from time 0.
    pub fn set_rendering_target(&self, kind: BackendKind) -> crate::Result<()> {
        log::debug!("engine: setRenderingTarget {{ target: {kind} }}");
        if self.destroyed.get() {
            return Err(EngineError::AdapterNotInitialized);
        }
        let old = self.backend.borrow_mut().take();
        if let Some(old) = old {
            old.destroy();
        }
        self.install(kind)?;

        let snapshot = self.loaded.borrow().clone();
        if let Some((timeline, elements)) = snapshot {
            self.load_into_active(&timeline, &elements)?;
        }
        Ok(())
    }

    /// Parse a host backend name and swap to it.
    pub fn set_rendering_target_name(&self, name: &str) -> crate::Result<()> {
        self.set_rendering_target(BackendKind::parse(name)?)
    }

    /// Load a timeline into the active backend.
    ///
    /// Every element is first drawn from its `initialProps`, then the
    /// backend builds its schedule and parks at time 0.
    pub fn load_timeline(
        &self,
        timeline: &TimelineData,
        elements: &[AnimationElement],
    ) -> crate::Result<()> {
        log::debug!(
            "engine: loadTimeline {{ duration: {}, sequences: {}, elements: {} }}",
            timeline.duration,
            timeline.sequences.len(),
            elements.len()
        );
        if self.destroyed.get() || self.active().is_none() || self.target().is_none() {
            let err = EngineError::AdapterNotInitialized;
            log::error!("engine: {err}");
            return Err(err);
        }
        *self.loaded.borrow_mut() = Some((timeline.clone(), elements.to_vec()));
        self.load_into_active(timeline, elements)
    }

    /// Load the timeline and elements of a saved project.
    pub fn load_project(&self, project: &ProjectData) -> crate::Result<()> {
        self.load_timeline(&project.timeline, &project.elements)
    }

    fn load_into_active(
        &self,
        timeline: &TimelineData,
        elements: &[AnimationElement],
    ) -> crate::Result<()> {
        let (Some(backend), Some(stage)) = (self.active(), self.target()) else {
            return Err(EngineError::AdapterNotInitialized);
        };
        for element in elements {
            if let Err(err) = backend.render_static_element(element, &stage) {
                log::warn!("engine: static render failed: {err}");
            }
        }
        backend.load_timeline(timeline, elements)
    }

    pub fn play(&self) {
        log::debug!("engine: play");
        if let Some(backend) = self.active() {
            backend.play();
        }
    }

    pub fn pause(&self) {
        log::debug!("engine: pause");
        if let Some(backend) = self.active() {
            backend.pause();
        }
    }

    /// Jump to `time` seconds, clamped to the timeline.
    pub fn seek(&self, time: f64) {
        log::debug!("engine: seek {{ time: {time} }}");
        if let Some(backend) = self.active() {
            backend.seek(time);
        }
    }

    pub fn set_rate(&self, rate: f64) {
        log::debug!("engine: setRate {{ rate: {rate} }}");
        if let Some(backend) = self.active() {
            backend.set_rate(rate);
        }
    }

    /// Snapshot of the active backend, or None without one.
    pub fn playback_state(&self) -> Option<PlaybackState> {
        self.active().map(|b| b.playback_state())
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.active()
            .map(|b| b.phase())
            .unwrap_or(PlaybackPhase::Idle)
    }

    /// Subscribe on the active backend. Dropped when there is none.
    /// Subscriptions do not survive a backend switch.
    pub fn on(&self, event: EngineEvent, listener: Listener) {
        log::debug!("engine: on {{ event: {} }}", event.name());
        match self.active() {
            Some(backend) => backend.on(event, listener),
            None => log::debug!("engine: no backend, '{}' listener dropped", event.name()),
        }
    }

    pub fn off(&self, event: EngineEvent, listener: &Listener) -> bool {
        log::debug!("engine: off {{ event: {} }}", event.name());
        self.active()
            .map(|b| b.off(event, listener))
            .unwrap_or(false)
    }

    pub fn set_perspective(&self, value: Option<&PropValue>) {
        log::debug!("engine: setPerspective {{ value: {value:?} }}");
        if let (Some(backend), Some(stage)) = (self.active(), self.target()) {
            backend.set_perspective(value, &stage);
        }
    }

    /// Current interpolated properties of `element_id` in the active backend.
    pub fn element_state(&self, element_id: &str) -> Option<PropertyBag> {
        self.active().and_then(|b| b.element_state(element_id))
    }

    /// Tear down the active backend and release the target. Idempotent.
    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        log::debug!("engine: destroy");
        let backend = self.backend.borrow_mut().take();
        if let Some(backend) = backend {
            backend.destroy();
        }
        *self.target.borrow_mut() = None;
        *self.loaded.borrow_mut() = None;
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("backend", &self.active_backend())
            .field("destroyed", &self.destroyed.get())
            .finish()
    }
}
