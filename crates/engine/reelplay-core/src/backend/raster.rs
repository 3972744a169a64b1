//! Backend that owns a pixel surface and repaints every element each frame.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use hashbrown::HashMap;
use tiny_skia::Pixmap;

use crate::backend::{Backend, BackendKind, Transport};
use crate::clock::{FrameClock, TickerId};
use crate::config::{EngineConfig, RasterConfig};
use crate::draw::{draw_element, DrawSurface, GlyphRasterizer, PixmapSurface};
use crate::error::EngineError;
use crate::events::{EngineEvent, Listener};
use crate::image_loader::{ImageCache, ImageLoader, ThreadImageLoader};
use crate::model::{AnimationElement, TimelineData};
use crate::playback::{PlaybackPhase, PlaybackState};
use crate::props::{PropKey, PropValue, PropertyBag, Rgba};
use crate::stage::{CanvasHandle, Stage};

pub struct RasterBackend {
    me: Weak<RasterBackend>,
    clock: FrameClock,
    config: RasterConfig,
    background: Rgba,
    glyphs: Option<GlyphRasterizer>,
    ticker: Cell<Option<TickerId>>,
    stage: RefCell<Option<Stage>>,
    canvas: RefCell<Option<CanvasHandle>>,
    images: RefCell<ImageCache>,
    transport: Transport,
}

impl RasterBackend {
    pub fn new(clock: &FrameClock, config: &EngineConfig) -> crate::Result<Rc<Self>> {
        Self::with_loader(clock, config, Box::new(ThreadImageLoader))
    }

    /// Construct with a custom image loader.
    pub fn with_loader(
        clock: &FrameClock,
        config: &EngineConfig,
        loader: Box<dyn ImageLoader>,
    ) -> crate::Result<Rc<Self>> {
        let glyphs = match &config.raster.font_path {
            Some(path) => Some(GlyphRasterizer::from_file(path)?),
            None => None,
        };
        Ok(Rc::new_cyclic(|me| Self {
            me: me.clone(),
            clock: clock.clone(),
            config: config.raster.clone(),
            background: config.raster.background_rgba(),
            glyphs,
            ticker: Cell::new(None),
            stage: RefCell::new(None),
            canvas: RefCell::new(None),
            images: RefCell::new(ImageCache::new(loader)),
            transport: Transport::new(config.easing()),
        }))
    }

    /// The pixel surface, once attached.
    pub fn canvas(&self) -> Option<CanvasHandle> {
        self.canvas.borrow().clone()
    }

    fn tick(&self, dt: f64) {
        if self.transport.is_destroyed() {
            return;
        }
        let step = self.transport.step(dt);
        if self.transport.is_loaded() {
            self.images.borrow_mut().poll();
            self.render_frame();
        }
        self.transport.finish(step);
    }

    /// Clear the surface and redraw every element from its live state.
    fn render_frame(&self) {
        let Some(canvas) = self.canvas() else {
            return;
        };
        let scene = self.transport.scene();
        let mut pixmap = canvas.borrow_mut();
        let mut images = self.images.borrow_mut();
        let mut surface = PixmapSurface::new(&mut pixmap, self.glyphs.as_ref());
        surface.clear(self.background);
        for element in &scene.elements {
            let Some(props) = scene.states.get(&element.id) else {
                continue;
            };
            if let Err(err) = draw_element(&mut surface, element, props, &mut images) {
                log::error!("[{}] {err}", err.category());
            }
        }
    }
}

impl Backend for RasterBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Raster
    }

    fn init(&self, stage: &Stage) -> crate::Result<()> {
        if self.transport.is_destroyed() {
            return Err(EngineError::AdapterNotInitialized);
        }
        if self.canvas.borrow().is_none() {
            let (w, h) = stage
                .size()
                .unwrap_or((self.config.width, self.config.height));
            let pixmap = Pixmap::new(w, h).ok_or_else(|| EngineError::Config {
                reason: format!("invalid raster size {w}x{h}"),
            })?;
            let canvas: CanvasHandle = Rc::new(RefCell::new(pixmap));
            stage.add_canvas(canvas.clone());
            *self.canvas.borrow_mut() = Some(canvas);
        }
        *self.stage.borrow_mut() = Some(stage.clone());
        if self.ticker.get().is_none() {
            let me = self.me.clone();
            let id = self.clock.add(Rc::new(move |dt: f64| {
                if let Some(backend) = me.upgrade() {
                    backend.tick(dt);
                }
            }));
            self.ticker.set(Some(id));
        }
        Ok(())
    }

    fn load_timeline(
        &self,
        timeline: &TimelineData,
        elements: &[AnimationElement],
    ) -> crate::Result<()> {
        if self.canvas().is_none() {
            return Err(EngineError::AdapterNotInitialized);
        }
        // bitmaps requested by the static pass stay valid while the src matches
        let sources: HashMap<&str, &str> = elements
            .iter()
            .filter_map(|e| Some((e.id.as_str(), e.initial_props.text(&PropKey::Src)?)))
            .collect();
        self.images
            .borrow_mut()
            .retain(|id, src| sources.get(id) == Some(&src));
        self.transport.load(timeline, elements);
        self.seek(0.0);
        Ok(())
    }

    fn render_static_element(
        &self,
        element: &AnimationElement,
        _stage: &Stage,
    ) -> crate::Result<()> {
        let canvas = self.canvas().ok_or(EngineError::AdapterNotInitialized)?;
        let mut pixmap = canvas.borrow_mut();
        let mut images = self.images.borrow_mut();
        let mut surface = PixmapSurface::new(&mut pixmap, self.glyphs.as_ref());
        draw_element(&mut surface, element, &element.initial_props, &mut images)
    }

    fn play(&self) {
        self.transport.play(&|| self.render_frame());
    }

    fn pause(&self) {
        self.transport.pause();
    }

    fn seek(&self, time: f64) {
        self.transport.seek(time, &|| self.render_frame());
    }

    fn set_rate(&self, rate: f64) {
        self.transport.set_rate(rate);
    }

    fn playback_state(&self) -> PlaybackState {
        self.transport.state()
    }

    fn phase(&self) -> PlaybackPhase {
        self.transport.phase()
    }

    fn on(&self, event: EngineEvent, listener: Listener) {
        self.transport.events().on(event, listener);
    }

    fn off(&self, event: EngineEvent, listener: &Listener) -> bool {
        self.transport.events().off(event, listener)
    }

    fn set_perspective(&self, _value: Option<&PropValue>, _stage: &Stage) {}

    fn element_state(&self, element_id: &str) -> Option<PropertyBag> {
        self.transport.element_state(element_id)
    }

    fn destroy(&self) {
        if let Some(id) = self.ticker.take() {
            self.clock.remove(id);
        }
        let canvas = self.canvas.borrow_mut().take();
        let stage = self.stage.borrow_mut().take();
        if let (Some(canvas), Some(stage)) = (canvas, stage) {
            stage.remove_canvas(&canvas);
        }
        self.images.borrow_mut().clear();
        if !self.transport.is_destroyed() {
            log::debug!("raster backend destroyed");
        }
        self.transport.destroy();
    }

    fn is_destroyed(&self) -> bool {
        self.transport.is_destroyed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ElementType;
    use approx::assert_abs_diff_eq;
    use crossbeam_channel::Receiver;
    use serde_json::json;

    fn setup() -> (Rc<RasterBackend>, Stage, FrameClock) {
        let clock = FrameClock::new();
        let stage = Stage::with_size(100, 100);
        let backend = RasterBackend::new(&clock, &EngineConfig::default()).unwrap();
        backend.init(&stage).unwrap();
        (backend, stage, clock)
    }

    fn fade() -> (TimelineData, Vec<AnimationElement>) {
        let timeline: TimelineData = serde_json::from_value(json!({
            "duration": 2, "version": 1,
            "sequences": [{"elementId": "box", "keyframes": [
                {"time": 0, "properties": {"opacity": 0}},
                {"time": 2, "properties": {"opacity": 1}, "easing": "linear"}
            ]}]
        }))
        .unwrap();
        let el = AnimationElement::new("box", ElementType::Shape, "Box").with_props(
            PropertyBag::from_json(json!({
                "x": 10, "y": 10, "width": 20, "height": 20, "fill": "#ff0000"
            })),
        );
        (timeline, vec![el])
    }

    fn pixel(backend: &RasterBackend, x: u32, y: u32) -> [u8; 4] {
        let canvas = backend.canvas().unwrap();
        let pixmap = canvas.borrow();
        let c = pixmap.pixel(x, y).unwrap().demultiply();
        [c.red(), c.green(), c.blue(), c.alpha()]
    }

    #[test]
    fn canvas_uses_stage_size() {
        let (backend, stage, _clock) = setup();
        let canvas = backend.canvas().unwrap();
        assert_eq!(canvas.borrow().width(), 100);
        assert_eq!(stage.canvas_count(), 1);
    }

    #[test]
    fn seek_interpolates_and_repaints() {
        let (backend, _stage, _clock) = setup();
        let (timeline, elements) = fade();
        backend.load_timeline(&timeline, &elements).unwrap();
        assert_eq!(pixel(&backend, 15, 15)[3], 0);

        backend.seek(1.0);
        let opacity = backend
            .element_state("box")
            .unwrap()
            .number(&PropKey::Opacity)
            .unwrap();
        assert_abs_diff_eq!(opacity, 0.5);
        let px = pixel(&backend, 15, 15);
        assert_eq!(px[0], 255);
        assert!((126..=129).contains(&px[3]));
        assert_eq!(pixel(&backend, 50, 50)[3], 0);
    }

    #[test]
    fn frames_clear_and_redraw() {
        let (backend, _stage, clock) = setup();
        let timeline: TimelineData = serde_json::from_value(json!({
            "duration": 1, "version": 1,
            "sequences": [{"elementId": "box", "keyframes": [
                {"time": 0, "properties": {"x": 0}},
                {"time": 1, "properties": {"x": 50}, "easing": "none"}
            ]}]
        }))
        .unwrap();
        let el = AnimationElement::new("box", ElementType::Shape, "Box")
            .with_props(PropertyBag::from_json(json!({"width": 10, "height": 10})));
        backend.load_timeline(&timeline, &[el]).unwrap();
        assert_eq!(pixel(&backend, 5, 5)[3], 255);

        backend.play();
        clock.tick(1.0);
        // old position cleared, new one drawn
        assert_eq!(pixel(&backend, 5, 5)[3], 0);
        assert_eq!(pixel(&backend, 55, 5)[3], 255);
        assert_eq!(backend.phase(), PlaybackPhase::Paused);
    }

    #[test]
    fn bad_element_does_not_stop_the_frame() {
        let (backend, _stage, _clock) = setup();
        let bad = AnimationElement::new("bad", ElementType::Shape, "Bad")
            .with_props(PropertyBag::from_iter([(PropKey::X, PropValue::Number(f64::NAN))]));
        let good = AnimationElement::new("good", ElementType::Shape, "Good")
            .with_props(PropertyBag::from_json(json!({"x": 60, "y": 60, "width": 10, "height": 10})));
        backend
            .load_timeline(&TimelineData::new(1.0), &[bad, good])
            .unwrap();
        assert_eq!(pixel(&backend, 65, 65)[3], 255);
    }

    /// Records load requests; every load fails at once.
    struct CountingLoader {
        requests: Rc<RefCell<Vec<String>>>,
    }

    impl ImageLoader for CountingLoader {
        fn load(&self, src: &str) -> Receiver<crate::Result<Pixmap>> {
            self.requests.borrow_mut().push(src.to_string());
            crossbeam_channel::bounded(1).1
        }
    }

    #[test]
    fn static_render_and_load_request_each_image_once() {
        let clock = FrameClock::new();
        let stage = Stage::with_size(40, 40);
        let requests = Rc::new(RefCell::new(Vec::new()));
        let loader = Box::new(CountingLoader {
            requests: requests.clone(),
        });
        let backend = RasterBackend::with_loader(&clock, &EngineConfig::default(), loader).unwrap();
        backend.init(&stage).unwrap();

        let timeline = TimelineData::new(1.0);
        let image = |src: &str| {
            AnimationElement::new("logo", ElementType::Image, "Logo")
                .with_props(PropertyBag::from_json(json!({"src": src})))
        };
        let el = image("logo.png");
        backend.render_static_element(&el, &stage).unwrap();
        backend.load_timeline(&timeline, &[el.clone()]).unwrap();
        clock.tick(0.016);
        assert_eq!(*requests.borrow(), vec!["logo.png"]);

        // reloading the same element keeps its pending bitmap
        backend.load_timeline(&timeline, &[el]).unwrap();
        assert_eq!(requests.borrow().len(), 1);

        // a new src is fetched
        let swapped = image("other.png");
        backend.render_static_element(&swapped, &stage).unwrap();
        backend.load_timeline(&timeline, &[swapped]).unwrap();
        assert_eq!(*requests.borrow(), vec!["logo.png", "other.png"]);
    }

    #[test]
    fn destroy_detaches_everything_and_later_ticks_are_no_ops() {
        let (backend, stage, clock) = setup();
        let (timeline, elements) = fade();
        backend.load_timeline(&timeline, &elements).unwrap();
        backend.play();
        backend.destroy();
        assert_eq!(stage.canvas_count(), 0);
        assert_eq!(clock.len(), 0);
        assert!(backend.element_state("box").is_none());
        clock.tick(0.1);
        backend.seek(1.0);
        backend.destroy();
        assert!(backend.is_destroyed());
    }
}
