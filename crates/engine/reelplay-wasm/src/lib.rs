use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::HashMap;
use js_sys::Function;
use serde::Serialize;
use serde_wasm_bindgen as swb;
use tiny_skia::Pixmap;
use wasm_bindgen::prelude::*;

use reelplay_core::image_loader::decode_bytes;
use reelplay_core::{
    AnimationElement, Backend, BackendFactory, BackendKind, DefaultBackendFactory, Engine,
    EngineConfig, EngineError, EngineEvent, FrameClock, ImageLoader, Listener, PlaybackState,
    ProjectData, PropValue, RasterBackend, Stage, TimelineData,
};

type ImageBytes = Rc<RefCell<HashMap<String, Vec<u8>>>>;

fn jsvalue_is_undefined_or_null(v: &JsValue) -> bool {
    v.is_undefined() || v.is_null()
}

fn js_err(context: &str, err: impl std::fmt::Display) -> JsError {
    JsError::new(&format!("{context}: {err}"))
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsError> {
    value
        .serialize(&swb::Serializer::json_compatible())
        .map_err(|e| js_err("serialize error", e))
}

/// Decodes images the host registered with `registerImage`. Browsers have no
/// filesystem and no worker threads here, so the bytes arrive from JS.
struct HostImageLoader {
    images: ImageBytes,
}

impl ImageLoader for HostImageLoader {
    fn load(&self, src: &str) -> crossbeam_channel::Receiver<reelplay_core::Result<Pixmap>> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let result = match self.images.borrow().get(src) {
            Some(bytes) => decode_bytes(src, bytes),
            None => Err(EngineError::ImageLoad {
                src: src.to_string(),
                reason: "image was not registered by the host".to_string(),
            }),
        };
        let _ = tx.send(result);
        rx
    }
}

struct HostBackendFactory {
    images: ImageBytes,
}

impl BackendFactory for HostBackendFactory {
    fn create(
        &self,
        kind: BackendKind,
        clock: &FrameClock,
        config: &EngineConfig,
    ) -> reelplay_core::Result<Rc<dyn Backend>> {
        match kind {
            BackendKind::Raster => {
                let loader = Box::new(HostImageLoader {
                    images: self.images.clone(),
                });
                let backend: Rc<dyn Backend> = RasterBackend::with_loader(clock, config, loader)?;
                Ok(backend)
            }
            other => DefaultBackendFactory.create(other, clock, config),
        }
    }
}

struct Subscription {
    event: EngineEvent,
    callback: Function,
    listener: Listener,
}

#[wasm_bindgen]
pub struct WasmEngine {
    engine: Engine,
    stage: Stage,
    images: ImageBytes,
    subscriptions: RefCell<Vec<Subscription>>,
}

#[wasm_bindgen]
impl WasmEngine {
    /// Create an engine rendering into an internal stage of `width` x `height`.
    /// `backend` is `"dom"`, `"raster"` or `"canvas2d"`; the config default
    /// applies when omitted. `config` is an optional engine config object.
    #[wasm_bindgen(constructor)]
    pub fn new(
        width: u32,
        height: u32,
        backend: Option<String>,
        config: JsValue,
    ) -> Result<WasmEngine, JsError> {
        console_error_panic_hook::set_once();

        let cfg: EngineConfig = if jsvalue_is_undefined_or_null(&config) {
            EngineConfig::default()
        } else {
            swb::from_value(config).map_err(|e| js_err("config error", e))?
        };
        let kind = match backend.as_deref() {
            Some(name) => BackendKind::parse(name).map_err(|e| js_err("backend error", e))?,
            None => cfg.default_backend,
        };

        let stage = Stage::with_size(width, height);
        let images: ImageBytes = Rc::default();
        let engine = Engine::with_factory(
            Some(stage.clone()),
            kind,
            cfg,
            Box::new(HostBackendFactory {
                images: images.clone(),
            }),
        );
        if engine.active_backend().is_none() {
            return Err(JsError::new("could not initialize the rendering backend"));
        }
        Ok(WasmEngine {
            engine,
            stage,
            images,
            subscriptions: RefCell::new(Vec::new()),
        })
    }

    /// Swap the rendering backend. Subscriptions are dropped.
    #[wasm_bindgen(js_name = setRenderingTarget)]
    pub fn set_rendering_target(&self, name: &str) -> Result<(), JsError> {
        self.subscriptions.borrow_mut().clear();
        self.engine
            .set_rendering_target_name(name)
            .map_err(|e| js_err("setRenderingTarget", e))
    }

    #[wasm_bindgen(js_name = loadTimeline)]
    pub fn load_timeline(&self, timeline: JsValue, elements: JsValue) -> Result<(), JsError> {
        let timeline: TimelineData =
            swb::from_value(timeline).map_err(|e| js_err("timeline parse error", e))?;
        let elements: Vec<AnimationElement> =
            swb::from_value(elements).map_err(|e| js_err("elements parse error", e))?;
        self.engine
            .load_timeline(&timeline, &elements)
            .map_err(|e| js_err("loadTimeline", e))
    }

    #[wasm_bindgen(js_name = loadProject)]
    pub fn load_project(&self, project: JsValue) -> Result<(), JsError> {
        let project: ProjectData =
            swb::from_value(project).map_err(|e| js_err("project parse error", e))?;
        self.engine
            .load_project(&project)
            .map_err(|e| js_err("loadProject", e))
    }

    pub fn play(&self) {
        self.engine.play();
    }

    pub fn pause(&self) {
        self.engine.pause();
    }

    pub fn seek(&self, time: f64) {
        self.engine.seek(time);
    }

    #[wasm_bindgen(js_name = setRate)]
    pub fn set_rate(&self, rate: f64) {
        self.engine.set_rate(rate);
    }

    /// `{ currentTime, progress, isPlaying, rate, duration }` or `null`.
    #[wasm_bindgen(js_name = getPlaybackState)]
    pub fn get_playback_state(&self) -> Result<JsValue, JsError> {
        match self.engine.playback_state() {
            Some(state) => to_js(&state),
            None => Ok(JsValue::NULL),
        }
    }

    /// Subscribe `callback` to `"start"`, `"update"` or `"complete"`.
    /// Exceptions thrown by the callback are logged and swallowed.
    pub fn on(&self, event: &str, callback: Function) -> Result<(), JsError> {
        let event = EngineEvent::try_from(event).map_err(|e| js_err("on", e))?;
        let f = callback.clone();
        let name = event.name();
        let listener: Listener = Rc::new(move |state: &PlaybackState| {
            let arg = match to_js(state) {
                Ok(v) => v,
                Err(_) => JsValue::NULL,
            };
            if let Err(err) = f.call1(&JsValue::UNDEFINED, &arg) {
                log::error!("'{name}' callback threw: {err:?}");
            }
        });
        self.engine.on(event, listener.clone());
        self.subscriptions.borrow_mut().push(Subscription {
            event,
            callback,
            listener,
        });
        Ok(())
    }

    /// Remove a callback previously passed to `on`. Returns whether it was found.
    pub fn off(&self, event: &str, callback: Function) -> bool {
        let Ok(event) = EngineEvent::try_from(event) else {
            return false;
        };
        let target: &JsValue = callback.as_ref();
        let found = {
            let mut subs = self.subscriptions.borrow_mut();
            let pos = subs.iter().position(|s| {
                let cb: &JsValue = s.callback.as_ref();
                s.event == event && cb == target
            });
            pos.map(|i| subs.remove(i))
        };
        match found {
            Some(sub) => self.engine.off(sub.event, &sub.listener),
            None => false,
        }
    }

    /// Advance the frame clock by `dt` seconds. Call once per animation frame.
    pub fn tick(&self, dt: f64) {
        self.engine.tick(dt);
    }

    /// Number (pixels), string, or null to clear.
    #[wasm_bindgen(js_name = setPerspective)]
    pub fn set_perspective(&self, value: JsValue) {
        let value = if jsvalue_is_undefined_or_null(&value) {
            None
        } else if let Some(n) = value.as_f64() {
            Some(PropValue::Number(n))
        } else {
            value.as_string().map(PropValue::Text)
        };
        self.engine.set_perspective(value.as_ref());
    }

    /// Register encoded image bytes for an image element `src`.
    #[wasm_bindgen(js_name = registerImage)]
    pub fn register_image(&self, src: String, bytes: Vec<u8>) {
        self.images.borrow_mut().insert(src, bytes);
    }

    /// Raster pixels as straight RGBA, ready for `ImageData`. Empty without a canvas.
    #[wasm_bindgen(js_name = frameRgba)]
    pub fn frame_rgba(&self) -> Vec<u8> {
        let Some(canvas) = self.stage.canvas() else {
            return Vec::new();
        };
        let pixmap = canvas.borrow();
        let mut out = Vec::with_capacity(pixmap.data().len());
        for px in pixmap.pixels() {
            let c = px.demultiply();
            out.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        out
    }

    /// `{ width, height, perspective, nodes: [{ elementId, style, text }], canvases }`.
    #[wasm_bindgen(js_name = nodeSnapshot)]
    pub fn node_snapshot(&self) -> Result<JsValue, JsError> {
        to_js(&self.stage.snapshot())
    }

    #[wasm_bindgen(js_name = activeBackend)]
    pub fn active_backend(&self) -> Option<String> {
        self.engine.active_backend().map(|k| k.name().to_string())
    }

    pub fn destroy(&self) {
        self.subscriptions.borrow_mut().clear();
        self.engine.destroy();
    }
}

#[wasm_bindgen]
pub fn abi_version() -> u32 {
    reelplay_core::ABI_VERSION
}
