//! Rendering backends and the contract they share.

pub mod live_node;
pub mod raster;
mod transport;

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::clock::FrameClock;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{EngineEvent, Listener};
use crate::model::{AnimationElement, TimelineData};
use crate::playback::{PlaybackPhase, PlaybackState};
use crate::props::{PropValue, PropertyBag};
use crate::stage::Stage;

pub use live_node::LiveNodeBackend;
pub use raster::RasterBackend;
pub(crate) use transport::Transport;

/// Available rendering backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BackendKind {
    /// Persistent output nodes styled per frame
    #[default]
    #[serde(rename = "dom")]
    Dom,
    /// Owned pixel surface repainted every frame
    #[serde(rename = "raster", alias = "canvas2d")]
    Raster,
}

impl BackendKind {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dom => "dom",
            Self::Raster => "raster",
        }
    }

    /// Parse a host backend name. `"canvas2d"` is an alias of `"raster"`.
    pub fn parse(name: &str) -> crate::Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "dom" => Ok(Self::Dom),
            "raster" | "canvas2d" | "canvas" => Ok(Self::Raster),
            other => Err(EngineError::UnsupportedBackend {
                name: other.to_string(),
            }),
        }
    }
}

impl FromStr for BackendKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Capability set every rendering backend provides.
///
/// Methods take `&self`: backends keep their state behind interior
/// mutability so that event listeners may call back into them.
pub trait Backend {
    fn kind(&self) -> BackendKind;

    /// Attach to the target surface.
    fn init(&self, stage: &Stage) -> crate::Result<()>;

    /// Build the schedule for `timeline` and park the playhead at 0.
    fn load_timeline(
        &self,
        timeline: &TimelineData,
        elements: &[AnimationElement],
    ) -> crate::Result<()>;

    /// Draw `element` from its `initialProps` only.
    fn render_static_element(&self, element: &AnimationElement, stage: &Stage)
        -> crate::Result<()>;

    fn play(&self);
    fn pause(&self);
    fn seek(&self, time: f64);
    fn set_rate(&self, rate: f64);

    fn playback_state(&self) -> PlaybackState;
    fn phase(&self) -> PlaybackPhase;

    fn on(&self, event: EngineEvent, listener: Listener);
    fn off(&self, event: EngineEvent, listener: &Listener) -> bool;

    /// Depth hint. Only meaningful for node output.
    fn set_perspective(&self, value: Option<&PropValue>, stage: &Stage);

    /// Current interpolated properties of an element.
    fn element_state(&self, element_id: &str) -> Option<PropertyBag>;

    /// Release every owned resource. Safe to call more than once.
    fn destroy(&self);

    fn is_destroyed(&self) -> bool;
}

/// Builds backends for the engine.
pub trait BackendFactory {
    fn create(
        &self,
        kind: BackendKind,
        clock: &FrameClock,
        config: &EngineConfig,
    ) -> crate::Result<Rc<dyn Backend>>;
}

/// Factory producing the two built-in backends.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create(
        &self,
        kind: BackendKind,
        clock: &FrameClock,
        config: &EngineConfig,
    ) -> crate::Result<Rc<dyn Backend>> {
        let backend: Rc<dyn Backend> = match kind {
            BackendKind::Dom => LiveNodeBackend::new(clock, config),
            BackendKind::Raster => RasterBackend::new(clock, config)?,
        };
        Ok(backend)
    }
}
