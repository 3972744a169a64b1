//! Reelplay Core (backend-agnostic timeline playback)
//!
//! Loads a timeline of keyframed element animations and plays it through one
//! of two interchangeable backends: a live-node backend that projects state
//! onto persistent styled nodes, and a raster backend that repaints a pixel
//! surface every frame. The [`Engine`] owns exactly one backend at a time and
//! can swap it at runtime.
//!
//! The host drives time through [`FrameClock::tick`] and observes playback
//! through `start`/`update`/`complete` events.

pub mod backend;
pub mod clock;
pub mod config;
pub mod draw;
pub mod engine;
pub mod error;
pub mod events;
pub mod image_loader;
pub mod model;
pub mod playback;
pub mod props;
pub mod schedule;
pub mod stage;
pub mod templates;
pub mod tween;

// Re-exports for hosts
pub use backend::{
    Backend, BackendFactory, BackendKind, DefaultBackendFactory, LiveNodeBackend, RasterBackend,
};
pub use clock::{FrameClock, TickerId};
pub use config::{EngineConfig, RasterConfig};
pub use engine::Engine;
pub use error::EngineError;
pub use events::{EngineEvent, EventBus, Listener};
pub use image_loader::{ImageCache, ImageLoader, ThreadImageLoader};
pub use model::{
    AnimationElement, AnimationSequence, ElementType, Keyframe, ProjectData, ProjectMetadata,
    RenderingOptions, TimelineData,
};
pub use playback::{PlaybackPhase, PlaybackState};
pub use props::{PropKey, PropValue, PropertyBag, Rgba};
pub use stage::{CanvasHandle, OutputNode, Stage, StageChild, StageSnapshot};
pub use tween::Easing;

pub type Result<T> = core::result::Result<T, EngineError>;

/// Version of the host-facing data contract.
pub const ABI_VERSION: u32 = 1;
