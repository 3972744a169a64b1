//! Interpolation primitive: easing curves and per-property keyframe tracks.

pub mod easing;
pub mod track;

pub use easing::{EaseDir, EaseFamily, Easing};
pub use track::{blend, PropertyTrack, Stop};
