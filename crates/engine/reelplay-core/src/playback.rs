//! Transport phase and the playback snapshot handed to listeners and hosts.

use serde::{Deserialize, Serialize};

/// Transport phase of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackPhase {
    /// No timeline loaded
    #[default]
    Idle,
    /// Timeline loaded, parked at time 0
    Ready,
    /// Clock advancing
    Playing,
    /// Stopped by `pause()` or by reaching the end
    Paused,
}

impl PlaybackPhase {
    /// Get the name of this phase
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Ready => "ready",
            Self::Playing => "playing",
            Self::Paused => "paused",
        }
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }
}

impl From<&str> for PlaybackPhase {
    fn from(s: &str) -> Self {
        match s {
            "ready" => Self::Ready,
            "playing" => Self::Playing,
            "paused" => Self::Paused,
            _ => Self::Idle,
        }
    }
}

/// Snapshot of the transport handed to hosts and event listeners.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub current_time: f64,
    /// `current_time / duration` in [0, 1]; 0 when duration is 0.
    pub progress: f64,
    pub is_playing: bool,
    pub rate: f64,
    pub duration: f64,
}

impl PlaybackState {
    /// Derive a snapshot from raw clock values.
    pub fn derive(current_time: f64, duration: f64, is_playing: bool, rate: f64) -> Self {
        let progress = if duration > 0.0 {
            (current_time / duration).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            current_time,
            progress,
            is_playing,
            rate,
            duration,
        }
    }
}
