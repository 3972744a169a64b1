//! Error types for the playback engine

use serde::{Deserialize, Serialize};

/// Errors surfaced by the engine and its backends.
///
/// Control calls (`play`, `pause`, `seek`, ...) never return these; they are
/// silent no-ops when the engine is not ready. Only loading, parsing and
/// per-element drawing report failures.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum EngineError {
    /// No backend or no target surface is available
    #[error("Engine adapter not initialized.")]
    AdapterNotInitialized,

    /// Drawing a single element failed during a frame
    #[error("Render error for element {element_id}: {reason}")]
    Render { element_id: String, reason: String },

    /// An image source could not be loaded or decoded
    #[error("Image load failed for {src}: {reason}")]
    ImageLoad { src: String, reason: String },

    /// A subscriber panicked while handling an event
    #[error("Listener for '{event}' failed: {reason}")]
    Listener { event: String, reason: String },

    /// The requested rendering backend does not exist
    #[error("Unsupported rendering backend: {name}")]
    UnsupportedBackend { name: String },

    /// Serialization error
    #[error("Serialization error: {reason}")]
    Serialization { reason: String },

    /// Invalid configuration
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    /// IO error
    #[error("IO error: {reason}")]
    Io { reason: String },

    /// Generic engine error
    #[error("Engine error: {message}")]
    Generic { message: String },
}

impl EngineError {
    /// Create a new generic error
    pub fn new(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if playback can continue after this error
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Render { .. } | Self::ImageLoad { .. } | Self::Listener { .. } | Self::Io { .. }
        )
    }

    /// Get error category for logging
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::AdapterNotInitialized | Self::UnsupportedBackend { .. } | Self::Config { .. } => {
                "configuration"
            }
            Self::Render { .. } | Self::ImageLoad { .. } => "render",
            Self::Listener { .. } => "listener",
            Self::Serialization { .. } => "serialization",
            Self::Io { .. } => "io",
            Self::Generic { .. } => "generic",
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}
