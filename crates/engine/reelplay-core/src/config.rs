//! Engine configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;
use crate::error::EngineError;
use crate::model::RenderingOptions;
use crate::props::Rgba;
use crate::tween::Easing;

/// Configuration shared by the engine and the backends it constructs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Backend used when none is requested explicitly.
    pub default_backend: BackendKind,
    /// Easing identifier for keyframes that do not name one.
    pub default_easing: String,
    pub raster: RasterConfig,
}

/// Raster surface settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    /// Used when the stage does not report a size.
    pub width: u32,
    pub height: u32,
    /// CSS colour the surface is cleared to before every frame.
    pub background: String,
    /// TrueType/OpenType font used for text elements. Text is skipped without one.
    pub font_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_backend: BackendKind::Dom,
            default_easing: "power1.out".to_string(),
            raster: RasterConfig::default(),
        }
    }
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 400,
            background: "transparent".to_string(),
            font_path: None,
        }
    }
}

impl RasterConfig {
    /// Parsed clear colour; unparseable values fall back to transparent.
    pub fn background_rgba(&self) -> Rgba {
        Rgba::parse(&self.background).unwrap_or_else(|| {
            log::warn!("unparseable background '{}', clearing to transparent", self.background);
            Rgba::TRANSPARENT
        })
    }
}

impl EngineConfig {
    pub fn from_json_str(s: &str) -> crate::Result<Self> {
        serde_json::from_str(s).map_err(|e| EngineError::Config {
            reason: e.to_string(),
        })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// The default easing as a parsed curve.
    pub fn easing(&self) -> Easing {
        Easing::parse_or(Some(&self.default_easing), Easing::default())
    }

    /// Fold host rendering options into this config.
    pub fn with_rendering_options(mut self, options: &RenderingOptions) -> crate::Result<Self> {
        self.default_backend = BackendKind::parse(&options.target)?;
        if let Some(bg) = &options.background_color {
            self.raster.background = bg.clone();
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.default_backend, BackendKind::Dom);
        assert_eq!(cfg.default_easing, "power1.out");
        assert_eq!((cfg.raster.width, cfg.raster.height), (640, 400));
        assert_eq!(cfg.raster.background_rgba(), Rgba::TRANSPARENT);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = EngineConfig::from_json_str(
            r#"{ "default_backend": "canvas2d", "raster": { "width": 320 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.default_backend, BackendKind::Raster);
        assert_eq!(cfg.raster.width, 320);
        assert_eq!(cfg.raster.height, 400);
        assert_eq!(cfg.default_easing, "power1.out");
    }

    #[test]
    fn bad_json_is_a_config_error() {
        let err = EngineConfig::from_json_str("{ nope").unwrap_err();
        assert_eq!(err.category(), "configuration");
    }

    #[test]
    fn rendering_options_fold_in() {
        let opts: RenderingOptions = serde_json::from_value(serde_json::json!({
            "target": "canvas2d",
            "backgroundColor": "#101010",
            "showPerformanceMonitor": true
        }))
        .unwrap();
        let cfg = EngineConfig::default().with_rendering_options(&opts).unwrap();
        assert_eq!(cfg.default_backend, BackendKind::Raster);
        assert_eq!(cfg.raster.background, "#101010");

        let webgl: RenderingOptions =
            serde_json::from_value(serde_json::json!({ "target": "webgl" })).unwrap();
        assert!(matches!(
            EngineConfig::default().with_rendering_options(&webgl),
            Err(EngineError::UnsupportedBackend { .. })
        ));
    }
}
