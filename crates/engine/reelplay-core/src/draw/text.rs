//! Text rasterization with fontdue.

use std::path::Path;

use fontdue::{Font, FontSettings};
use tiny_skia::Pixmap;

use crate::error::EngineError;
use crate::props::Rgba;

/// Largest glyph size the raster path will lay out, in pixels.
pub const MAX_FONT_SIZE: f32 = 1024.0;

/// The parts of a CSS font shorthand the raster path uses.
#[derive(Clone, Debug, PartialEq)]
pub struct FontSpec {
    /// Pixel size
    pub size: f32,
    pub family: String,
}

impl FontSpec {
    /// Parse `"24px sans-serif"`, `"bold 18px Arial"`, ... Missing or
    /// unparseable sizes fall back to 24px; huge ones are capped at
    /// [`MAX_FONT_SIZE`].
    pub fn parse(shorthand: &str) -> Self {
        let mut size = None;
        let mut family = Vec::new();
        for token in shorthand.split_whitespace() {
            if size.is_none() {
                if let Some(v) = token.strip_suffix("px").and_then(|n| n.parse::<f32>().ok()) {
                    size = Some(v);
                    continue;
                }
            } else {
                family.push(token);
            }
        }
        Self {
            size: size
                .filter(|s| s.is_finite() && *s > 0.0)
                .map_or(24.0, |s| s.min(MAX_FONT_SIZE)),
            family: if family.is_empty() {
                "sans-serif".to_string()
            } else {
                family.join(" ")
            },
        }
    }
}

/// A rendered run of text.
pub struct TextRun {
    pub pixmap: Pixmap,
    /// Distance from the top of `pixmap` to the baseline.
    pub ascent: i32,
}

/// Lays out and rasterizes single-line text with one font.
pub struct GlyphRasterizer {
    font: Font,
}

impl GlyphRasterizer {
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default()).map_err(|e| {
            EngineError::Config {
                reason: format!("invalid font: {e}"),
            }
        })?;
        Ok(Self { font })
    }

    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Rasterize `text` in `color` into a premultiplied pixmap.
    /// Returns None for text without any visible glyph area.
    pub fn render(&self, text: &str, px: f32, color: Rgba) -> Option<TextRun> {
        let px = px.min(MAX_FONT_SIZE);
        let glyphs: Vec<_> = text.chars().map(|ch| self.font.rasterize(ch, px)).collect();

        let mut width = 0i32;
        let mut ascent = 0i32;
        let mut descent = 0i32;
        for (m, _) in &glyphs {
            ascent = ascent.max(m.height as i32 + m.ymin);
            descent = descent.max(-m.ymin);
            width += m.advance_width.round() as i32;
        }
        let height = ascent + descent;
        if width <= 0 || height <= 0 {
            return None;
        }

        let mut pixmap = Pixmap::new(width as u32, height as u32)?;
        let stride = width as usize * 4;
        let [r, g, b, a] = color.to_rgba8();
        let data = pixmap.data_mut();

        let mut cursor = 0i32;
        for (m, coverage) in &glyphs {
            let gx0 = cursor + m.xmin;
            let gy0 = ascent - (m.height as i32 + m.ymin);
            for gy in 0..m.height {
                for gx in 0..m.width {
                    let cov = coverage[gy * m.width + gx];
                    if cov == 0 {
                        continue;
                    }
                    let px_x = gx0 + gx as i32;
                    let px_y = gy0 + gy as i32;
                    if px_x < 0 || px_y < 0 || px_x >= width || px_y >= height {
                        continue;
                    }
                    let alpha = cov as u32 * a as u32 / 255;
                    let idx = px_y as usize * stride + px_x as usize * 4;
                    // keep the most opaque coverage where glyphs overlap
                    if alpha as u8 <= data[idx + 3] {
                        continue;
                    }
                    data[idx] = (r as u32 * alpha / 255) as u8;
                    data[idx + 1] = (g as u32 * alpha / 255) as u8;
                    data[idx + 2] = (b as u32 * alpha / 255) as u8;
                    data[idx + 3] = alpha as u8;
                }
            }
            cursor += m.advance_width.round() as i32;
        }

        Some(TextRun { pixmap, ascent })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_font_shorthand() {
        assert_eq!(
            FontSpec::parse("24px sans-serif"),
            FontSpec {
                size: 24.0,
                family: "sans-serif".into()
            }
        );
        let bold = FontSpec::parse("bold 18px Helvetica Neue");
        assert_eq!(bold.size, 18.0);
        assert_eq!(bold.family, "Helvetica Neue");
        assert_eq!(FontSpec::parse("serif").size, 24.0);
        assert_eq!(FontSpec::parse("-3px serif").size, 24.0);
    }

    #[test]
    fn oversized_fonts_are_capped() {
        assert_eq!(FontSpec::parse("1000000px serif").size, MAX_FONT_SIZE);
        assert_eq!(FontSpec::parse("1e30px serif").size, MAX_FONT_SIZE);
        assert_eq!(FontSpec::parse("infpx serif").size, 24.0);
        assert_eq!(FontSpec::parse("-3px serif").size, 24.0);
    }

    #[test]
    fn garbage_font_bytes_are_a_config_error() {
        let err = GlyphRasterizer::from_bytes(b"not a font").err().unwrap();
        assert_eq!(err.category(), "configuration");
    }

    #[test]
    fn missing_font_file_is_io() {
        let err = GlyphRasterizer::from_file(Path::new("/definitely/not/here.ttf"))
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::Io { .. }));
    }
}
