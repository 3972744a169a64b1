//! Per-element raster drawing.
//!
//! [`draw_element`] turns one element and its current property bag into
//! pixels on a [`DrawSurface`]. Every element is drawn inside a
//! save/restore pair so transforms and alpha never leak to the next one.

pub mod pixmap;
pub mod text;

use tiny_skia::Pixmap;

use crate::error::EngineError;
use crate::image_loader::ImageCache;
use crate::model::{AnimationElement, ElementType};
use crate::props::{PropKey, PropertyBag, Rgba};

pub use pixmap::PixmapSurface;
pub use text::{FontSpec, GlyphRasterizer};

pub const DEFAULT_WIDTH: f32 = 50.0;
pub const DEFAULT_HEIGHT: f32 = 50.0;
pub const DEFAULT_FONT: &str = "24px sans-serif";

/// Fallback fill, `#222`.
pub const DEFAULT_FILL: Rgba = Rgba::new(0x22 as f32 / 255.0, 0x22 as f32 / 255.0, 0x22 as f32 / 255.0, 1.0);

/// Immediate-mode 2D drawing with a save/restore state stack.
///
/// Geometry is given in the current local space; translate/rotate/scale
/// compose onto the current transform like a canvas context.
pub trait DrawSurface {
    fn save(&mut self);
    fn restore(&mut self);

    /// Alpha multiplied into every subsequent fill (not cumulative).
    fn set_alpha(&mut self, alpha: f32);
    fn translate(&mut self, x: f32, y: f32);
    /// Rotation in degrees.
    fn rotate(&mut self, degrees: f32);
    fn scale(&mut self, sx: f32, sy: f32);

    fn clear(&mut self, color: Rgba);
    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba) -> crate::Result<()>;
    fn fill_round_rect(
        &mut self,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        radius: f32,
        color: Rgba,
    ) -> crate::Result<()>;
    /// Draw `text` with its baseline starting at (x, y).
    fn fill_text(&mut self, text: &str, x: f32, y: f32, font: &FontSpec, color: Rgba)
        -> crate::Result<()>;
    /// Draw `image` stretched to (x, y, w, h).
    fn draw_image(&mut self, image: &Pixmap, x: f32, y: f32, w: f32, h: f32) -> crate::Result<()>;
}

/// Draw one element from its property bag.
///
/// `group`, `audio`, `camera` and unknown element types use the shape path.
pub fn draw_element(
    surface: &mut dyn DrawSurface,
    element: &AnimationElement,
    props: &PropertyBag,
    images: &mut ImageCache,
) -> crate::Result<()> {
    surface.save();
    let result = draw_inner(surface, element, props, images);
    surface.restore();
    result.map_err(|err| match err {
        EngineError::Render { reason, .. } => EngineError::Render {
            element_id: element.id.clone(),
            reason,
        },
        other => other,
    })
}

fn draw_inner(
    surface: &mut dyn DrawSurface,
    element: &AnimationElement,
    props: &PropertyBag,
    images: &mut ImageCache,
) -> crate::Result<()> {
    let num = |key: PropKey, default: f32| props.number(&key).unwrap_or(default);
    let x = num(PropKey::X, 0.0);
    let y = num(PropKey::Y, 0.0);
    let width = num(PropKey::Width, DEFAULT_WIDTH);
    let height = num(PropKey::Height, DEFAULT_HEIGHT);
    let opacity = num(PropKey::Opacity, 1.0);
    let rotation = num(PropKey::Rotation, 0.0);
    let scale = num(PropKey::Scale, 1.0);
    let radius = num(PropKey::BorderRadius, 0.0);
    let fill = props
        .color(&PropKey::Fill)
        .or_else(|| props.color(&PropKey::BackgroundColor))
        .unwrap_or(DEFAULT_FILL);

    surface.set_alpha(opacity);
    surface.translate(x, y);
    if rotation != 0.0 {
        surface.rotate(rotation);
    }
    if scale != 1.0 {
        surface.scale(scale, scale);
    }

    match element.kind {
        ElementType::Shape if radius > 0.0 => {
            surface.fill_round_rect(0.0, 0.0, width, height, radius, fill)
        }
        ElementType::Text => {
            let content = props
                .get(&PropKey::Text)
                .map(|v| v.to_css())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| element.name.clone());
            let color = props
                .color(&PropKey::Fill)
                .or_else(|| props.color(&PropKey::Color))
                .unwrap_or(fill);
            let font = FontSpec::parse(props.text(&PropKey::Font).unwrap_or(DEFAULT_FONT));
            surface.fill_text(&content, 0.0, height / 2.0, &font, color)
        }
        ElementType::Image => {
            let Some(src) = props.text(&PropKey::Src) else {
                return Ok(());
            };
            match images.get_or_request(&element.id, src) {
                Some(bitmap) => surface.draw_image(bitmap, 0.0, 0.0, width, height),
                None => Ok(()),
            }
        }
        _ => surface.fill_rect(0.0, 0.0, width, height, fill),
    }
}
