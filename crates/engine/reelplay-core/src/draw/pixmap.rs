//! [`DrawSurface`] over a tiny-skia pixmap.

use std::sync::Once;

use tiny_skia::{
    Color, FillRule, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Transform,
};

use crate::draw::text::{FontSpec, GlyphRasterizer};
use crate::draw::DrawSurface;
use crate::error::EngineError;
use crate::props::Rgba;

static MISSING_FONT: Once = Once::new();

#[derive(Clone, Copy, Debug)]
struct DrawState {
    transform: Transform,
    alpha: f32,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            transform: Transform::identity(),
            alpha: 1.0,
        }
    }
}

/// Canvas-like drawing onto a borrowed pixmap.
pub struct PixmapSurface<'a> {
    pixmap: &'a mut Pixmap,
    glyphs: Option<&'a GlyphRasterizer>,
    state: DrawState,
    stack: Vec<DrawState>,
}

fn render_err(reason: impl Into<String>) -> EngineError {
    EngineError::Render {
        element_id: String::new(),
        reason: reason.into(),
    }
}

impl<'a> PixmapSurface<'a> {
    pub fn new(pixmap: &'a mut Pixmap, glyphs: Option<&'a GlyphRasterizer>) -> Self {
        Self {
            pixmap,
            glyphs,
            state: DrawState::default(),
            stack: Vec::new(),
        }
    }

    fn paint(&self, color: Rgba) -> crate::Result<Paint<'static>> {
        let a = (color.a * self.state.alpha).clamp(0.0, 1.0);
        let c = Color::from_rgba(
            color.r.clamp(0.0, 1.0),
            color.g.clamp(0.0, 1.0),
            color.b.clamp(0.0, 1.0),
            a,
        )
        .ok_or_else(|| render_err("invalid colour"))?;
        let mut paint = Paint::default();
        paint.set_color(c);
        paint.anti_alias = true;
        Ok(paint)
    }

    fn check_finite(&self, values: &[f32]) -> crate::Result<()> {
        if !self.state.transform.is_finite() {
            return Err(render_err("non-finite transform"));
        }
        if values.iter().all(|v| v.is_finite()) {
            Ok(())
        } else {
            Err(render_err("non-finite geometry"))
        }
    }
}

impl DrawSurface for PixmapSurface<'_> {
    fn save(&mut self) {
        self.stack.push(self.state);
    }

    fn restore(&mut self) {
        if let Some(prev) = self.stack.pop() {
            self.state = prev;
        }
    }

    fn set_alpha(&mut self, alpha: f32) {
        self.state.alpha = if alpha.is_finite() {
            alpha.clamp(0.0, 1.0)
        } else {
            1.0
        };
    }

    fn translate(&mut self, x: f32, y: f32) {
        self.state.transform = self
            .state
            .transform
            .pre_concat(Transform::from_translate(x, y));
    }

    fn rotate(&mut self, degrees: f32) {
        self.state.transform = self
            .state
            .transform
            .pre_concat(Transform::from_rotate(degrees));
    }

    fn scale(&mut self, sx: f32, sy: f32) {
        self.state.transform = self.state.transform.pre_concat(Transform::from_scale(sx, sy));
    }

    fn clear(&mut self, color: Rgba) {
        let [r, g, b, a] = color.to_rgba8();
        self.pixmap.fill(Color::from_rgba8(r, g, b, a));
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba) -> crate::Result<()> {
        self.check_finite(&[x, y, w, h])?;
        if w <= 0.0 || h <= 0.0 {
            return Ok(());
        }
        let rect = Rect::from_xywh(x, y, w, h).ok_or_else(|| render_err("invalid rect"))?;
        let paint = self.paint(color)?;
        self.pixmap
            .fill_rect(rect, &paint, self.state.transform, None);
        Ok(())
    }

    fn fill_round_rect(
        &mut self,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        radius: f32,
        color: Rgba,
    ) -> crate::Result<()> {
        self.check_finite(&[x, y, w, h, radius])?;
        if w <= 0.0 || h <= 0.0 {
            return Ok(());
        }
        let r = radius.min(w / 2.0).min(h / 2.0).max(0.0);
        let mut pb = PathBuilder::new();
        pb.move_to(x + r, y);
        pb.line_to(x + w - r, y);
        pb.quad_to(x + w, y, x + w, y + r);
        pb.line_to(x + w, y + h - r);
        pb.quad_to(x + w, y + h, x + w - r, y + h);
        pb.line_to(x + r, y + h);
        pb.quad_to(x, y + h, x, y + h - r);
        pb.line_to(x, y + r);
        pb.quad_to(x, y, x + r, y);
        pb.close();
        let path = pb.finish().ok_or_else(|| render_err("empty rounded rect"))?;
        let paint = self.paint(color)?;
        self.pixmap
            .fill_path(&path, &paint, FillRule::Winding, self.state.transform, None);
        Ok(())
    }

    fn fill_text(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        font: &FontSpec,
        color: Rgba,
    ) -> crate::Result<()> {
        let Some(glyphs) = self.glyphs else {
            MISSING_FONT.call_once(|| {
                log::warn!("no font configured for the raster backend, text is not drawn");
            });
            return Ok(());
        };
        self.check_finite(&[x, y])?;
        let Some(run) = glyphs.render(text, font.size, color) else {
            return Ok(());
        };
        let paint = PixmapPaint {
            opacity: self.state.alpha,
            ..PixmapPaint::default()
        };
        let transform = self
            .state
            .transform
            .pre_concat(Transform::from_translate(x, y - run.ascent as f32));
        self.pixmap
            .draw_pixmap(0, 0, run.pixmap.as_ref(), &paint, transform, None);
        Ok(())
    }

    fn draw_image(&mut self, image: &Pixmap, x: f32, y: f32, w: f32, h: f32) -> crate::Result<()> {
        self.check_finite(&[x, y, w, h])?;
        if w <= 0.0 || h <= 0.0 || image.width() == 0 || image.height() == 0 {
            return Ok(());
        }
        let sx = w / image.width() as f32;
        let sy = h / image.height() as f32;
        let transform = self
            .state
            .transform
            .pre_concat(Transform::from_translate(x, y))
            .pre_concat(Transform::from_scale(sx, sy));
        let paint = PixmapPaint {
            opacity: self.state.alpha,
            ..PixmapPaint::default()
        };
        self.pixmap
            .draw_pixmap(0, 0, image.as_ref(), &paint, transform, None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba_at(pixmap: &Pixmap, x: u32, y: u32) -> [u8; 4] {
        let c = pixmap.pixel(x, y).unwrap().demultiply();
        [c.red(), c.green(), c.blue(), c.alpha()]
    }

    #[test]
    fn fills_rect_under_transform_and_restores() {
        let mut pixmap = Pixmap::new(20, 20).unwrap();
        {
            let mut surface = PixmapSurface::new(&mut pixmap, None);
            surface.save();
            surface.translate(10.0, 10.0);
            surface.fill_rect(0.0, 0.0, 5.0, 5.0, Rgba::new(1.0, 0.0, 0.0, 1.0))
                .unwrap();
            surface.restore();
            surface
                .fill_rect(0.0, 0.0, 2.0, 2.0, Rgba::new(0.0, 0.0, 1.0, 1.0))
                .unwrap();
        }
        assert_eq!(rgba_at(&pixmap, 12, 12), [255, 0, 0, 255]);
        assert_eq!(rgba_at(&pixmap, 1, 1), [0, 0, 255, 255]);
        assert_eq!(rgba_at(&pixmap, 5, 5)[3], 0);
    }

    #[test]
    fn alpha_scales_coverage() {
        let mut pixmap = Pixmap::new(4, 4).unwrap();
        {
            let mut surface = PixmapSurface::new(&mut pixmap, None);
            surface.set_alpha(0.5);
            surface.fill_rect(0.0, 0.0, 4.0, 4.0, Rgba::WHITE).unwrap();
        }
        let a = rgba_at(&pixmap, 2, 2)[3];
        assert!((126..=129).contains(&a), "alpha was {a}");
    }

    #[test]
    fn rounded_rect_leaves_corners_empty() {
        let mut pixmap = Pixmap::new(20, 20).unwrap();
        {
            let mut surface = PixmapSurface::new(&mut pixmap, None);
            surface
                .fill_round_rect(0.0, 0.0, 20.0, 20.0, 8.0, Rgba::BLACK)
                .unwrap();
        }
        assert_eq!(rgba_at(&pixmap, 0, 0)[3], 0);
        assert_eq!(rgba_at(&pixmap, 10, 10)[3], 255);
    }

    #[test]
    fn non_finite_geometry_is_a_render_error() {
        let mut pixmap = Pixmap::new(4, 4).unwrap();
        let mut surface = PixmapSurface::new(&mut pixmap, None);
        let err = surface
            .fill_rect(f32::NAN, 0.0, 1.0, 1.0, Rgba::BLACK)
            .unwrap_err();
        assert!(matches!(err, EngineError::Render { .. }));
    }

    #[test]
    fn text_without_font_is_skipped() {
        let mut pixmap = Pixmap::new(4, 4).unwrap();
        let mut surface = PixmapSurface::new(&mut pixmap, None);
        surface
            .fill_text("hi", 0.0, 2.0, &FontSpec::parse("12px serif"), Rgba::BLACK)
            .unwrap();
        drop(surface);
        assert!(pixmap.data().iter().all(|b| *b == 0));
    }

    #[test]
    fn images_are_stretched_to_the_target_rect() {
        let mut src = Pixmap::new(2, 2).unwrap();
        src.fill(Color::from_rgba8(0, 255, 0, 255));
        let mut pixmap = Pixmap::new(10, 10).unwrap();
        {
            let mut surface = PixmapSurface::new(&mut pixmap, None);
            surface.draw_image(&src, 0.0, 0.0, 8.0, 8.0).unwrap();
        }
        assert_eq!(rgba_at(&pixmap, 6, 6), [0, 255, 0, 255]);
        assert_eq!(rgba_at(&pixmap, 9, 9)[3], 0);
    }
}
