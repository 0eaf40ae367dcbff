use anyhow::{Context, Result, anyhow};
use image::imageops::FilterType;
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use tiny_skia::{ColorU8, FillRule, Paint, PathBuilder, Pixmap, PixmapPaint, Transform};
use tracing::info;

use super::ladder::FontVariant;
use crate::error::InputError;

/// Anything the compositor can paint wrapped text onto.
pub trait TextSurface {
    /// Lays `text` out word-wrapped to `clip.0`, anchored at `origin`, and
    /// paints it clipped to a `clip` sized rectangle at that anchor.
    fn draw_text(
        &mut self,
        variant: &FontVariant,
        text: &str,
        origin: (i32, i32),
        clip: (u32, u32),
    ) -> Result<()>;
}

pub struct Canvas {
    pixmap: Pixmap,
}

impl Canvas {
    /// Decodes `bytes` and, when `target` differs from the decoded size,
    /// resizes before anything is drawn.
    pub fn load(bytes: &[u8], target: Option<(u32, u32)>) -> Result<Self> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|err| InputError::UndecodableImage(err.to_string()))?;
        let mut rgba = decoded.to_rgba8();
        if let Some((width, height)) = target {
            if width > 0 && height > 0 && rgba.dimensions() != (width, height) {
                info!(
                    "canvas: resize {}x{} -> {}x{}",
                    rgba.width(),
                    rgba.height(),
                    width,
                    height
                );
                rgba = image::imageops::resize(&rgba, width, height, FilterType::Triangle);
            }
        }
        Self::from_rgba(&rgba)
    }

    pub fn from_rgba(image: &RgbaImage) -> Result<Self> {
        let mut pixmap = Pixmap::new(image.width(), image.height())
            .ok_or_else(|| anyhow!("template image has no pixels"))?;
        for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
            let [r, g, b, a] = src.0;
            *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
        }
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn to_rgba(&self) -> Result<RgbaImage> {
        let mut raw = Vec::with_capacity(self.pixmap.data().len());
        for pixel in self.pixmap.pixels() {
            let color = pixel.demultiply();
            raw.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
        }
        RgbaImage::from_raw(self.width(), self.height(), raw)
            .ok_or_else(|| anyhow!("failed to build image buffer from canvas"))
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let image = self.to_rgba()?;
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .with_context(|| "failed to encode composited image")?;
        Ok(bytes)
    }

    /// The part of a `clip` rectangle anchored at `origin` that lies on the
    /// canvas, as `(x, y, width, height)`.
    fn visible_clip(&self, origin: (i32, i32), clip: (u32, u32)) -> Option<(i32, i32, u32, u32)> {
        let left = i64::from(origin.0).max(0);
        let top = i64::from(origin.1).max(0);
        let right = (i64::from(origin.0) + i64::from(clip.0.max(1))).min(i64::from(self.width()));
        let bottom =
            (i64::from(origin.1) + i64::from(clip.1.max(1))).min(i64::from(self.height()));
        if right <= left || bottom <= top {
            return None;
        }
        Some((
            left as i32,
            top as i32,
            (right - left) as u32,
            (bottom - top) as u32,
        ))
    }
}

impl TextSurface for Canvas {
    fn draw_text(
        &mut self,
        variant: &FontVariant,
        text: &str,
        origin: (i32, i32),
        clip: (u32, u32),
    ) -> Result<()> {
        let Some((x0, y0, width, height)) = self.visible_clip(origin, clip) else {
            return Ok(());
        };
        let lines = variant.wrap(text, clip.0 as f32)?;
        if lines.is_empty() {
            return Ok(());
        }
        let font = variant.face();
        let face = font.parse()?;
        let size = variant.size_px();
        let scale = size / face.units_per_em().max(1) as f32;
        let ascender = font.ascender_px(size);
        let line_height = variant.line_height();

        // Glyphs are laid out relative to the visible clip corner.
        let shift_x = (i64::from(origin.0) - i64::from(x0)) as f32;
        let shift_y = (i64::from(origin.1) - i64::from(y0)) as f32;
        let mut builder = PathBuilder::new();
        for (row, line) in lines.iter().enumerate() {
            let baseline = shift_y + ascender + row as f32 * line_height;
            let mut pen_x = shift_x;
            for ch in line.chars() {
                if ch == ' ' {
                    pen_x += font.space_advance_px(size);
                    continue;
                }
                if let Some(glyph) = face.glyph_index(ch) {
                    let mut outline = GlyphOutline {
                        builder: &mut builder,
                        x: pen_x,
                        y: baseline,
                        scale,
                    };
                    face.outline_glyph(glyph, &mut outline);
                }
                pen_x += font.advance_px(&face, ch, size);
            }
        }
        let Some(path) = builder.finish() else {
            return Ok(());
        };

        let mut layer =
            Pixmap::new(width, height).ok_or_else(|| anyhow!("failed to allocate text layer"))?;
        let [r, g, b, a] = variant.color();
        let mut paint = Paint::default();
        paint.set_color_rgba8(r, g, b, a);
        paint.anti_alias = true;
        layer.fill_path(
            &path,
            &paint,
            FillRule::Winding,
            Transform::identity(),
            None,
        );
        self.pixmap.draw_pixmap(
            x0,
            y0,
            layer.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
        Ok(())
    }
}

/// Maps font-unit outlines (y up) into canvas pixels (y down) around a pen
/// position on the baseline.
struct GlyphOutline<'a> {
    builder: &'a mut PathBuilder,
    x: f32,
    y: f32,
    scale: f32,
}

impl GlyphOutline<'_> {
    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.x + x * self.scale, self.y - y * self.scale)
    }
}

impl ttf_parser::OutlineBuilder for GlyphOutline<'_> {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}
