mod boxes;
mod cache;
mod canvas;
mod composite;
mod font;
mod ladder;
mod layout;
mod style;

use anyhow::Result;

pub use boxes::{Region, RegionRect, TextBox, TextEntry, resolve_boxes};
pub use cache::{FontCache, FontSource};
pub use canvas::{Canvas, TextSurface};
pub use composite::{StrokePass, render_boxes, stroke_passes};
pub use font::{FontFace, fallback_families, load_font_face, resolve_font_face};
pub use ladder::{
    DEFAULT_LADDER, FontLadder, FontVariant, LadderStep, ResolvedFont, Tone, VariantKey,
};
pub use style::{Palette, parse_hex_color};

pub struct ComposeRequest<'a> {
    pub image_bytes: &'a [u8],
    pub target_size: Option<(u32, u32)>,
    pub regions: &'a [Region],
    pub texts: &'a [TextEntry],
}

/// One create session: decode, resize, resolve boxes, paint, encode. Any
/// failure leaves no output at all.
pub fn compose_image(
    request: ComposeRequest<'_>,
    ladder: &FontLadder,
    fonts: &FontCache,
) -> Result<Vec<u8>> {
    let boxes = resolve_boxes(request.texts, request.regions)?;
    let mut canvas = Canvas::load(request.image_bytes, request.target_size)?;
    render_boxes(&mut canvas, &boxes, ladder, fonts)?;
    canvas.encode_png()
}
