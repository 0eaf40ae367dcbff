use anyhow::Result;

use super::boxes::TextBox;
use super::cache::FontCache;
use super::canvas::TextSurface;
use super::ladder::{FontLadder, Tone};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrokePass {
    pub tone: Tone,
    pub dx: i32,
    pub dy: i32,
}

/// Eight dark copies around the origin, then the bright fill on top.
/// Diagonals use the full stroke on both axes.
pub fn stroke_passes(stroke: u32) -> [StrokePass; 9] {
    let s = stroke as i32;
    let dark = |dx, dy| StrokePass {
        tone: Tone::Dark,
        dx,
        dy,
    };
    [
        dark(-s, 0),
        dark(s, 0),
        dark(0, -s),
        dark(0, s),
        dark(-s, -s),
        dark(-s, s),
        dark(s, -s),
        dark(s, s),
        StrokePass {
            tone: Tone::Bright,
            dx: 0,
            dy: 0,
        },
    ]
}

/// Paints every box in order, so later boxes land on top of earlier ones.
pub fn render_boxes<S: TextSurface>(
    surface: &mut S,
    boxes: &[TextBox],
    ladder: &FontLadder,
    fonts: &FontCache,
) -> Result<()> {
    for text_box in boxes {
        let resolved = ladder.resolve(fonts, &text_box.text, text_box.width, text_box.height)?;
        let clip = (text_box.width, text_box.height);
        for pass in stroke_passes(resolved.stroke()) {
            let variant = match pass.tone {
                Tone::Dark => &resolved.dark,
                Tone::Bright => &resolved.bright,
            };
            let origin = (
                text_box.left.saturating_add(pass.dx),
                text_box.top.saturating_add(pass.dy),
            );
            surface.draw_text(variant, &text_box.text, origin, clip)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::ladder::FontVariant;
    use crate::compose::style::Palette;

    #[derive(Default)]
    struct RecordingSurface {
        calls: Vec<(Tone, u32, (i32, i32), (u32, u32))>,
    }

    impl TextSurface for RecordingSurface {
        fn draw_text(
            &mut self,
            variant: &FontVariant,
            _text: &str,
            origin: (i32, i32),
            clip: (u32, u32),
        ) -> Result<()> {
            self.calls
                .push((variant.key().tone, variant.key().size, origin, clip));
            Ok(())
        }
    }

    #[test]
    fn dark_passes_surround_origin_before_fill() {
        let passes = stroke_passes(3);
        assert_eq!(passes.len(), 9);
        assert!(passes[..8].iter().all(|pass| pass.tone == Tone::Dark));
        assert_eq!(
            passes[8],
            StrokePass {
                tone: Tone::Bright,
                dx: 0,
                dy: 0
            }
        );
        let offsets: Vec<(i32, i32)> = passes[..8].iter().map(|p| (p.dx, p.dy)).collect();
        assert_eq!(
            offsets,
            vec![
                (-3, 0),
                (3, 0),
                (0, -3),
                (0, 3),
                (-3, -3),
                (-3, 3),
                (3, -3),
                (3, 3)
            ]
        );
    }

    #[test]
    fn every_box_gets_nine_draws_in_order() {
        let Some(face) = crate::test_util::system_face() else {
            return;
        };
        let fonts = FontCache::with_face(face, Palette::default());
        let ladder = FontLadder::default();
        let boxes = vec![
            TextBox {
                text: "top text".to_string(),
                left: 10,
                top: 20,
                width: 400,
                height: 200,
            },
            TextBox {
                text: "a much longer caption that has to shrink a lot".to_string(),
                left: 0,
                top: 300,
                width: 60,
                height: 20,
            },
        ];
        let mut surface = RecordingSurface::default();
        render_boxes(&mut surface, &boxes, &ladder, &fonts).unwrap();

        assert_eq!(surface.calls.len(), 18);
        for (chunk, text_box) in surface.calls.chunks(9).zip(&boxes) {
            let size = chunk[0].1;
            assert!(chunk.iter().all(|call| call.1 == size));
            assert!(chunk[..8].iter().all(|call| call.0 == Tone::Dark));
            assert_eq!(chunk[8].0, Tone::Bright);
            assert_eq!(chunk[8].2, (text_box.left, text_box.top));
            assert!(chunk
                .iter()
                .all(|call| call.3 == (text_box.width, text_box.height)));
        }
    }

    #[test]
    fn offsets_saturate_at_coordinate_limits() {
        let Some(face) = crate::test_util::system_face() else {
            return;
        };
        let fonts = FontCache::with_face(face, Palette::default());
        let boxes = vec![TextBox {
            text: "hi".to_string(),
            left: i32::MAX,
            top: i32::MIN,
            width: 50,
            height: 50,
        }];
        let mut surface = RecordingSurface::default();
        render_boxes(&mut surface, &boxes, &FontLadder::default(), &fonts).unwrap();

        assert_eq!(surface.calls.len(), 9);
        assert!(surface.calls.iter().all(|call| call.2.0 >= i32::MAX - 4));
        assert!(surface.calls.iter().all(|call| call.2.1 <= i32::MIN + 4));
        assert_eq!(surface.calls[1].2, (i32::MAX, i32::MIN));
        assert_eq!(surface.calls[8].2, (i32::MAX, i32::MIN));
    }
}
