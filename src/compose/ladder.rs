use anyhow::{Result, anyhow};
use std::sync::Arc;
use tracing::debug;

use super::cache::FontCache;
use super::font::FontFace;
use super::layout::wrap_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tone {
    Bright,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariantKey {
    pub size: u32,
    pub tone: Tone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LadderStep {
    pub size: u32,
    pub stroke: u32,
}

pub const DEFAULT_LADDER: &[LadderStep] = &[
    LadderStep { size: 128, stroke: 4 },
    LadderStep { size: 64, stroke: 3 },
    LadderStep { size: 32, stroke: 2 },
    LadderStep { size: 16, stroke: 1 },
    LadderStep { size: 8, stroke: 1 },
];

/// One colored rasterizer at one ladder size. Bright and dark variants of
/// the same size share the face, so their layout is identical.
pub struct FontVariant {
    key: VariantKey,
    face: Arc<FontFace>,
    color: [u8; 4],
}

impl FontVariant {
    pub(crate) fn new(key: VariantKey, face: Arc<FontFace>, color: [u8; 4]) -> Self {
        Self { key, face, color }
    }

    pub fn key(&self) -> VariantKey {
        self.key
    }

    pub fn size_px(&self) -> f32 {
        self.key.size as f32
    }

    pub fn color(&self) -> [u8; 4] {
        self.color
    }

    pub(crate) fn face(&self) -> &FontFace {
        &self.face
    }

    pub fn line_height(&self) -> f32 {
        self.face.line_height_px(self.size_px())
    }

    pub fn wrap(&self, text: &str, max_width: f32) -> Result<Vec<String>> {
        let face = self.face.parse()?;
        let size = self.size_px();
        Ok(wrap_text(text, max_width, |line| {
            self.face.text_width_px(&face, line, size)
        }))
    }

    pub fn wrapped_height(&self, text: &str, max_width: f32) -> Result<f32> {
        let lines = self.wrap(text, max_width)?;
        Ok(lines.len() as f32 * self.line_height())
    }
}

pub struct ResolvedFont {
    pub step: LadderStep,
    pub bright: Arc<FontVariant>,
    pub dark: Arc<FontVariant>,
}

impl ResolvedFont {
    pub fn stroke(&self) -> u32 {
        self.step.stroke
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontLadder {
    steps: Vec<LadderStep>,
}

impl Default for FontLadder {
    fn default() -> Self {
        Self {
            steps: DEFAULT_LADDER.to_vec(),
        }
    }
}

impl FontLadder {
    /// Sizes must strictly descend and strokes must never grow.
    pub fn new(steps: Vec<LadderStep>) -> Result<Self> {
        if steps.is_empty() {
            return Err(anyhow!("font ladder is empty"));
        }
        for pair in steps.windows(2) {
            let (larger, smaller) = (pair[0], pair[1]);
            if larger.size <= smaller.size {
                return Err(anyhow!(
                    "font ladder sizes must descend ({} then {})",
                    larger.size,
                    smaller.size
                ));
            }
            if larger.stroke < smaller.stroke {
                return Err(anyhow!(
                    "font ladder strokes must not grow ({} then {})",
                    larger.stroke,
                    smaller.stroke
                ));
            }
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[LadderStep] {
        &self.steps
    }

    pub fn smallest(&self) -> LadderStep {
        // `new` and `default` both guarantee at least one step.
        self.steps[self.steps.len() - 1]
    }

    /// First step, largest first, whose required height fits `box_height`;
    /// the smallest step when none does.
    pub fn select<F>(&self, box_height: f32, mut required_height: F) -> Result<LadderStep>
    where
        F: FnMut(LadderStep) -> Result<f32>,
    {
        for step in &self.steps {
            if required_height(*step)? <= box_height {
                return Ok(*step);
            }
        }
        Ok(self.smallest())
    }

    pub fn resolve(
        &self,
        fonts: &FontCache,
        text: &str,
        box_width: u32,
        box_height: u32,
    ) -> Result<ResolvedFont> {
        let step = self.select(box_height as f32, |step| {
            let bright = fonts.variant(VariantKey {
                size: step.size,
                tone: Tone::Bright,
            })?;
            bright.wrapped_height(text, box_width as f32)
        })?;
        debug!(
            "ladder: {}px stroke {} for {}x{} box",
            step.size, step.stroke, box_width, box_height
        );
        Ok(ResolvedFont {
            step,
            bright: fonts.variant(VariantKey {
                size: step.size,
                tone: Tone::Bright,
            })?,
            dark: fonts.variant(VariantKey {
                size: step.size,
                tone: Tone::Dark,
            })?,
        })
    }
}
