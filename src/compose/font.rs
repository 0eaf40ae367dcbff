use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

/// Parsed font file shared by every ladder variant. Metrics are kept in font
/// units and scaled per size on demand.
#[derive(Clone)]
pub struct FontFace {
    data: Arc<Vec<u8>>,
    face_index: u32,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    line_gap: i16,
    space_advance: u16,
    family: Option<String>,
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFace")
            .field("family", &self.family)
            .field("face_index", &self.face_index)
            .field("units_per_em", &self.units_per_em)
            .finish()
    }
}

impl FontFace {
    pub fn from_data(data: Vec<u8>) -> Result<Self> {
        load_face_from_data(data, None)
    }

    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub(crate) fn parse(&self) -> Result<Face<'_>> {
        Face::parse(&self.data, self.face_index)
            .map_err(|err| anyhow!("font data became unreadable: {}", err))
    }

    fn scale(&self, size_px: f32) -> f32 {
        size_px / self.units_per_em.max(1) as f32
    }

    pub(crate) fn ascender_px(&self, size_px: f32) -> f32 {
        self.ascender as f32 * self.scale(size_px)
    }

    pub(crate) fn line_height_px(&self, size_px: f32) -> f32 {
        let units = self.ascender as i32 - self.descender as i32 + self.line_gap as i32;
        units.max(1) as f32 * self.scale(size_px)
    }

    pub(crate) fn space_advance_px(&self, size_px: f32) -> f32 {
        self.space_advance as f32 * self.scale(size_px)
    }

    /// Glyph advance for `ch`, falling back to the space advance for glyphs
    /// the face does not cover.
    pub(crate) fn advance_px(&self, face: &Face<'_>, ch: char, size_px: f32) -> f32 {
        let units = face
            .glyph_index(ch)
            .and_then(|glyph| face.glyph_hor_advance(glyph))
            .unwrap_or(self.space_advance);
        units as f32 * self.scale(size_px)
    }

    pub(crate) fn text_width_px(&self, face: &Face<'_>, text: &str, size_px: f32) -> f32 {
        text.chars()
            .filter(|ch| *ch != '\n')
            .map(|ch| {
                if ch == ' ' {
                    self.space_advance_px(size_px)
                } else {
                    self.advance_px(face, ch, size_px)
                }
            })
            .sum()
    }
}

pub fn load_font_face(path: &Path) -> Result<FontFace> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_face_from_data(data, None)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

/// Picks the face used for every ladder step: an explicit file wins, then a
/// named system family, then the platform fallbacks.
pub fn resolve_font_face(
    font_path: Option<&Path>,
    font_family: Option<&str>,
    fallback: &[&str],
) -> Result<FontFace> {
    if let Some(path) = font_path {
        let face = load_font_face(path)?;
        info!(
            "font: loaded {} ({})",
            path.display(),
            face.family().unwrap_or("unnamed")
        );
        return Ok(face);
    }

    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    if let Some(family) = font_family {
        return load_face_from_family(&db, family);
    }

    for candidate in fallback {
        if let Ok(face) = load_face_from_family(&db, candidate) {
            return Ok(face);
        }
    }

    Err(anyhow!("no fallback fonts found"))
}

#[cfg(target_os = "macos")]
pub fn fallback_families() -> &'static [&'static str] {
    &["Impact", "Helvetica", "sans-serif"]
}

#[cfg(target_os = "windows")]
pub fn fallback_families() -> &'static [&'static str] {
    &["Impact", "Arial", "sans-serif"]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub fn fallback_families() -> &'static [&'static str] {
    &["DejaVu Sans", "Liberation Sans", "NotoSans", "sans-serif"]
}

fn load_face_from_data(data: Vec<u8>, preferred_family: Option<&str>) -> Result<FontFace> {
    let data = Arc::new(data);
    let mut fallback = None;
    let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
    for index in 0..count {
        let Ok(face) = Face::parse(&data, index) else {
            continue;
        };
        let family = extract_family_name(&face);
        let units_per_em = face.units_per_em().max(1);
        let space_advance = face
            .glyph_index(' ')
            .and_then(|id| face.glyph_hor_advance(id))
            .unwrap_or(units_per_em / 2);
        let loaded = FontFace {
            data: data.clone(),
            face_index: index,
            units_per_em,
            ascender: face.ascender(),
            descender: face.descender(),
            line_gap: face.line_gap(),
            space_advance,
            family: family.clone(),
        };
        if let (Some(preferred), Some(found)) = (preferred_family, &family) {
            if found.eq_ignore_ascii_case(preferred) {
                return Ok(loaded);
            }
        }
        if fallback.is_none() {
            fallback = Some(loaded);
        }
    }
    fallback.ok_or_else(|| anyhow!("failed to parse font data"))
}

fn load_face_from_family(db: &fontdb::Database, family: &str) -> Result<FontFace> {
    let families = if family.eq_ignore_ascii_case("sans-serif") {
        vec![fontdb::Family::SansSerif]
    } else {
        vec![fontdb::Family::Name(family)]
    };
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {}", family))?;
    let data = db
        .with_face_data(id, |data, _index| data.to_vec())
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    let face = load_face_from_data(data, Some(family))?;
    info!("font: resolved family {}", face.family().unwrap_or(family));
    Ok(face)
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}
