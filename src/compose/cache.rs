use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use tracing::debug;

use super::font::{FontFace, fallback_families, resolve_font_face};
use super::ladder::{FontVariant, Tone, VariantKey};
use super::style::Palette;

/// Where the process-wide face comes from when the cache first needs it.
#[derive(Debug, Clone, Default)]
pub struct FontSource {
    pub path: Option<PathBuf>,
    pub family: Option<String>,
}

/// Lazily populated variant handles keyed by `(size, tone)`. Each key is
/// written once; afterwards lookups only take the read lock.
pub struct FontCache {
    source: FontSource,
    palette: Palette,
    face: OnceLock<Arc<FontFace>>,
    face_load: Mutex<()>,
    face_loads: AtomicUsize,
    variants: RwLock<HashMap<VariantKey, Arc<FontVariant>>>,
}

impl FontCache {
    pub fn new(source: FontSource, palette: Palette) -> Self {
        Self {
            source,
            palette,
            face: OnceLock::new(),
            face_load: Mutex::new(()),
            face_loads: AtomicUsize::new(0),
            variants: RwLock::new(HashMap::new()),
        }
    }

    /// A cache whose face is already loaded, so no font lookup ever runs.
    pub fn with_face(face: FontFace, palette: Palette) -> Self {
        let cache = Self::new(FontSource::default(), palette);
        let _ = cache.face.set(Arc::new(face));
        cache
    }

    pub fn palette(&self) -> Palette {
        self.palette
    }

    pub fn face(&self) -> Result<Arc<FontFace>> {
        if let Some(face) = self.face.get() {
            return Ok(face.clone());
        }
        // Only one caller scans the font database; the rest wait and reuse it.
        let _guard = self
            .face_load
            .lock()
            .map_err(|_| anyhow!("font load lock poisoned"))?;
        if let Some(face) = self.face.get() {
            return Ok(face.clone());
        }
        self.face_loads.fetch_add(1, Ordering::Relaxed);
        let loaded = Arc::new(resolve_font_face(
            self.source.path.as_deref(),
            self.source.family.as_deref(),
            fallback_families(),
        )?);
        debug!("font cache: loaded face {}", loaded.family().unwrap_or("unnamed"));
        let _ = self.face.set(loaded.clone());
        Ok(loaded)
    }

    /// How many times a face lookup actually ran.
    pub fn face_loads(&self) -> usize {
        self.face_loads.load(Ordering::Relaxed)
    }

    pub fn variant(&self, key: VariantKey) -> Result<Arc<FontVariant>> {
        {
            let variants = self
                .variants
                .read()
                .map_err(|_| anyhow!("font cache lock poisoned"))?;
            if let Some(existing) = variants.get(&key) {
                return Ok(existing.clone());
            }
        }

        let face = self.face()?;
        let color = match key.tone {
            Tone::Bright => self.palette.bright,
            Tone::Dark => self.palette.dark,
        };
        let mut variants = self
            .variants
            .write()
            .map_err(|_| anyhow!("font cache lock poisoned"))?;
        let entry = variants.entry(key).or_insert_with(|| {
            debug!("font cache: instantiate {:?} {}px", key.tone, key.size);
            Arc::new(FontVariant::new(key, face, color))
        });
        Ok(entry.clone())
    }

    pub fn cached_variants(&self) -> usize {
        self.variants.read().map(|map| map.len()).unwrap_or(0)
    }
}
