use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::compose::{
    ComposeRequest, FontCache, FontLadder, TextBox, TextEntry, compose_image, resolve_boxes,
};
use crate::settings::Settings;
use crate::template::TemplateCatalog;

pub struct CreateImage {
    pub template: String,
    pub texts: Vec<TextEntry>,
    /// Replaces the catalog image when set.
    pub image_bytes: Option<Vec<u8>>,
}

/// Process-wide state shared by every surface: the catalog, the fixed
/// ladder and the font cache.
pub struct Captioner {
    settings: Settings,
    catalog: TemplateCatalog,
    ladder: FontLadder,
    fonts: FontCache,
}

impl Captioner {
    pub fn new(settings: Settings) -> Result<Self> {
        let catalog = TemplateCatalog::load(
            Path::new(&settings.catalog_path),
            Path::new(&settings.images_dir),
        )?;
        Self::with_catalog(settings, catalog)
    }

    pub fn with_catalog(settings: Settings, catalog: TemplateCatalog) -> Result<Self> {
        let fonts = FontCache::new(settings.font_source(), settings.palette()?);
        Ok(Self::from_parts(settings, catalog, FontLadder::default(), fonts))
    }

    pub fn from_parts(
        settings: Settings,
        catalog: TemplateCatalog,
        ladder: FontLadder,
        fonts: FontCache,
    ) -> Self {
        Self {
            settings,
            catalog,
            ladder,
            fonts,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    /// Boxes that `create_image` would paint, without touching any pixels.
    pub fn plan(&self, template: &str, texts: &[TextEntry]) -> Result<Vec<TextBox>> {
        let record = self.catalog.get(template)?;
        resolve_boxes(texts, &record.text_options)
    }

    pub async fn create_image(self: &Arc<Self>, request: CreateImage) -> Result<Vec<u8>> {
        let record = self.catalog.get(&request.template)?.clone();
        let image_bytes = match request.image_bytes {
            Some(bytes) => bytes,
            None => self.catalog.load_image_bytes(&record).await?,
        };
        let this = self.clone();
        let template = request.template;
        let texts = request.texts;
        let output = tokio::task::spawn_blocking(move || {
            compose_image(
                ComposeRequest {
                    image_bytes: &image_bytes,
                    target_size: record.target_size(),
                    regions: &record.text_options,
                    texts: &texts,
                },
                &this.ladder,
                &this.fonts,
            )
        })
        .await
        .map_err(|err| anyhow!("compose task failed: {}", err))?
        .with_context(|| format!("failed to create image for template '{}'", template))?;
        info!(
            "compose: template {} -> {} bytes png",
            template,
            output.len()
        );
        Ok(output)
    }
}
