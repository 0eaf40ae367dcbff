use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::compose::Region;
use crate::error::InputError;

/// One entry of the template catalog, as produced by the scraper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_description: Option<String>,
    #[serde(default)]
    pub text_options: Vec<Region>,
}

impl TemplateRecord {
    /// Logical size the source image is resized to before drawing.
    pub fn target_size(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => Some((width, height)),
            _ => None,
        }
    }

    fn matches(&self, id: &str, needle: &str) -> bool {
        let haystacks = [Some(id), Some(self.name.as_str()), self.image_description.as_deref()];
        haystacks
            .into_iter()
            .flatten()
            .chain(
                self.text_options
                    .iter()
                    .filter_map(|region| region.description.as_deref()),
            )
            .any(|value| value.to_lowercase().contains(needle))
    }
}

#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: BTreeMap<String, TemplateRecord>,
    images_dir: PathBuf,
}

impl TemplateCatalog {
    pub fn load(catalog_path: &Path, images_dir: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(catalog_path).with_context(|| {
            format!("failed to read template catalog: {}", catalog_path.display())
        })?;
        let templates: BTreeMap<String, TemplateRecord> = serde_json::from_str(&content)
            .with_context(|| {
                format!(
                    "failed to parse template catalog: {}",
                    catalog_path.display()
                )
            })?;
        info!(
            "templates: loaded {} from {}",
            templates.len(),
            catalog_path.display()
        );
        Ok(Self::from_records(templates, images_dir))
    }

    pub fn from_records(templates: BTreeMap<String, TemplateRecord>, images_dir: &Path) -> Self {
        Self {
            templates,
            images_dir: images_dir.to_path_buf(),
        }
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn get(&self, id: &str) -> Result<&TemplateRecord> {
        self.templates
            .get(id)
            .ok_or_else(|| InputError::TemplateNotFound(id.to_string()).into())
    }

    /// Case-insensitive substring filter over ids, names and descriptions.
    /// An empty query lists everything.
    pub fn search(&self, query: &str) -> Vec<(&str, &TemplateRecord)> {
        let needle = query.trim().to_lowercase();
        self.templates
            .iter()
            .filter(|(id, record)| needle.is_empty() || record.matches(id, &needle))
            .map(|(id, record)| (id.as_str(), record))
            .collect()
    }

    pub fn image_path(&self, record: &TemplateRecord) -> PathBuf {
        self.images_dir.join(&record.filename)
    }

    /// Reads the template image from the images directory, falling back to
    /// the record's `image_url` when the file is absent.
    pub async fn load_image_bytes(&self, record: &TemplateRecord) -> Result<Vec<u8>> {
        let path = self.image_path(record);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read template image: {}", path.display()));
        }
        let Some(url) = record.image_url.as_deref() else {
            return Err(anyhow!(
                "template image not found: {} (no image_url to fetch)",
                path.display()
            ));
        };
        info!("templates: fetching {}", url);
        let response = reqwest::get(url)
            .await
            .with_context(|| format!("failed to fetch template image: {}", url))?
            .error_for_status()
            .with_context(|| format!("template image request failed: {}", url))?;
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("failed to read template image body: {}", url))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::is_input_error;
    use tempfile::tempdir;

    const CATALOG: &str = r#"{
        "drake-hotline-bling": {
            "name": "drake-hotline-bling",
            "url": "https://example.invalid/drake",
            "filename": "drake-hotline-bling.jpg",
            "width": 1200,
            "height": 1200,
            "image_description": "Drake rejecting one thing and approving another.",
            "text_options": [
                {"position": {"left": 600, "top": 0, "width": 600, "height": 600}, "description": "The rejected option"},
                {"position": {"left": 600, "top": 600, "width": 600, "height": 600},
                 "updated_position": {"left": 610, "top": 605, "width": 580, "height": 590},
                 "description": "The preferred option"}
            ]
        },
        "two-buttons": {
            "name": "two-buttons",
            "filename": "two-buttons.png",
            "text_options": []
        }
    }"#;

    fn write_catalog(dir: &Path) -> PathBuf {
        let path = dir.join("memes.json");
        std::fs::write(&path, CATALOG).expect("write catalog");
        path
    }

    #[test]
    fn loads_scraper_records() {
        let dir = tempdir().expect("tempdir");
        let catalog = TemplateCatalog::load(&write_catalog(dir.path()), dir.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        let drake = catalog.get("drake-hotline-bling").unwrap();
        assert_eq!(drake.target_size(), Some((1200, 1200)));
        assert_eq!(drake.text_options.len(), 2);
        assert_eq!(drake.text_options[1].effective_rect().left, 610.0);
        assert_eq!(catalog.get("two-buttons").unwrap().target_size(), None);
    }

    #[test]
    fn unknown_template_is_an_input_error() {
        let catalog = TemplateCatalog::default();
        let err = catalog.get("missing").unwrap_err();
        assert!(is_input_error(&err));
    }

    #[test]
    fn search_matches_region_descriptions() {
        let dir = tempdir().expect("tempdir");
        let catalog = TemplateCatalog::load(&write_catalog(dir.path()), dir.path()).unwrap();
        let hits: Vec<&str> = catalog.search("PREFERRED").into_iter().map(|(id, _)| id).collect();
        assert_eq!(hits, vec!["drake-hotline-bling"]);
        assert_eq!(catalog.search("").len(), 2);
        assert!(catalog.search("distracted").is_empty());
    }

    #[test]
    fn malformed_catalog_reports_path() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "[1, 2").expect("write");
        let err = TemplateCatalog::load(&path, dir.path()).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[tokio::test]
    async fn reads_local_image_before_fetching() {
        let dir = tempdir().expect("tempdir");
        let catalog = TemplateCatalog::load(&write_catalog(dir.path()), dir.path()).unwrap();
        let record = catalog.get("two-buttons").unwrap();
        std::fs::write(dir.path().join("two-buttons.png"), b"bytes").expect("write image");
        assert_eq!(catalog.load_image_bytes(record).await.unwrap(), b"bytes");
    }

    #[tokio::test]
    async fn missing_image_without_url_fails() {
        let dir = tempdir().expect("tempdir");
        let catalog = TemplateCatalog::load(&write_catalog(dir.path()), dir.path()).unwrap();
        let record = catalog.get("drake-hotline-bling").unwrap();
        let err = catalog.load_image_bytes(record).await.unwrap_err();
        assert!(err.to_string().contains("no image_url"));
    }
}
