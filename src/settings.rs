use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::compose::{FontSource, Palette};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub catalog_path: String,
    pub images_dir: String,
    pub font_path: Option<String>,
    pub font_family: Option<String>,
    pub fill_color: String,
    pub stroke_color: String,
    pub server_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalog_path: "memes.json".to_string(),
            images_dir: "memes_images".to_string(),
            font_path: None,
            font_family: None,
            fill_color: "#ffffff".to_string(),
            stroke_color: "#000000".to_string(),
            server_addr: "127.0.0.1:11223".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    templates: Option<TemplateSettings>,
    font: Option<FontSettings>,
    style: Option<StyleSettings>,
    server: Option<ServerSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct TemplateSettings {
    catalog: Option<String>,
    images_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FontSettings {
    path: Option<String>,
    family: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StyleSettings {
    fill_color: Option<String>,
    stroke_color: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSettings {
    addr: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings.merge_str(&content).with_context(|| {
                format!("failed to parse settings: {}", path.display())
            })?;
        }
    }

    Ok(settings)
}

impl Settings {
    pub fn palette(&self) -> Result<Palette> {
        Palette::from_hex(&self.fill_color, &self.stroke_color)
    }

    pub fn font_source(&self) -> FontSource {
        FontSource {
            path: self.font_path.as_deref().map(PathBuf::from),
            family: self.font_family.clone(),
        }
    }

    fn merge_str(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed);
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(templates) = incoming.templates {
            if let Some(catalog) = non_blank(templates.catalog) {
                self.catalog_path = catalog;
            }
            if let Some(dir) = non_blank(templates.images_dir) {
                self.images_dir = dir;
            }
        }
        if let Some(font) = incoming.font {
            if let Some(path) = non_blank(font.path) {
                self.font_path = Some(path);
            }
            if let Some(family) = non_blank(font.family) {
                self.font_family = Some(family);
            }
        }
        if let Some(style) = incoming.style {
            if let Some(color) = non_blank(style.fill_color) {
                self.fill_color = color;
            }
            if let Some(color) = non_blank(style.stroke_color) {
                self.stroke_color = color;
            }
        }
        if let Some(server) = incoming.server {
            if let Some(addr) = non_blank(server.addr) {
                self.server_addr = addr;
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".caption-compositor"))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::with_temp_home;

    #[test]
    fn embedded_defaults_parse() {
        let mut settings = Settings::default();
        settings.merge_str(DEFAULT_SETTINGS_TOML).unwrap();
        assert_eq!(settings.catalog_path, "memes.json");
        assert_eq!(settings.palette().unwrap(), Palette::default());
    }

    #[test]
    fn blank_values_do_not_override() {
        let mut settings = Settings::default();
        settings
            .merge_str(
                r##"
[font]
family = "  "
path = "/fonts/impact.ttf"

[style]
stroke_color = "#202020"
"##,
            )
            .unwrap();
        assert_eq!(settings.font_family, None);
        assert_eq!(settings.font_path.as_deref(), Some("/fonts/impact.ttf"));
        assert_eq!(settings.palette().unwrap().dark, [32, 32, 32, 255]);
    }

    #[test]
    fn extra_settings_file_is_applied_last() {
        with_temp_home(|home| {
            let extra = home.join("override.toml");
            fs::write(&extra, "[templates]\ncatalog = \"fixtures/catalog.json\"\n")
                .expect("write override");
            let settings = load_settings(Some(&extra)).expect("settings");
            assert_eq!(settings.catalog_path, "fixtures/catalog.json");
            assert!(home.join(".caption-compositor").join("settings.toml").exists());
        });
    }

    #[test]
    fn missing_extra_settings_file_fails() {
        with_temp_home(|home| {
            let err = load_settings(Some(&home.join("absent.toml"))).unwrap_err();
            assert!(err.to_string().contains("settings file not found"));
        });
    }
}
