use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod captioner;
pub mod compose;
pub mod error;
pub mod logging;
pub mod mcp;
pub mod server;
pub mod settings;
pub mod template;
mod test_util;

pub use captioner::{Captioner, CreateImage};
pub use compose::{TextBox, TextEntry};
pub use error::{InputError, is_input_error};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub template: Option<String>,
    pub texts: Vec<String>,
    pub texts_json: Option<String>,
    pub image: Option<String>,
    pub out: Option<String>,
    pub list_templates: bool,
    pub query: Option<String>,
    pub show_boxes: bool,
    pub settings_path: Option<String>,
}

/// CLI entry: lists templates, prints a box plan, or renders a PNG to disk.
/// `input` is stdin, consumed when `texts_json` is `-`.
pub async fn run(config: Config, input: Option<String>) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    let captioner = Arc::new(Captioner::new(settings)?);

    if config.list_templates {
        let listing = mcp::template_listing(&captioner, config.query.as_deref().unwrap_or(""));
        return Ok(serde_json::to_string_pretty(&listing)?);
    }

    let template = config
        .template
        .clone()
        .ok_or_else(|| anyhow!("--template is required"))?;
    let texts = collect_texts(&config, input)?;

    if config.show_boxes {
        let boxes = captioner.plan(&template, &texts)?;
        return Ok(serde_json::to_string_pretty(&boxes)?);
    }

    let image_bytes = match config.image.as_deref() {
        Some(path) => Some(
            tokio::fs::read(path)
                .await
                .with_context(|| format!("failed to read image: {}", path))?,
        ),
        None => None,
    };
    let bytes = captioner
        .create_image(CreateImage {
            template: template.clone(),
            texts,
            image_bytes,
        })
        .await?;

    let out = config
        .out
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(format!("{}.png", template)));
    tokio::fs::write(&out, &bytes)
        .await
        .with_context(|| format!("failed to write output: {}", out.display()))?;
    Ok(out.display().to_string())
}

fn collect_texts(config: &Config, input: Option<String>) -> Result<Vec<TextEntry>> {
    let mut texts = Vec::new();
    if let Some(source) = config.texts_json.as_deref() {
        let content = if source == "-" {
            input.ok_or_else(|| anyhow!("stdin is empty"))?
        } else {
            std::fs::read_to_string(source)
                .with_context(|| format!("failed to read texts: {}", source))?
        };
        let parsed: Vec<TextEntry> = serde_json::from_str(&content)
            .map_err(|err| InputError::InvalidEntry(format!("texts json: {}", err)))?;
        texts.extend(parsed);
    }
    for raw in &config.texts {
        texts.push(parse_text_arg(raw)?);
    }
    Ok(texts)
}

/// `0=Top caption` → `{id: "0", text: "Top caption"}`.
pub fn parse_text_arg(raw: &str) -> Result<TextEntry> {
    let (id, text) = raw
        .split_once('=')
        .ok_or_else(|| InputError::InvalidEntry(format!("expected id=text, got '{}'", raw)))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(InputError::InvalidEntry(format!("missing id in '{}'", raw)).into());
    }
    Ok(TextEntry {
        id: id.to_string(),
        text: text.to_string(),
    })
}
