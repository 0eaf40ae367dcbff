use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::InputError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// A template text slot. `updated_position` supersedes `position` whenever
/// it is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub position: RegionRect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_position: Option<RegionRect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Region {
    pub fn effective_rect(&self) -> RegionRect {
        self.updated_position.unwrap_or(self.position)
    }
}

/// Caller text. `id` is the stringified positional index of the target
/// region, not a semantic name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEntry {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextBox {
    pub text: String,
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

pub fn resolve_boxes(entries: &[TextEntry], regions: &[Region]) -> Result<Vec<TextBox>> {
    let mut texts: HashMap<&str, &str> = HashMap::new();
    for entry in entries {
        texts.insert(entry.id.as_str(), entry.text.as_str());
    }

    let mut boxes = Vec::new();
    for (index, region) in regions.iter().enumerate() {
        let Some(text) = texts.get(index.to_string().as_str()) else {
            continue;
        };
        if text.is_empty() {
            continue;
        }
        let rect = region.effective_rect();
        boxes.push(to_text_box(index, text, rect)?);
    }
    Ok(boxes)
}

fn to_text_box(index: usize, text: &str, rect: RegionRect) -> Result<TextBox> {
    let values = [
        ("left", rect.left),
        ("top", rect.top),
        ("width", rect.width),
        ("height", rect.height),
    ];
    for (name, value) in values {
        if !value.is_finite() {
            return Err(InputError::MalformedRegion {
                index,
                reason: format!("{} is not a finite number", name),
            }
            .into());
        }
        let floored = value.floor();
        if floored < f64::from(i32::MIN) || floored > f64::from(i32::MAX) {
            return Err(InputError::MalformedRegion {
                index,
                reason: format!("{} is out of range: {}", name, value),
            }
            .into());
        }
    }
    Ok(TextBox {
        text: text.to_string(),
        left: rect.left.floor() as i32,
        top: rect.top.floor() as i32,
        width: rect.width.floor().max(1.0) as u32,
        height: rect.height.floor().max(1.0) as u32,
    })
}
