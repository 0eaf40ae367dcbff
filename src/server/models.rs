use serde::{Deserialize, Serialize};

use crate::compose::TextEntry;

#[derive(Debug, Deserialize)]
pub(crate) struct CreateImageRequest {
    pub(crate) template: String,
    #[serde(default)]
    pub(crate) texts: Vec<TextEntry>,
    #[serde(default)]
    pub(crate) image_base64: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct TemplateQuery {
    pub(crate) query: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}
