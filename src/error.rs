use thiserror::Error;

/// Caller-side mistakes: the request names something that does not exist or
/// carries data that cannot be used. Surfaces report these as bad requests.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("template not found: {0}")]
    TemplateNotFound(String),
    #[error("region {index} has malformed geometry: {reason}")]
    MalformedRegion { index: usize, reason: String },
    #[error("failed to decode template image: {0}")]
    UndecodableImage(String),
    #[error("invalid text entry: {0}")]
    InvalidEntry(String),
}

pub fn is_input_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<InputError>())
}
