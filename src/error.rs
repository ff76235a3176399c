//! Error Types
//!
//! Every fallible operation in the studio core returns [`StudioError`].
//! Rejected edits (bad resize/crop sizes, undo at the start of history) are
//! not errors: they are silent no-ops and never reach this type.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StudioError>;

#[derive(Debug, Error)]
pub enum StudioError {
    #[error("not a data URI: {0}")]
    InvalidDataUri(String),

    #[error("image source cannot be decoded locally: {0}")]
    UnsupportedSource(String),

    #[error("base64 payload is malformed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("image decode failed: {0}")]
    Decode(#[source] image::ImageError),

    #[error("image encode failed: {0}")]
    Encode(#[source] image::ImageError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("an API key or password is required")]
    MissingCredential,

    #[error("please enter a prompt")]
    EmptyPrompt,

    #[error("no image loaded")]
    NoImage,

    #[error("synthesis failed: {0}")]
    Synthesis(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JavaScript error: {0}")]
    Js(String),
}

impl StudioError {
    /// Whether the failure came from the external synthesis service rather
    /// than from local decoding or validation.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Synthesis(_) | Self::Js(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_user_facing() {
        assert_eq!(StudioError::EmptyPrompt.to_string(), "please enter a prompt");
        assert_eq!(
            StudioError::Synthesis("quota exceeded".into()).to_string(),
            "synthesis failed: quota exceeded"
        );
    }

    #[test]
    fn remote_classification() {
        assert!(StudioError::Synthesis("x".into()).is_remote());
        assert!(!StudioError::NoImage.is_remote());
        assert!(!StudioError::MissingCredential.is_remote());
    }
}
