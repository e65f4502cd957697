use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification of a failed attack attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Nothing was sent; the input was not ready.
    Validation,
    /// The service answered with a non-success status.
    Service,
    /// The service could not be reached or answered with garbage.
    Transport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorReport {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported image type {mime}; expected image/png or image/jpeg")]
pub struct UnsupportedImageType {
    pub mime: String,
}
