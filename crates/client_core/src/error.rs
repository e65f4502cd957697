use std::time::Duration;

use shared::error::{ErrorKind, ErrorReport};
use thiserror::Error;

pub const NO_IMAGE_MESSAGE: &str = "Please upload an image file first.";
pub const SERVICE_UNAVAILABLE_MESSAGE: &str =
    "Failed to run attack. Make sure the backend server is running.";

/// Failure reported by an [`crate::AttackService`] implementation.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("attack service returned HTTP {0}")]
    Status(u16),
    #[error("attack service transport failure: {0}")]
    Transport(String),
    #[error("malformed attack response: {0}")]
    MalformedPayload(String),
}

/// User-visible failure of one submit attempt. The `Display` output is the
/// message rendered to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Please upload an image file first.")]
    NoImageSelected,
    #[error("HTTP error! status: {status}")]
    Service { status: u16 },
    #[error("Failed to run attack. Make sure the backend server is running.")]
    Transport { detail: String },
    /// Shown with the same advisory as `Transport`; `after` is kept for logs.
    #[error("Failed to run attack. Make sure the backend server is running.")]
    TimedOut { after: Duration },
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::NoImageSelected => ErrorKind::Validation,
            SessionError::Service { .. } => ErrorKind::Service,
            SessionError::Transport { .. } | SessionError::TimedOut { .. } => ErrorKind::Transport,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::new(self.kind(), self.to_string())
    }
}

impl From<ServiceError> for SessionError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::Status(status) => SessionError::Service { status },
            other @ (ServiceError::Transport(_) | ServiceError::MalformedPayload(_)) => {
                SessionError::Transport {
                    detail: other.to_string(),
                }
            }
        }
    }
}
