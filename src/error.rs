//! Error taxonomy for the planning and run machinery.
//!
//! Stage code and collaborators return `ClerkError` so callers can branch on
//! the failure kind (retry a transient provider fault, surface a validation
//! problem immediately). The CLI edge converts into `anyhow::Error`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClerkError {
    /// A referenced entity (run, template, plan item) does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Caller-supplied input is malformed or a precondition is unmet.
    #[error("validation: {0}")]
    Validation(String),

    /// A run reached a stage whose structural prerequisites are missing.
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// Storage provider or classifier failure. `retryable` marks
    /// 5xx/429-equivalent and transient network conditions.
    #[error("provider error: {message}")]
    Provider { message: String, retryable: bool },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ClerkError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        ClerkError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ClerkError::Validation(message.into())
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        ClerkError::Invariant(message.into())
    }

    /// A provider fault worth retrying under the backoff policy.
    pub fn provider_retryable(message: impl Into<String>) -> Self {
        ClerkError::Provider {
            message: message.into(),
            retryable: true,
        }
    }

    /// A provider fault that should propagate immediately.
    pub fn provider_terminal(message: impl Into<String>) -> Self {
        ClerkError::Provider {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClerkError::Provider {
                retryable: true,
                ..
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, ClerkError>;
