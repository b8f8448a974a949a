//! Domain Errors
//!
//! Error types for domain operations.

use thiserror::Error;

/// Domain layer errors
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Throttling, timeouts, service unavailable. Safe to retry.
    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },
}

impl DomainError {
    pub fn not_found<T: AsRef<str>>(entity_type: T, id: &str) -> Self {
        Self::NotFound {
            entity_type: entity_type.as_ref().to_string(),
            id: id.to_string(),
        }
    }

    /// Whether a retry has any chance of succeeding
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Classify an upstream HTTP status
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            408 | 429 | 500..=599 => Self::Transient(format!("HTTP {}: {}", status, body)),
            _ => Self::ExternalService(format!("HTTP {}: {}", status, body)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(DomainError::from_status(429, "slow down").is_retryable());
        assert!(DomainError::from_status(503, "").is_retryable());
        assert!(DomainError::from_status(408, "").is_retryable());
        assert!(!DomainError::from_status(404, "missing").is_retryable());
        assert!(!DomainError::from_status(400, "bad").is_retryable());
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(!DomainError::Cancelled.is_retryable());
        assert!(!DomainError::Repository("disk".into()).is_retryable());
        assert!(!DomainError::not_found("MemoryItem", "x").is_retryable());
    }
}
