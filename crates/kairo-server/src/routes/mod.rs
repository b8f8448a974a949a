//! Kairo API Routes
//!
//! - /agent/status, /agent/pause, /agent/resume - Control loop steering
//! - /agent/directives - Human directive submission
//! - /memories/search, /memories/stats - Memory queries

use axum::http::StatusCode;

use kairo::DomainError;

pub mod agent;
pub mod memory;
pub mod swagger;

/// Map a domain error onto an HTTP status
pub(crate) fn error_response(e: DomainError) -> (StatusCode, String) {
    let status = match &e {
        DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Conflict(_) => StatusCode::CONFLICT,
        DomainError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            error_response(DomainError::Validation("empty".into())).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_response(DomainError::Conflict("running".into())).0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            error_response(DomainError::Transient("slow".into())).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
