//! Tests for [`ApiError`] classification.

use super::*;

#[test]
fn test_status_mapping() {
    assert!(matches!(
        ApiError::from_status(401, "r", String::new()),
        ApiError::AuthenticationFailed
    ));
    assert!(matches!(
        ApiError::from_status(403, "r", String::new()),
        ApiError::AuthorizationFailed
    ));
    assert!(matches!(
        ApiError::from_status(404, "r", String::new()),
        ApiError::NotFound { .. }
    ));
    assert!(matches!(
        ApiError::from_status(429, "r", String::new()),
        ApiError::RateLimited
    ));
    assert!(matches!(
        ApiError::from_status(502, "r", String::new()),
        ApiError::HttpError { status: 502, .. }
    ));
}

#[test]
fn test_transience_classification() {
    assert!(!ApiError::AuthenticationFailed.is_transient());
    assert!(!ApiError::NotFound { resource: "x".into() }.is_transient());
    assert!(ApiError::RateLimited.is_transient());
    assert!(ApiError::Timeout.is_transient());
    assert!(ApiError::HttpError { status: 503, message: String::new() }.is_transient());
    assert!(!ApiError::HttpError { status: 422, message: String::new() }.is_transient());
}
