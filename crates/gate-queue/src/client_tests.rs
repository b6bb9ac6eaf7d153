//! Tests for [`connect_queue`] mode selection.

use super::*;

/// In-process mode never touches a remote queue and is synchronous.
#[tokio::test]
async fn test_in_process_mode() {
    let connection = connect_queue(QueueMode::InProcess, None, DEFAULT_PROBE_TIMEOUT)
        .await
        .unwrap();

    assert!(!connection.asynchronous);
    assert_eq!(connection.queue.provider_type(), QueueProviderType::InMemory);
}

/// Required mode without a queue URL refuses to start.
#[tokio::test]
async fn test_required_mode_needs_url() {
    let err = connect_queue(QueueMode::Required, None, DEFAULT_PROBE_TIMEOUT)
        .await
        .unwrap_err();

    assert!(matches!(err, QueueError::Configuration { .. }));
}

/// Fallback mode without a queue URL degrades to synchronous in-memory
/// handling instead of failing.
#[tokio::test]
async fn test_fallback_without_url_degrades() {
    let connection = connect_queue(QueueMode::Fallback, None, DEFAULT_PROBE_TIMEOUT)
        .await
        .unwrap();

    assert!(!connection.asynchronous);
    assert_eq!(connection.queue.provider_type(), QueueProviderType::InMemory);
}
