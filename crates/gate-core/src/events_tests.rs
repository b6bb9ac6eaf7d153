//! Tests for [`Delivery`] and [`GateEvent`] parsing.

use super::*;
use serde_json::json;

const SHA: &str = "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3";

fn workflow_run_body(action: &str, sha: &str) -> Vec<u8> {
    json!({
        "action": action,
        "workflow_run": {
            "id": 8812734,
            "head_sha": sha,
            "conclusion": "success"
        }
    })
    .to_string()
    .into_bytes()
}

/// A completed workflow run parses into the typed variant.
#[test]
fn test_workflow_run_completed_parses() {
    let event = GateEvent::parse("workflow_run", &workflow_run_body("completed", SHA)).unwrap();

    assert_eq!(
        event,
        GateEvent::WorkflowRunCompleted {
            run_id: 8812734,
            head_sha: CommitSha::new(SHA).unwrap(),
            conclusion: "success".to_string(),
        }
    );
}

/// Non-completed workflow run actions are valid but ignored.
#[test]
fn test_workflow_run_in_progress_is_ignored() {
    let event = GateEvent::parse("workflow_run", &workflow_run_body("in_progress", SHA)).unwrap();
    assert_eq!(event, GateEvent::Ignored);
}

/// A rerequested check run parses into the typed variant.
#[test]
fn test_check_run_rerequested_parses() {
    let body = json!({
        "action": "rerequested",
        "check_run": { "name": "quality-gate", "head_sha": SHA }
    })
    .to_string();

    let event = GateEvent::parse("check_run", body.as_bytes()).unwrap();

    assert_eq!(
        event,
        GateEvent::CheckRunRequested {
            name: "quality-gate".to_string(),
            head_sha: CommitSha::new(SHA).unwrap(),
        }
    );
}

#[test]
fn test_ping_and_unknown_event_types() {
    assert_eq!(GateEvent::parse("ping", b"{}").unwrap(), GateEvent::Ping);
    assert_eq!(
        GateEvent::parse("issues", b"{\"action\":\"opened\"}").unwrap(),
        GateEvent::Ignored
    );
}

/// Non-JSON bodies are rejected before any field is inspected.
#[test]
fn test_invalid_json_rejected() {
    let err = GateEvent::parse("workflow_run", b"not json at all").unwrap_err();
    assert!(matches!(err, PayloadError::InvalidJson { .. }));
}

/// A missing required field names the field in the error.
#[test]
fn test_missing_workflow_run_object() {
    let body = json!({ "action": "completed" }).to_string();
    let err = GateEvent::parse("workflow_run", body.as_bytes()).unwrap_err();

    assert_eq!(
        err,
        PayloadError::MissingField {
            field: "workflow_run".to_string()
        }
    );
}

/// A malformed commit SHA is rejected at the parsing boundary.
#[test]
fn test_malformed_sha_rejected() {
    let err =
        GateEvent::parse("workflow_run", &workflow_run_body("completed", "zzz")).unwrap_err();
    assert!(matches!(err, PayloadError::MalformedField { ref field, .. } if field == "head_sha"));
}

/// A non-integer run id is rejected.
#[test]
fn test_non_integer_run_id_rejected() {
    let body = json!({
        "action": "completed",
        "workflow_run": { "id": "not-a-number", "head_sha": SHA }
    })
    .to_string();

    let err = GateEvent::parse("workflow_run", body.as_bytes()).unwrap_err();
    assert!(
        matches!(err, PayloadError::MalformedField { ref field, .. } if field == "workflow_run.id")
    );
}

/// A missing conclusion falls back to "unknown" rather than erroring; the
/// gate evaluates the artifact regardless of the workflow's own verdict.
#[test]
fn test_missing_conclusion_defaults() {
    let body = json!({
        "action": "completed",
        "workflow_run": { "id": 1, "head_sha": SHA }
    })
    .to_string();

    let event = GateEvent::parse("workflow_run", body.as_bytes()).unwrap();
    assert!(matches!(
        event,
        GateEvent::WorkflowRunCompleted { ref conclusion, .. } if conclusion == "unknown"
    ));
}

/// Delivery::parse_event delegates to the header-driven parser.
#[test]
fn test_delivery_parse_event() {
    let delivery = Delivery::new(
        DeliveryId::new("delivery-1").unwrap(),
        "ping",
        Bytes::from_static(b"{}"),
    );

    assert_eq!(delivery.parse_event().unwrap(), GateEvent::Ping);
}
