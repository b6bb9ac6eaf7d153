//! Inbound delivery and event model.
//!
//! A [`Delivery`] is the raw admitted request: identifier, event type header,
//! body bytes, and transport context. Parsing it into a [`GateEvent`] is the
//! trust boundary for payload content: every field the rest of the system
//! relies on is validated structurally here, so downstream code never touches
//! raw JSON.

use crate::{CommitSha, DeliveryId, Timestamp, ValidationError};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use thiserror::Error;

/// Error classifying why a payload could not be parsed into a [`GateEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {message}")]
    InvalidJson { message: String },

    #[error("payload is missing required field '{field}'")]
    MissingField { field: String },

    #[error("payload field '{field}' is malformed: {reason}")]
    MalformedField { field: String, reason: String },
}

impl From<ValidationError> for PayloadError {
    fn from(e: ValidationError) -> Self {
        PayloadError::MalformedField {
            field: "head_sha".to_string(),
            reason: e.to_string(),
        }
    }
}

/// One admitted webhook delivery, prior to payload parsing.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub id: DeliveryId,
    /// Event type header value, e.g. `workflow_run`.
    pub event_type: String,
    pub body: Bytes,
    pub received_at: Timestamp,
    pub source_addr: Option<IpAddr>,
    /// Claimed signature header value, verbatim. Verified during admission.
    pub signature: Option<String>,
}

impl Delivery {
    pub fn new(id: DeliveryId, event_type: impl Into<String>, body: Bytes) -> Self {
        Self {
            id,
            event_type: event_type.into(),
            body,
            received_at: Timestamp::now(),
            source_addr: None,
            signature: None,
        }
    }

    pub fn with_source_addr(mut self, addr: IpAddr) -> Self {
        self.source_addr = Some(addr);
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// Parse the body into a typed event according to the event type header.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] when the body is not JSON or a required
    /// field is missing or malformed. Unknown event types parse to
    /// [`GateEvent::Ignored`] rather than erroring; the sender is allowed to
    /// deliver event types this service does not act on.
    pub fn parse_event(&self) -> Result<GateEvent, PayloadError> {
        GateEvent::parse(&self.event_type, &self.body)
    }
}

/// A typed, validated inbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GateEvent {
    /// A workflow run finished; the gate evaluates its artifact.
    WorkflowRunCompleted {
        run_id: u64,
        head_sha: CommitSha,
        conclusion: String,
    },
    /// A check run was (re-)requested for a commit.
    CheckRunRequested {
        name: String,
        head_sha: CommitSha,
    },
    /// Sender connectivity probe.
    Ping,
    /// A valid delivery of an event type this service does not act on.
    Ignored,
}

impl GateEvent {
    /// Parse raw body bytes for a given event type header.
    pub fn parse(event_type: &str, body: &[u8]) -> Result<Self, PayloadError> {
        let value: serde_json::Value =
            serde_json::from_slice(body).map_err(|e| PayloadError::InvalidJson {
                message: e.to_string(),
            })?;

        match event_type {
            "ping" => Ok(GateEvent::Ping),
            "workflow_run" => Self::parse_workflow_run(&value),
            "check_run" => Self::parse_check_run(&value),
            _ => Ok(GateEvent::Ignored),
        }
    }

    fn parse_workflow_run(value: &serde_json::Value) -> Result<Self, PayloadError> {
        // Only completed runs carry an artifact worth evaluating.
        let action = require_str(value, "action")?;
        if action != "completed" {
            return Ok(GateEvent::Ignored);
        }

        let run = value
            .get("workflow_run")
            .ok_or_else(|| PayloadError::MissingField {
                field: "workflow_run".to_string(),
            })?;

        let run_id = run
            .get("id")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| PayloadError::MalformedField {
                field: "workflow_run.id".to_string(),
                reason: "expected unsigned integer".to_string(),
            })?;

        let head_sha = CommitSha::new(require_str(run, "head_sha")?)?;
        let conclusion = run
            .get("conclusion")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        Ok(GateEvent::WorkflowRunCompleted {
            run_id,
            head_sha,
            conclusion,
        })
    }

    fn parse_check_run(value: &serde_json::Value) -> Result<Self, PayloadError> {
        let action = require_str(value, "action")?;
        // Re-run requests arrive as "rerequested"; initial creation is
        // driven by workflow_run events, not check_run ones.
        if action != "rerequested" {
            return Ok(GateEvent::Ignored);
        }

        let check_run = value
            .get("check_run")
            .ok_or_else(|| PayloadError::MissingField {
                field: "check_run".to_string(),
            })?;

        let name = require_str(check_run, "name")?.to_string();
        let head_sha = CommitSha::new(require_str(check_run, "head_sha")?)?;

        Ok(GateEvent::CheckRunRequested { name, head_sha })
    }
}

fn require_str<'a>(value: &'a serde_json::Value, field: &str) -> Result<&'a str, PayloadError> {
    match value.get(field) {
        None => Err(PayloadError::MissingField {
            field: field.to_string(),
        }),
        Some(v) => v.as_str().ok_or_else(|| PayloadError::MalformedField {
            field: field.to_string(),
            reason: "expected string".to_string(),
        }),
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
