//! Tests for [`CheckRunClient`].

use super::*;
use crate::client::ClientConfig;
use gate_core::CheckRunReporter;
use url::Url;
use wiremock::matchers::{body_json_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SHA: &str = "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3";

async fn reporter_for(server: &MockServer) -> CheckRunClient {
    let config = ClientConfig::new().with_api_url(Url::parse(&server.uri()).unwrap());
    let client = Arc::new(GitHubClient::new(config, "token".to_string()).unwrap());
    CheckRunClient::new(client, "acme", "widgets")
}

fn sha() -> CommitSha {
    CommitSha::new(SHA).unwrap()
}

/// Creating a run posts the in_progress status and returns the assigned id.
#[tokio::test]
async fn test_create_in_progress() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/check-runs"))
        .and(body_json_string(
            serde_json::json!({
                "name": "quality-gate",
                "head_sha": SHA,
                "status": "in_progress"
            })
            .to_string(),
        ))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": 42,
            "status": "in_progress",
            "conclusion": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reporter = reporter_for(&server).await;
    let id = reporter.create_in_progress(&sha(), "quality-gate").await.unwrap();

    assert_eq!(id, CheckRunId::new(42));
}

/// Completing a run patches status, conclusion, and output.
#[tokio::test]
async fn test_complete_success() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/repos/acme/widgets/check-runs/42"))
        .and(body_json_string(
            serde_json::json!({
                "status": "completed",
                "conclusion": "success",
                "output": {
                    "title": "Quality gate passed",
                    "summary": "Score 0.9500 against threshold 0.8000."
                }
            })
            .to_string(),
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let reporter = reporter_for(&server).await;
    reporter
        .complete(
            CheckRunId::new(42),
            CheckRunConclusion::Success,
            "Quality gate passed",
            "Score 0.9500 against threshold 0.8000.",
        )
        .await
        .unwrap();
}

/// Server errors surface as transient check-run errors.
#[tokio::test]
async fn test_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/check-runs"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let reporter = reporter_for(&server).await;
    let err = reporter
        .create_in_progress(&sha(), "quality-gate")
        .await
        .unwrap_err();

    assert!(err.is_transient());
}

/// Auth failures surface as permanent check-run errors.
#[tokio::test]
async fn test_auth_failure_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/check-runs"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let reporter = reporter_for(&server).await;
    let err = reporter
        .create_in_progress(&sha(), "quality-gate")
        .await
        .unwrap_err();

    assert!(!err.is_transient());
}
