//! # Gate-Service
//!
//! HTTP surface and component wiring for the Eval-Gate quality gate.
//!
//! Routes:
//! - `POST /webhook` — authenticated webhook intake
//! - `GET /health` — liveness, uptime, and event counters
//! - `GET /readyz` — readiness (IP ranges loaded when the filter is on)
//! - `GET /security/status` — feature toggles and recent audit events

pub mod config;
pub mod worker;

use axum::extract::{ConnectInfo, DefaultBodyLimit, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use bytes::Bytes;
use gate_core::{
    AdmissionControl, AdmissionError, AuditSeverity, CorrelationId, Delivery, DeliveryId,
    DeliveryPipeline, GateCounters, IpAdmissionFilter, RateLimitError, RateLimiter, RouteClass,
    SecurityAuditTrail,
};
use gate_queue::{DeliveryQueue, QueuedDelivery};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, Instrument};

// ============================================================================
// Application state
// ============================================================================

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub admission: Arc<AdmissionControl>,
    pub pipeline: Arc<DeliveryPipeline>,
    pub queue: Arc<dyn DeliveryQueue>,
    /// Whether a background worker drains the queue; when `false` the
    /// webhook handler processes deliveries inline.
    pub asynchronous: bool,
    pub rate_limiter: Arc<RateLimiter>,
    pub ip_filter: Arc<IpAdmissionFilter>,
    pub audit: Arc<SecurityAuditTrail>,
    pub counters: Arc<GateCounters>,
    pub started_at: Instant,
}

// ============================================================================
// Handler errors
// ============================================================================

/// Failures surfaced by the webhook handler.
///
/// Response bodies carry only the fixed sanitized vocabulary; internal
/// detail stays in logs and the audit trail.
#[derive(Debug)]
pub enum WebhookHandlerError {
    Admission(AdmissionError),
    /// Missing or malformed delivery headers.
    InvalidDelivery,
    /// Admitted body failed structural payload validation.
    InvalidPayload,
    /// Enqueue to the delivery queue failed.
    QueueUnavailable,
    /// Inline processing failed against the upstream API.
    Upstream,
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let (status, message, retry_after) = match &self {
            Self::Admission(AdmissionError::SignatureInvalid) => {
                (StatusCode::UNAUTHORIZED, "signature verification failed", None)
            }
            Self::Admission(AdmissionError::IpDenied) => {
                (StatusCode::FORBIDDEN, "forbidden", None)
            }
            Self::Admission(AdmissionError::Replay) => {
                (StatusCode::FORBIDDEN, "duplicate delivery", None)
            }
            Self::Admission(AdmissionError::RateLimited(e)) => {
                (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded", Some(e.retry_after_secs()))
            }
            Self::InvalidDelivery => (StatusCode::BAD_REQUEST, "invalid delivery", None),
            Self::InvalidPayload => (StatusCode::BAD_REQUEST, "invalid payload", None),
            Self::QueueUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "internal error", None)
            }
            Self::Upstream => (StatusCode::BAD_GATEWAY, "upstream api failure", None),
        };

        let mut response = (status, Json(json!({ "error": message }))).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = secs.to_string().parse() {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}

impl From<AdmissionError> for WebhookHandlerError {
    fn from(e: AdmissionError) -> Self {
        Self::Admission(e)
    }
}

/// Rejection for status endpoints; only rate limiting applies there.
struct StatusRouteRejection(RateLimitError);

impl IntoResponse for StatusRouteRejection {
    fn into_response(self) -> Response {
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "rate limit exceeded" })),
        )
            .into_response();
        if let Ok(value) = self.0.retry_after_secs().to_string().parse() {
            response.headers_mut().insert("Retry-After", value);
        }
        response
    }
}

// ============================================================================
// Router
// ============================================================================

/// Build the service router.
pub fn create_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .route("/health", get(handle_health))
        .route("/readyz", get(handle_readyz))
        .route("/security/status", get(handle_security_status))
        .layer(middleware::from_fn(correlation_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Attach a correlation id to every request's span and response.
async fn correlation_middleware(
    request: axum::extract::Request,
    next: middleware::Next,
) -> Response {
    let correlation_id = CorrelationId::new();
    let span = info_span!(
        "request",
        correlation_id = %correlation_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = correlation_id.as_str().parse() {
        response.headers_mut().insert("x-correlation-id", value);
    }
    response
}

// ============================================================================
// Webhook intake
// ============================================================================

fn required_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, WebhookHandlerError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookHandlerError::InvalidDelivery)
}

async fn handle_webhook(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, WebhookHandlerError> {
    let delivery_header = required_header(&headers, "x-github-delivery")?;
    let event_type = required_header(&headers, "x-github-event")?;

    let delivery_id =
        DeliveryId::new(delivery_header).map_err(|_| WebhookHandlerError::InvalidDelivery)?;

    let mut delivery = Delivery::new(delivery_id, event_type, body).with_source_addr(addr.ip());
    if let Some(signature) = headers.get("x-hub-signature-256").and_then(|v| v.to_str().ok()) {
        delivery = delivery.with_signature(signature);
    }

    // Admission runs before any payload byte is interpreted.
    state.admission.admit(&delivery)?;

    if state.asynchronous {
        let queued = QueuedDelivery::from_delivery(&delivery);
        state.queue.enqueue(queued).await.map_err(|e| {
            error!(error = %e, "enqueue failed after admission");
            WebhookHandlerError::QueueUnavailable
        })?;

        return Ok((StatusCode::ACCEPTED, Json(json!({ "status": "queued" }))).into_response());
    }

    // Synchronous path: parse and process inline.
    let event = delivery
        .parse_event()
        .map_err(|_| WebhookHandlerError::InvalidPayload)?;

    state.pipeline.process(event).await.map_err(|e| {
        error!(error = %e, "inline processing failed");
        WebhookHandlerError::Upstream
    })?;

    Ok((StatusCode::OK, Json(json!({ "status": "processed" }))).into_response())
}

// ============================================================================
// Status surface
// ============================================================================

fn check_status_rate(state: &AppState, addr: SocketAddr) -> Result<(), StatusRouteRejection> {
    if !state.admission.toggles().rate_limit_enabled {
        return Ok(());
    }
    state
        .rate_limiter
        .check(&addr.ip().to_string(), RouteClass::Status)
        .map_err(StatusRouteRejection)
}

async fn handle_health(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    if let Err(rejection) = check_status_rate(&state, addr) {
        return rejection.into_response();
    }

    let provider = match state.queue.provider_type() {
        gate_queue::QueueProviderType::InMemory => "in_memory",
        gate_queue::QueueProviderType::Sqs => "sqs",
    };

    Json(json!({
        "status": "ok",
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "queue_provider": provider,
        "asynchronous": state.asynchronous,
        "counters": state.counters.snapshot(),
    }))
    .into_response()
}

async fn handle_readyz(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    if let Err(rejection) = check_status_rate(&state, addr) {
        return rejection.into_response();
    }

    // With the filter enabled, readiness requires the allowed ranges to have
    // loaded at least once; until then every delivery would be denied.
    if state.admission.toggles().ip_filter_enabled && !state.ip_filter.is_loaded() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not_ready", "reason": "allowed ranges not loaded" })),
        )
            .into_response();
    }

    Json(json!({ "status": "ready" })).into_response()
}

#[derive(Debug, Deserialize)]
struct SecurityStatusQuery {
    severity: Option<String>,
    limit: Option<usize>,
}

async fn handle_security_status(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<SecurityStatusQuery>,
) -> Response {
    if let Err(rejection) = check_status_rate(&state, addr) {
        return rejection.into_response();
    }

    let limit = query.limit.unwrap_or(50).min(500);
    let events = match query.severity.as_deref() {
        Some("info") | None => state.audit.recent(limit),
        Some("warning") => state.audit.recent_with_severity(AuditSeverity::Warning, limit),
        Some("critical") => state.audit.recent_with_severity(AuditSeverity::Critical, limit),
        Some(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid severity" })),
            )
                .into_response();
        }
    };

    let toggles = state.admission.toggles();
    Json(json!({
        "toggles": {
            "ip_filter": toggles.ip_filter_enabled,
            "rate_limit": toggles.rate_limit_enabled,
            "replay_guard": toggles.replay_enabled,
        },
        "ip_ranges_loaded": state.ip_filter.is_loaded(),
        "audit": {
            "retained": state.audit.len(),
            "denied": state.audit.denied_count(),
        },
        "events": events,
        "recent_processing_errors": state
            .pipeline
            .recent_errors()
            .into_iter()
            .map(|(sha, error)| json!({ "sha": sha, "error": error }))
            .collect::<Vec<_>>(),
    }))
    .into_response()
}

// ============================================================================
// Server
// ============================================================================

/// Bind and serve until ctrl-c or SIGTERM.
pub async fn start_server(router: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "server listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .unwrap_or_else(|e| error!(error = %e, "failed to install ctrl-c handler"));
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
