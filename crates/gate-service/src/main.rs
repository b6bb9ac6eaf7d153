//! Eval-Gate service binary.
//!
//! Startup order matters: configuration and upstream clients first, then the
//! queue probe (which can refuse startup in required mode), then the
//! admission components, and only then the listener. The service never
//! accepts traffic it could not handle according to its configuration.

use gate_core::{
    AdmissionControl, AdmissionToggles, ArtifactProcessor, CheckRunTracker, DeliveryPipeline,
    GateCounters, HmacSha256Verifier, IpAdmissionFilter, RateLimitPolicy, RateLimiter, ReplayGuard,
    SecurityAuditTrail,
};
use gate_github::{ArtifactClient, CheckRunClient, ClientConfig, GitHubClient, MetaClient};
use gate_queue::connect_queue;
use gate_service::config::GateConfig;
use gate_service::worker::DeliveryWorker;
use gate_service::{create_router, start_server, AppState};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Maintenance cadence for replay purges and rate-limit bucket cleanup.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match GateConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration error");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        error!(error = %e, "service failed");
        std::process::exit(2);
    }
}

async fn run(config: GateConfig) -> anyhow::Result<()> {
    info!(
        owner = %config.github.owner,
        repo = %config.github.repo,
        check = %config.gate.check_name,
        "starting eval-gate"
    );

    // --- upstream clients -------------------------------------------------
    let client_config = ClientConfig::new().with_api_url(config.github.api_url.parse()?);
    let github = Arc::new(GitHubClient::new(client_config, config.github.token.clone())?);

    let reporter = Arc::new(CheckRunClient::new(
        Arc::clone(&github),
        config.github.owner.clone(),
        config.github.repo.clone(),
    ));
    let fetcher = Arc::new(ArtifactClient::new(
        Arc::clone(&github),
        config.github.owner.clone(),
        config.github.repo.clone(),
    ));

    // --- IP admission ranges ----------------------------------------------
    let ip_filter = Arc::new(IpAdmissionFilter::new(Arc::new(MetaClient::new(
        Arc::clone(&github),
    ))));
    if config.security.ip_filter_enabled {
        // A failed initial refresh is not fatal: the filter stays closed and
        // readiness stays false until the background task succeeds.
        if let Err(e) = ip_filter.refresh().await {
            warn!(error = %e, "initial range refresh failed, admitting nothing until retry");
        }
        ip_filter.spawn_refresh_task(config.security.ip_refresh_interval());
    }

    // --- delivery queue ----------------------------------------------------
    let connection = connect_queue(
        config.queue.queue_mode()?,
        config.queue.url.as_deref(),
        config.queue.probe_timeout(),
    )
    .await?;

    // --- admission components ----------------------------------------------
    let rate_limiter = Arc::new(RateLimiter::new(
        RateLimitPolicy::new(
            config.security.webhook_max_per_minute,
            Duration::from_secs(60),
        ),
        RateLimitPolicy::new(
            config.security.status_max_per_minute,
            Duration::from_secs(60),
        ),
        RateLimitPolicy::new(config.security.burst_max, config.security.burst_window()),
    ));
    let replay_guard = Arc::new(ReplayGuard::new(config.security.replay_window()));
    let audit = Arc::new(SecurityAuditTrail::new(config.security.audit_capacity));
    let counters = Arc::new(GateCounters::default());

    let admission = Arc::new(AdmissionControl::new(
        Arc::clone(&ip_filter),
        Arc::clone(&rate_limiter),
        Arc::clone(&replay_guard),
        Arc::new(HmacSha256Verifier::new(config.webhook.secret.clone())),
        Arc::clone(&audit),
        Arc::clone(&counters),
        AdmissionToggles {
            ip_filter_enabled: config.security.ip_filter_enabled,
            rate_limit_enabled: config.security.rate_limit_enabled,
            replay_enabled: config.security.replay_enabled,
        },
    ));

    // --- processing pipeline -----------------------------------------------
    let processor = Arc::new(ArtifactProcessor::new(
        fetcher,
        config.gate.artifact_name.clone(),
        config.gate.result_file.clone(),
        config.gate.threshold,
    ));
    let tracker = Arc::new(CheckRunTracker::new(
        reporter,
        config.gate.check_name.clone(),
        config.gate.tracker_capacity,
    ));
    let pipeline = Arc::new(DeliveryPipeline::new(
        processor,
        tracker,
        Arc::clone(&audit),
        Arc::clone(&counters),
    ));

    // --- maintenance tasks ---------------------------------------------------
    spawn_maintenance(Arc::clone(&replay_guard), Arc::clone(&rate_limiter));

    let worker_handle = if connection.asynchronous {
        let worker = DeliveryWorker::new(
            Arc::clone(&connection.queue),
            Arc::clone(&pipeline),
            config.queue.receive_wait(),
        );
        Some(worker.spawn())
    } else {
        info!("processing deliveries inline (synchronous mode)");
        None
    };

    // --- HTTP surface --------------------------------------------------------
    let state = AppState {
        admission,
        pipeline,
        queue: connection.queue,
        asynchronous: connection.asynchronous,
        rate_limiter,
        ip_filter,
        audit,
        counters,
        started_at: Instant::now(),
    };

    let router = create_router(state, config.webhook.max_body_bytes);
    start_server(router, &config.server.host, config.server.port).await?;

    if let Some(handle) = worker_handle {
        handle.abort();
    }
    Ok(())
}

fn spawn_maintenance(replay_guard: Arc<ReplayGuard>, rate_limiter: Arc<RateLimiter>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(MAINTENANCE_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            replay_guard.purge_expired();
            rate_limiter.cleanup();
        }
    });
}
