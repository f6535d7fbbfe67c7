use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub const CYCLES_TOTAL: &str = "notifier_cycles_total";
pub const FETCH_ERRORS_TOTAL: &str = "notifier_fetch_errors_total";
pub const NOTIFICATIONS_SENT_TOTAL: &str = "notifier_notifications_sent_total";
pub const NOTIFICATION_FAILURES_TOTAL: &str = "notifier_notification_failures_total";
pub const TRACKED_PULL_REQUESTS: &str = "notifier_tracked_pull_requests";
pub const LAST_CYCLE_TS: &str = "notifier_last_cycle_ts";

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(CYCLES_TOTAL, "Poll cycles started.");
        describe_counter!(
            FETCH_ERRORS_TOTAL,
            "Cycles skipped because stale pull requests could not be fetched."
        );
        describe_counter!(NOTIFICATIONS_SENT_TOTAL, "Alerts delivered to the chat channel.");
        describe_counter!(NOTIFICATION_FAILURES_TOTAL, "Alerts whose delivery failed.");
        describe_gauge!(
            TRACKED_PULL_REQUESTS,
            "Stale pull requests currently tracked for re-notification."
        );
        describe_gauge!(LAST_CYCLE_TS, "Unix ts when the last poll cycle finished.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Only one per process.
    pub fn install() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    pub fn from_handle(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    /// `/health` and `/metrics` (Prometheus exposition format).
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new()
            .route("/health", get(|| async { "OK" }))
            .route(
                "/metrics",
                get(move || {
                    let h = handle.clone();
                    async move { h.render() }
                }),
            )
    }
}

/// Bind the health/metrics listener. Called at startup so an unusable
/// address stops the process instead of failing inside a background task.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding metrics server to {addr}"))
}

/// Serve `router` on an already bound `listener` until `cancel` fires.
pub async fn serve(router: Router, listener: TcpListener, cancel: CancellationToken) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "health/metrics server listening");
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("metrics server")
}
