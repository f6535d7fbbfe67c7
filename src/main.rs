//! Stale pull request notifier: binary entrypoint.
//! Loads config, wires Stash → tracker → Slack and runs the poll loop until
//! Ctrl-C / SIGTERM.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stale_pr_notifier::config;
use stale_pr_notifier::metrics::{self, Metrics};
use stale_pr_notifier::{PollLoop, SlackNotifier, StaleTracker, StashClient, SystemClock};

/// Compact logs by default, JSON lines with LOG_FORMAT=json.
/// RUST_LOG overrides the filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("stale_pr_notifier=info,warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable; Ctrl-C only");
                let _ = ctrl_c.await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
    tracing::info!("shutdown signal received");
    cancel.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = config::load_default().context("loading notifier config")?;
    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let server = match cfg.server {
        Some(server) => {
            let listener = metrics::bind(server.bind).await?;
            let m = Metrics::install()?;
            let cancel = cancel.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = metrics::serve(m.router(), listener, cancel).await {
                    tracing::error!(error = %e, "health/metrics server failed");
                }
            }))
        }
        None => None,
    };

    let clock = Arc::new(SystemClock);
    let source = StashClient::new(&cfg.stash, cfg.general.staleness_threshold())
        .context("building stash client")?
        .with_clock(clock.clone());
    let notifier = SlackNotifier::new(&cfg.slack, cfg.stash.repository.clone())
        .context("building slack notifier")?
        .with_clock(clock.clone());
    let tracker = StaleTracker::new(cfg.general.resend_timeout());

    tracing::info!(
        project = %cfg.stash.project,
        repository = %cfg.stash.repository,
        channel = %cfg.slack.channel,
        "starting stale pull request notifier"
    );
    let mut poll = PollLoop::new(
        source,
        notifier,
        clock,
        tracker,
        cfg.general.poll_interval(),
    );
    poll.run(cancel.clone()).await;

    if let Some(handle) = server {
        cancel.cancel();
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "health/metrics server task panicked");
        }
    }
    Ok(())
}
