// src/poller.rs
use std::time::Duration;

use metrics::{counter, gauge};
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::metrics::{
    ensure_metrics_described, CYCLES_TOTAL, FETCH_ERRORS_TOTAL, LAST_CYCLE_TS,
    NOTIFICATIONS_SENT_TOTAL, NOTIFICATION_FAILURES_TOTAL, TRACKED_PULL_REQUESTS,
};
use crate::notify::Notifier;
use crate::review::StalePullRequestSource;
use crate::tracker::StaleTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Fetching,
    Reconciling,
    Notifying,
    Sleeping,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleReport {
    /// Fetch failed; the tracker was left untouched.
    Skipped,
    Completed {
        stale: usize,
        notified: usize,
        failed: usize,
    },
}

/// Fetch → reconcile → notify, then a fixed sleep, until cancelled.
/// Owns the tracker, so cycles can never overlap.
pub struct PollLoop<F, N, C> {
    source: F,
    notifier: N,
    clock: C,
    tracker: StaleTracker,
    poll_interval: Duration,
    state: LoopState,
}

impl<F, N, C> PollLoop<F, N, C>
where
    F: StalePullRequestSource,
    N: Notifier,
    C: Clock,
{
    pub fn new(
        source: F,
        notifier: N,
        clock: C,
        tracker: StaleTracker,
        poll_interval: Duration,
    ) -> Self {
        ensure_metrics_described();
        Self {
            source,
            notifier,
            clock,
            tracker,
            poll_interval,
            state: LoopState::Idle,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn tracker(&self) -> &StaleTracker {
        &self.tracker
    }

    /// Run cycles until `cancel` fires. The first cycle starts immediately;
    /// afterwards the loop sleeps `poll_interval` from the end of each cycle.
    /// Cancellation is seen at the top of a cycle and during the sleep, never
    /// in the middle of a fetch or a delivery.
    pub async fn run(&mut self, cancel: CancellationToken) {
        tracing::info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            resend_timeout_secs = self.tracker.resend_timeout().num_seconds(),
            "stale pull request poll loop started"
        );

        while !cancel.is_cancelled() {
            self.run_cycle().await;

            self.state = LoopState::Sleeping;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        self.state = LoopState::Stopped;
        tracing::info!("stale pull request poll loop is stopping");
    }

    /// One fetch/reconcile/notify pass without the trailing sleep.
    pub async fn run_cycle(&mut self) -> CycleReport {
        counter!(CYCLES_TOTAL).increment(1);
        tracing::info!(at = %self.clock.now().to_rfc3339(), "poll cycle running");

        self.state = LoopState::Fetching;
        let stale = match self.source.fetch_stale().await {
            Ok(v) => v,
            Err(e) => {
                counter!(FETCH_ERRORS_TOTAL).increment(1);
                tracing::warn!(error = %e, "fetching stale pull requests failed; cycle skipped");
                self.state = LoopState::Idle;
                return CycleReport::Skipped;
            }
        };

        self.state = LoopState::Reconciling;
        let now = self.clock.now();
        let due = self.tracker.reconcile(&stale, now);
        gauge!(TRACKED_PULL_REQUESTS).set(self.tracker.len() as f64);

        self.state = LoopState::Notifying;
        let mut failed = 0usize;
        for pr in &due {
            if let Err(e) = self.notifier.notify(pr).await {
                failed += 1;
                counter!(NOTIFICATION_FAILURES_TOTAL).increment(1);
                tracing::warn!(pr = %pr.id, error = %e, "notification failed");
            } else {
                counter!(NOTIFICATIONS_SENT_TOTAL).increment(1);
                tracing::info!(pr = %pr.id, title = %pr.title, "notification was sent");
            }
        }

        gauge!(LAST_CYCLE_TS).set(self.clock.now().timestamp() as f64);
        self.state = LoopState::Idle;
        CycleReport::Completed {
            stale: stale.len(),
            notified: due.len() - failed,
            failed,
        }
    }
}
