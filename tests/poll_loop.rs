// tests/poll_loop.rs
//
// PollLoop with scripted collaborators. Loop timing runs on paused tokio time.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use stale_pr_notifier::{
    CycleReport, DeliveryError, FetchError, LoopState, ManualClock, Notifier, PollLoop,
    PullRequestSnapshot, StalePullRequestSource, StaleTracker,
};

const INTERVAL: Duration = Duration::from_secs(300);

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
}

fn pr(id: &str) -> PullRequestSnapshot {
    PullRequestSnapshot {
        id: id.to_string(),
        title: format!("PR {id}"),
        link: format!("https://stash.test/pr/{id}"),
        last_updated: t0() - ChronoDuration::days(2),
    }
}

/// Hands out scripted results in order, then repeats `fallback`.
struct ScriptedSource {
    script: Mutex<VecDeque<Result<Vec<PullRequestSnapshot>, FetchError>>>,
    fallback: Vec<PullRequestSnapshot>,
    fetch_delay: Duration,
    fetched_at: Mutex<Vec<tokio::time::Instant>>,
}

impl ScriptedSource {
    fn new(
        script: Vec<Result<Vec<PullRequestSnapshot>, FetchError>>,
        fallback: Vec<PullRequestSnapshot>,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            fetch_delay: Duration::ZERO,
            fetched_at: Mutex::new(Vec::new()),
        })
    }

    /// Every fetch takes `delay` of (tokio) time before answering.
    fn slow(fallback: Vec<PullRequestSnapshot>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            fetch_delay: delay,
            fetched_at: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl StalePullRequestSource for ScriptedSource {
    async fn fetch_stale(&self) -> Result<Vec<PullRequestSnapshot>, FetchError> {
        self.fetched_at.lock().push(tokio::time::Instant::now());
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

#[derive(Default)]
struct RecordingNotifier {
    failing: HashSet<String>,
    attempts: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn failing_for(ids: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            failing: ids.iter().map(|s| s.to_string()).collect(),
            attempts: Mutex::new(Vec::new()),
        })
    }

    fn attempts(&self) -> Vec<String> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, pr: &PullRequestSnapshot) -> Result<(), DeliveryError> {
        self.attempts.lock().push(pr.id.clone());
        if self.failing.contains(&pr.id) {
            return Err(DeliveryError::Status {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                body: "boom".into(),
            });
        }
        Ok(())
    }
}

fn bad_gateway() -> FetchError {
    FetchError::Status {
        status: reqwest::StatusCode::BAD_GATEWAY,
        body: "upstream down".into(),
    }
}

#[tokio::test]
async fn fetch_failure_leaves_tracker_untouched() {
    let source = ScriptedSource::new(
        vec![Ok(vec![pr("A"), pr("B")]), Err(bad_gateway())],
        vec![pr("A"), pr("B")],
    );
    let notifier = RecordingNotifier::failing_for(&[]);
    let clock = ManualClock::new(t0());
    let mut poll = PollLoop::new(
        source,
        notifier.clone(),
        clock.clone(),
        StaleTracker::new(ChronoDuration::hours(1)),
        INTERVAL,
    );

    let first = poll.run_cycle().await;
    assert_eq!(
        first,
        CycleReport::Completed {
            stale: 2,
            notified: 2,
            failed: 0
        }
    );

    clock.advance(ChronoDuration::minutes(5));
    assert_eq!(poll.run_cycle().await, CycleReport::Skipped);
    assert_eq!(poll.tracker().len(), 2, "failed fetch must not clear state");
    assert_eq!(poll.tracker().last_notified_at("A"), Some(t0()));
    assert_eq!(poll.state(), LoopState::Idle);

    // Back to normal: still inside the cooldown, nothing re-sent.
    clock.advance(ChronoDuration::minutes(5));
    assert_eq!(
        poll.run_cycle().await,
        CycleReport::Completed {
            stale: 2,
            notified: 0,
            failed: 0
        }
    );
    assert_eq!(notifier.attempts(), vec!["A", "B"]);
}

#[tokio::test]
async fn one_failed_delivery_does_not_block_the_rest() {
    let source = ScriptedSource::new(vec![], vec![pr("A"), pr("B"), pr("C")]);
    let notifier = RecordingNotifier::failing_for(&["B"]);
    let clock = ManualClock::new(t0());
    let mut poll = PollLoop::new(
        source,
        notifier.clone(),
        clock.clone(),
        StaleTracker::new(ChronoDuration::hours(1)),
        INTERVAL,
    );

    let report = poll.run_cycle().await;
    assert_eq!(
        report,
        CycleReport::Completed {
            stale: 3,
            notified: 2,
            failed: 1
        }
    );
    assert_eq!(notifier.attempts(), vec!["A", "B", "C"]);

    // B counts as notified: no storm on the next cycle.
    clock.advance(ChronoDuration::minutes(5));
    poll.run_cycle().await;
    assert_eq!(notifier.attempts().len(), 3);
    assert_eq!(poll.tracker().last_notified_at("B"), Some(t0()));
}

#[tokio::test(start_paused = true)]
async fn first_cycle_is_immediate_then_fixed_interval() {
    let source = ScriptedSource::new(vec![], vec![pr("A")]);
    let notifier = RecordingNotifier::failing_for(&[]);
    let mut poll = PollLoop::new(
        source.clone(),
        notifier.clone(),
        ManualClock::new(t0()),
        StaleTracker::new(ChronoDuration::hours(1)),
        INTERVAL,
    );

    let start = tokio::time::Instant::now();
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let task = tokio::spawn(async move {
        poll.run(token).await;
        poll
    });

    tokio::time::sleep(Duration::from_secs(650)).await;
    cancel.cancel();
    let poll = task.await.expect("loop task");

    let offsets: Vec<u64> = source
        .fetched_at
        .lock()
        .iter()
        .map(|t| t.duration_since(start).as_secs())
        .collect();
    assert_eq!(offsets, vec![0, 300, 600]);
    assert_eq!(poll.state(), LoopState::Stopped);
    // Manual clock never moved, so only the first sighting notified.
    assert_eq!(notifier.attempts(), vec!["A"]);
}

#[tokio::test(start_paused = true)]
async fn interval_counts_from_the_end_of_a_slow_cycle() {
    let fetch_time = Duration::from_secs(100);
    let source = ScriptedSource::slow(vec![pr("A")], fetch_time);
    let notifier = RecordingNotifier::failing_for(&[]);
    let mut poll = PollLoop::new(
        source.clone(),
        notifier.clone(),
        ManualClock::new(t0()),
        StaleTracker::new(ChronoDuration::hours(1)),
        INTERVAL,
    );

    let start = tokio::time::Instant::now();
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let task = tokio::spawn(async move {
        poll.run(token).await;
        (poll, start.elapsed())
    });

    // Cycles start at 0, 400 and 800; the third fetch is still running at 850.
    tokio::time::sleep(Duration::from_secs(850)).await;
    cancel.cancel();
    let (poll, stopped_after) = task.await.expect("loop task");

    let offsets: Vec<u64> = source
        .fetched_at
        .lock()
        .iter()
        .map(|t| t.duration_since(start).as_secs())
        .collect();
    assert_eq!(offsets, vec![0, 400, 800]);
    // The in-flight cycle runs to completion before the loop stops.
    assert_eq!(stopped_after, Duration::from_secs(900));
    assert_eq!(notifier.attempts(), vec!["A"]);
    assert!(poll.tracker().is_tracked("A"));
    assert_eq!(poll.state(), LoopState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn cancel_interrupts_the_sleep() {
    let source = ScriptedSource::new(vec![], vec![]);
    let mut poll = PollLoop::new(
        source.clone(),
        RecordingNotifier::failing_for(&[]),
        ManualClock::new(t0()),
        StaleTracker::new(ChronoDuration::hours(1)),
        Duration::from_secs(3600),
    );

    let start = tokio::time::Instant::now();
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let task = tokio::spawn(async move {
        poll.run(token).await;
        poll
    });

    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();
    let poll = task.await.expect("loop task");

    assert!(start.elapsed() < Duration::from_secs(3600));
    assert_eq!(source.fetched_at.lock().len(), 1);
    assert_eq!(poll.state(), LoopState::Stopped);
}

#[tokio::test]
async fn cancelled_before_start_runs_no_cycle() {
    let source = ScriptedSource::new(vec![], vec![pr("A")]);
    let mut poll = PollLoop::new(
        source.clone(),
        RecordingNotifier::failing_for(&[]),
        ManualClock::new(t0()),
        StaleTracker::new(ChronoDuration::hours(1)),
        INTERVAL,
    );

    let cancel = CancellationToken::new();
    cancel.cancel();
    poll.run(cancel).await;

    assert!(source.fetched_at.lock().is_empty());
    assert_eq!(poll.state(), LoopState::Stopped);
}
