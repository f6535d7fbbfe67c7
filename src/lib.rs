// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod clock;
pub mod config;
pub mod metrics;
pub mod notify;
pub mod poller;
pub mod review;
pub mod tracker;

// ---- Re-exports for stable public API ----
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::notify::{slack::SlackNotifier, DeliveryError, Notifier};
pub use crate::poller::{CycleReport, LoopState, PollLoop};
pub use crate::review::{stash::StashClient, FetchError, PullRequestSnapshot, StalePullRequestSource};
pub use crate::tracker::StaleTracker;
