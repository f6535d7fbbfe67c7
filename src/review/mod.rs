// src/review/mod.rs
pub mod stash;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One open pull request as seen on a single poll cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestSnapshot {
    pub id: String,
    pub title: String,
    pub link: String,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("review server request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("review server returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("decoding review server response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("pull request {id}: {reason}")]
    InvalidPullRequest { id: String, reason: String },
    #[error("paging stopped at start={start}: {reason}")]
    Paging { start: u32, reason: String },
}

/// Anything that can list the currently stale pull requests.
/// Implementations perform a single attempt; the poll loop retries next cycle.
#[async_trait::async_trait]
pub trait StalePullRequestSource: Send + Sync {
    async fn fetch_stale(&self) -> Result<Vec<PullRequestSnapshot>, FetchError>;
}

#[async_trait::async_trait]
impl<T: StalePullRequestSource + ?Sized> StalePullRequestSource for Arc<T> {
    async fn fetch_stale(&self) -> Result<Vec<PullRequestSnapshot>, FetchError> {
        (**self).fetch_stale().await
    }
}

/// A pull request counts as stale once it has gone `threshold` or longer
/// without an update.
pub fn is_stale(
    last_updated: DateTime<Utc>,
    now: DateTime<Utc>,
    threshold: chrono::Duration,
) -> bool {
    now.signed_duration_since(last_updated) >= threshold
}
