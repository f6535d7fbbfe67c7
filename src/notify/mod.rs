pub mod format;
pub mod slack;

use std::sync::Arc;

use crate::review::PullRequestSnapshot;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("webhook returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Delivers one stale pull request alert. A single attempt per call; the
/// caller decides what a failure means.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, pr: &PullRequestSnapshot) -> Result<(), DeliveryError>;
}

#[async_trait::async_trait]
impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    async fn notify(&self, pr: &PullRequestSnapshot) -> Result<(), DeliveryError> {
        (**self).notify(pr).await
    }
}
