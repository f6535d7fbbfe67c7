use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

use super::format::alert_text;
use super::{DeliveryError, Notifier};
use crate::clock::{Clock, SystemClock};
use crate::config::SlackConfig;
use crate::review::PullRequestSnapshot;

const ALERT_COLOR: &str = "#D00000";
const ERROR_BODY_LIMIT: usize = 512;

/// Posts stale pull request alerts to a Slack incoming webhook.
pub struct SlackNotifier {
    webhook_url: String,
    channel: String,
    username: String,
    mentioning_group_id: String,
    client: Client,
    clock: Arc<dyn Clock>,
}

impl SlackNotifier {
    /// `username` is shown as the sender; the repository name reads best.
    pub fn new(cfg: &SlackConfig, username: impl Into<String>) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        Ok(Self {
            webhook_url: cfg.webhook_url.clone(),
            channel: cfg.channel.clone(),
            username: username.into(),
            mentioning_group_id: cfg.mentioning_group_id.clone(),
            client,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn message(&self, pr: &PullRequestSnapshot) -> SlackMessage {
        let text = alert_text(pr, self.clock.now());
        let mention = if self.mentioning_group_id.is_empty() {
            None
        } else {
            Some(format!("<!subteam^{}>", self.mentioning_group_id))
        };

        SlackMessage {
            channel: self.channel.clone(),
            username: self.username.clone(),
            icon_emoji: ":warning:",
            mrkdwn: true,
            text: mention,
            attachments: vec![SlackAttachment {
                title: "Attention",
                fallback: text.clone(),
                text,
                color: ALERT_COLOR,
                fields: vec![SlackField {
                    title: "*Please take care of this pull request!*",
                }],
            }],
        }
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, pr: &PullRequestSnapshot) -> Result<(), DeliveryError> {
        let body = self.message(pr);

        let resp = self.client.post(&self.webhook_url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(DeliveryError::Status {
                status,
                body: text.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        tracing::debug!(pr = %pr.id, "message was sent to the slack channel");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct SlackMessage {
    channel: String,
    username: String,
    icon_emoji: &'static str,
    mrkdwn: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    attachments: Vec<SlackAttachment>,
}

#[derive(Debug, Serialize)]
struct SlackAttachment {
    title: &'static str,
    fallback: String,
    text: String,
    color: &'static str,
    fields: Vec<SlackField>,
}

#[derive(Debug, Serialize)]
struct SlackField {
    title: &'static str,
}
