// src/config/notifier.rs
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Duration as ChronoDuration;
use serde::Deserialize;

pub const ENV_STASH_ACCESS_TOKEN: &str = "STASH_ACCESS_TOKEN";
pub const ENV_SLACK_WEBHOOK_URL: &str = "SLACK_WEBHOOK_URL";

/// Ten years; keeps every duration comfortably inside chrono's range.
const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 3600;

fn default_page_size() -> u32 {
    100
}
fn default_stash_timeout_secs() -> u64 {
    30
}
fn default_slack_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    pub general: GeneralConfig,
    pub stash: StashConfig,
    pub slack: SlackConfig,
    #[serde(default)]
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GeneralConfig {
    /// Delay between the end of one cycle and the start of the next.
    pub poll_interval_secs: u64,
    /// Minimum time between two notifications for the same pull request.
    pub resend_timeout_secs: u64,
    /// How long a pull request must go without updates to count as stale.
    pub staleness_threshold_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StashConfig {
    pub base_url: String,
    /// "ENV" means: read from STASH_ACCESS_TOKEN
    pub access_token: String,
    pub project: String,
    pub repository: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_stash_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackConfig {
    /// "ENV" means: read from SLACK_WEBHOOK_URL
    pub webhook_url: String,
    pub channel: String,
    /// Slack user group pinged with every alert; empty disables the mention.
    #[serde(default)]
    pub mentioning_group_id: String,
    #[serde(default = "default_slack_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl GeneralConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn resend_timeout(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.resend_timeout_secs as i64)
    }

    pub fn staleness_threshold(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.staleness_threshold_secs as i64)
    }
}

impl NotifierConfig {
    /// Resolve "ENV" secrets, trim string fields and check ranges.
    pub(crate) fn finalize(mut self) -> Result<Self> {
        self.stash.access_token = resolve_secret(&self.stash.access_token, ENV_STASH_ACCESS_TOKEN)?;
        self.slack.webhook_url = resolve_secret(&self.slack.webhook_url, ENV_SLACK_WEBHOOK_URL)?;

        for field in [
            &mut self.stash.base_url,
            &mut self.stash.project,
            &mut self.stash.repository,
            &mut self.slack.channel,
            &mut self.slack.mentioning_group_id,
        ] {
            *field = field.trim().to_string();
        }

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        let g = &self.general;
        if g.poll_interval_secs == 0 {
            bail!("general.poll_interval_secs must be greater than zero");
        }
        if g.staleness_threshold_secs == 0 {
            bail!("general.staleness_threshold_secs must be greater than zero");
        }
        for (name, secs) in [
            ("poll_interval_secs", g.poll_interval_secs),
            ("resend_timeout_secs", g.resend_timeout_secs),
            ("staleness_threshold_secs", g.staleness_threshold_secs),
        ] {
            if secs > MAX_DURATION_SECS {
                bail!("general.{name} is larger than {MAX_DURATION_SECS} seconds");
            }
        }

        for (name, value) in [
            ("stash.base_url", &self.stash.base_url),
            ("stash.access_token", &self.stash.access_token),
            ("stash.project", &self.stash.project),
            ("stash.repository", &self.stash.repository),
            ("slack.webhook_url", &self.slack.webhook_url),
            ("slack.channel", &self.slack.channel),
        ] {
            if value.trim().is_empty() {
                bail!("{name} must not be empty");
            }
        }

        if self.stash.request_timeout_secs == 0 || self.slack.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than zero");
        }
        Ok(())
    }
}

fn resolve_secret(value: &str, env_key: &str) -> Result<String> {
    if value.trim().eq_ignore_ascii_case("env") {
        env::var(env_key).with_context(|| format!("missing {env_key} env var"))
    } else {
        Ok(value.to_string())
    }
}
