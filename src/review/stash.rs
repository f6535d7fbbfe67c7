// src/review/stash.rs
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::Deserialize;

use super::{is_stale, FetchError, PullRequestSnapshot, StalePullRequestSource};
use crate::clock::{Clock, SystemClock};
use crate::config::StashConfig;

/// Longest response body excerpt carried inside a `FetchError::Status`.
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestPage {
    #[serde(default)]
    values: Vec<StashPullRequest>,
    #[serde(default = "default_last_page")]
    is_last_page: bool,
    next_page_start: Option<u32>,
}

fn default_last_page() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StashPullRequest {
    id: u64,
    title: String,
    /// Unix epoch milliseconds.
    updated_date: i64,
    #[serde(default)]
    links: StashLinks,
}

#[derive(Debug, Default, Deserialize)]
struct StashLinks {
    #[serde(rename = "self", default)]
    self_links: Vec<StashLink>,
}

#[derive(Debug, Deserialize)]
struct StashLink {
    href: String,
}

fn into_snapshot(pr: StashPullRequest) -> Result<PullRequestSnapshot, FetchError> {
    let id = pr.id.to_string();
    let last_updated = DateTime::<Utc>::from_timestamp_millis(pr.updated_date).ok_or_else(|| {
        FetchError::InvalidPullRequest {
            id: id.clone(),
            reason: format!("updatedDate {} out of range", pr.updated_date),
        }
    })?;
    let link = pr
        .links
        .self_links
        .into_iter()
        .next()
        .map(|l| l.href)
        .ok_or_else(|| FetchError::InvalidPullRequest {
            id: id.clone(),
            reason: "missing self link".to_string(),
        })?;

    Ok(PullRequestSnapshot {
        id,
        title: pr.title,
        link,
        last_updated,
    })
}

/// A page that is not the last must move the cursor forward; anything else
/// would either loop forever or silently drop the remaining pull requests.
fn next_start(start: u32, next_page_start: Option<u32>) -> Result<u32, FetchError> {
    match next_page_start {
        Some(next) if next > start => Ok(next),
        Some(next) => Err(FetchError::Paging {
            start,
            reason: format!("nextPageStart {next} does not advance"),
        }),
        None => Err(FetchError::Paging {
            start,
            reason: "nextPageStart missing on a non-final page".to_string(),
        }),
    }
}

/// Reads open pull requests of one repository from the Stash / Bitbucket
/// Server REST API and keeps the stale ones.
pub struct StashClient {
    client: Client,
    pull_requests_url: String,
    access_token: String,
    page_size: u32,
    staleness_threshold: ChronoDuration,
    clock: Arc<dyn Clock>,
}

impl StashClient {
    pub fn new(cfg: &StashConfig, staleness_threshold: ChronoDuration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        let pull_requests_url = format!(
            "{}/rest/api/1.0/projects/{}/repos/{}/pull-requests",
            cfg.base_url.trim_end_matches('/'),
            cfg.project,
            cfg.repository
        );

        Ok(Self {
            client,
            pull_requests_url,
            access_token: cfg.access_token.clone(),
            page_size: cfg.page_size.max(1),
            staleness_threshold,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Every open pull request, following `nextPageStart` until the last page.
    pub async fn fetch_open(&self) -> Result<Vec<PullRequestSnapshot>, FetchError> {
        let mut out = Vec::new();
        let mut start: u32 = 0;

        loop {
            let page = self.fetch_page(start).await?;
            for pr in page.values {
                out.push(into_snapshot(pr)?);
            }

            if page.is_last_page {
                break;
            }
            start = next_start(start, page.next_page_start)?;
        }

        tracing::info!(count = out.len(), "open pull requests received");
        Ok(out)
    }

    async fn fetch_page(&self, start: u32) -> Result<PullRequestPage, FetchError> {
        let resp = self
            .client
            .get(&self.pull_requests_url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("state", "OPEN".to_string()),
                ("start", start.to_string()),
                ("limit", self.page_size.to_string()),
            ])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl StalePullRequestSource for StashClient {
    async fn fetch_stale(&self) -> Result<Vec<PullRequestSnapshot>, FetchError> {
        let open = self.fetch_open().await?;
        let now = self.clock.now();

        let stale: Vec<_> = open
            .into_iter()
            .filter(|pr| is_stale(pr.last_updated, now, self.staleness_threshold))
            .collect();

        tracing::info!(count = stale.len(), "stale pull requests received");
        Ok(stale)
    }
}
