//! Sends one synthetic stale pull request through the configured Slack webhook
//! to check channel wiring without touching the review server.

use anyhow::Result;
use chrono::{Duration, Utc};
use stale_pr_notifier::{config, Notifier, PullRequestSnapshot, SlackNotifier};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let cfg = config::load_default()?;
    let notifier = SlackNotifier::new(&cfg.slack, cfg.stash.repository.clone())?;

    let pr = PullRequestSnapshot {
        id: "demo".into(),
        title: "notify-demo: ignore me".into(),
        link: format!("{}/projects/{}", cfg.stash.base_url, cfg.stash.project),
        last_updated: Utc::now() - Duration::hours(26),
    };
    notifier.notify(&pr).await?;

    println!("notify-demo done");
    Ok(())
}
