// src/notify/format.rs
use std::borrow::Cow;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::review::PullRequestSnapshot;

const UNITS: [(&str, i64); 5] = [
    ("week", 7 * 24 * 3600),
    ("day", 24 * 3600),
    ("hour", 3600),
    ("minute", 60),
    ("second", 1),
];

/// "2 days, 3 hours, 5 minutes": up to `max_units` non-zero units, largest
/// first. Sub-second remainders are dropped, and anything under one second
/// (or negative) reads "0 seconds".
pub fn humanize_duration(d: ChronoDuration, max_units: usize) -> String {
    let mut rest = d.num_seconds().max(0);
    let mut parts = Vec::new();

    for (name, secs) in UNITS {
        if parts.len() == max_units {
            break;
        }
        let n = rest / secs;
        rest %= secs;
        if n > 0 {
            let plural = if n == 1 { "" } else { "s" };
            parts.push(format!("{n} {name}{plural}"));
        }
    }

    if parts.is_empty() {
        "0 seconds".to_string()
    } else {
        parts.join(", ")
    }
}

/// Slack mrkdwn reserves `&`, `<` and `>`; everything else passes through.
pub fn escape_slack(s: &str) -> Cow<'_, str> {
    html_escape::encode_text(s)
}

/// Attachment text for one stale pull request, as of `now`.
pub fn alert_text(pr: &PullRequestSnapshot, now: DateTime<Utc>) -> String {
    let age = humanize_duration(now.signed_duration_since(pr.last_updated), 3);
    format!(
        "The pull request is not updated within *{age}*:\n<{}|{}>",
        pr.link,
        escape_slack(&pr.title)
    )
}
