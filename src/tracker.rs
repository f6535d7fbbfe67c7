// src/tracker.rs
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::review::PullRequestSnapshot;

#[derive(Debug, Clone)]
struct TrackingEntry {
    snapshot: PullRequestSnapshot,
    last_notified_at: DateTime<Utc>,
}

/// Per-pull-request cooldown gate across poll cycles.
/// - First sighting of an id always notifies.
/// - A tracked id notifies again only once strictly more than
///   `resend_timeout` has passed since its last notification.
/// - Ids missing from a cycle's input are forgotten, so a later
///   re-staleness counts as a first sighting.
///
/// Only `reconcile` mutates state; calls must not overlap (`&mut self`).
#[derive(Debug, Clone)]
pub struct StaleTracker {
    resend_timeout: ChronoDuration,
    entries: HashMap<String, TrackingEntry>,
}

impl StaleTracker {
    /// A negative `resend_timeout` is treated as zero.
    pub fn new(resend_timeout: ChronoDuration) -> Self {
        Self {
            resend_timeout: resend_timeout.max(ChronoDuration::zero()),
            entries: HashMap::new(),
        }
    }

    /// Bring tracking in line with this cycle's stale set and return the
    /// snapshots that must be notified now, in input order.
    pub fn reconcile(
        &mut self,
        stale: &[PullRequestSnapshot],
        now: DateTime<Utc>,
    ) -> Vec<PullRequestSnapshot> {
        let incoming: HashSet<&str> = stale.iter().map(|s| s.id.as_str()).collect();
        self.entries.retain(|id, _| incoming.contains(id.as_str()));

        let mut selected = Vec::new();
        for s in stale {
            match self.entries.get_mut(&s.id) {
                None => {
                    self.entries.insert(
                        s.id.clone(),
                        TrackingEntry {
                            snapshot: s.clone(),
                            last_notified_at: now,
                        },
                    );
                    selected.push(s.clone());
                }
                Some(entry) => {
                    if now.signed_duration_since(entry.last_notified_at) > self.resend_timeout {
                        entry.last_notified_at = now;
                        selected.push(s.clone());
                    }
                    entry.snapshot = s.clone();
                }
            }
        }

        tracing::debug!(
            stale = stale.len(),
            selected = selected.len(),
            tracked = self.entries.len(),
            "reconciled stale pull requests"
        );
        selected
    }

    pub fn resend_timeout(&self) -> ChronoDuration {
        self.resend_timeout
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_tracked(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn last_notified_at(&self, id: &str) -> Option<DateTime<Utc>> {
        self.entries.get(id).map(|e| e.last_notified_at)
    }

    /// Most recent snapshot seen for `id`.
    pub fn snapshot(&self, id: &str) -> Option<&PullRequestSnapshot> {
        self.entries.get(id).map(|e| &e.snapshot)
    }
}
