use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Persisted per-source crawl state
///
/// `seen_ids` only grows: [`CrawlState::merge`] adds identifiers and never
/// removes any. Clearing it is an out-of-band operation on the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlState {
    /// Identifiers of items already handled in an earlier cycle
    pub seen_ids: HashSet<String>,

    /// Start time of the last completed cycle
    pub last_run: Option<DateTime<Utc>>,
}

impl CrawlState {
    /// Creates an empty state (first run)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_seen(&self, id: &str) -> bool {
        self.seen_ids.contains(id)
    }

    /// Merges the outcome of a completed cycle into the state
    ///
    /// # Arguments
    ///
    /// * `new_ids` - Identifiers handled during the cycle
    /// * `cycle_started` - When the cycle started
    ///
    /// The last-run timestamp never moves backwards.
    pub fn merge<I>(&mut self, new_ids: I, cycle_started: DateTime<Utc>)
    where
        I: IntoIterator<Item = String>,
    {
        self.seen_ids.extend(new_ids);
        self.last_run = Some(match self.last_run {
            Some(previous) => previous.max(cycle_started),
            None => cycle_started,
        });
    }
}
