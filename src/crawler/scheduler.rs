//! Scheduler for running crawl cycles across sources
//!
//! This module handles:
//! - One task per source, so a failing source never stops the others
//! - Global concurrency limiting via a semaphore
//! - Recording every cycle, completed or failed, in the cycle log

use crate::crawler::coordinator::{Coordinator, CrawlContext, CycleReport};
use crate::source::SourceDescriptor;
use crate::storage::{CycleLog, CycleRecord, CycleStatus};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// How one source's cycle ended
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    Completed(CycleReport),
    Failed { source: String, error: String },
}

impl SourceOutcome {
    pub fn source(&self) -> &str {
        match self {
            Self::Completed(report) => &report.source,
            Self::Failed { source, .. } => source,
        }
    }
}

/// Outcomes of every source of one run, sorted by source name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchedulerReport {
    pub outcomes: Vec<SourceOutcome>,
}

impl SchedulerReport {
    pub fn completed(&self) -> impl Iterator<Item = &CycleReport> {
        self.outcomes.iter().filter_map(|o| match o {
            SourceOutcome::Completed(report) => Some(report),
            SourceOutcome::Failed { .. } => None,
        })
    }

    pub fn failed_sources(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, SourceOutcome::Failed { .. }))
            .map(SourceOutcome::source)
            .collect()
    }

    pub fn total_exported(&self) -> u32 {
        self.completed().map(|r| r.exported).sum()
    }

    pub fn total_errors(&self) -> u32 {
        self.completed().map(|r| r.errors).sum()
    }
}

/// Runs one crawl cycle per source concurrently
///
/// Each source gets its own tokio task. An error or a panic inside a task
/// is recorded as that source's failure; the other tasks keep running.
pub struct Scheduler {
    context: CrawlContext,
    semaphore: Arc<Semaphore>,
    cycle_log: Option<Arc<dyn CycleLog>>,
    config_hash: String,
}

impl Scheduler {
    /// Creates a scheduler running at most `max_concurrent` cycles at once
    pub fn new(context: CrawlContext, max_concurrent: usize) -> Self {
        Self {
            context,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            cycle_log: None,
            config_hash: String::new(),
        }
    }

    /// Records every finished cycle in `log`, tagged with `config_hash`
    pub fn with_cycle_log(mut self, log: Arc<dyn CycleLog>, config_hash: &str) -> Self {
        self.cycle_log = Some(log);
        self.config_hash = config_hash.to_string();
        self
    }

    /// Runs one cycle for each source and waits for all of them
    ///
    /// # Arguments
    ///
    /// * `sources` - The sources to crawl
    ///
    /// # Returns
    ///
    /// One outcome per source, whatever happened to the others.
    pub async fn run(&self, sources: Vec<Arc<dyn SourceDescriptor>>) -> SchedulerReport {
        let run_started = Utc::now();
        let mut pending: BTreeSet<String> = BTreeSet::new();
        let mut tasks = JoinSet::new();

        for source in sources {
            let name = source.name().to_string();
            if !pending.insert(name.clone()) {
                warn!("Source {} listed twice, crawling it once", name);
                continue;
            }

            let semaphore = Arc::clone(&self.semaphore);
            let coordinator = Coordinator::new(source, self.context.clone());
            tasks.spawn(async move {
                let started_at = Utc::now();
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => coordinator.run_cycle().await.map_err(|e| e.to_string()),
                    Err(e) => Err(format!("scheduler closed: {}", e)),
                };
                (name, started_at, result)
            });
        }

        info!("Scheduled {} source cycles", pending.len());

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, started_at, result)) => {
                    pending.remove(&name);
                    let outcome = match result {
                        Ok(report) => SourceOutcome::Completed(report),
                        Err(error) => {
                            error!("Cycle for {} failed: {}", name, error);
                            SourceOutcome::Failed {
                                source: name,
                                error,
                            }
                        }
                    };
                    self.record(&outcome, started_at);
                    outcomes.push(outcome);
                }
                Err(e) => {
                    // The task's name is recovered from `pending` below
                    error!("Source task aborted: {}", e);
                }
            }
        }

        for name in pending {
            let outcome = SourceOutcome::Failed {
                source: name,
                error: "task panicked".to_string(),
            };
            self.record(&outcome, run_started);
            outcomes.push(outcome);
        }

        outcomes.sort_by(|a, b| a.source().cmp(b.source()));
        SchedulerReport { outcomes }
    }

    fn record(&self, outcome: &SourceOutcome, started_at: DateTime<Utc>) {
        let Some(log) = &self.cycle_log else {
            return;
        };

        let record = match outcome {
            SourceOutcome::Completed(report) => CycleRecord {
                source: report.source.clone(),
                started_at: report.started_at,
                finished_at: report.finished_at,
                status: CycleStatus::Completed,
                pages_visited: report.pages_visited,
                new_items: report.new_items,
                exported: report.exported,
                expired: report.expired,
                errors: report.errors,
                config_hash: self.config_hash.clone(),
            },
            SourceOutcome::Failed { source, .. } => CycleRecord {
                source: source.clone(),
                started_at,
                finished_at: Utc::now(),
                status: CycleStatus::Failed,
                pages_visited: 0,
                new_items: 0,
                exported: 0,
                expired: 0,
                errors: 1,
                config_hash: self.config_hash.clone(),
            },
        };

        if let Err(e) = log.record_cycle(&record) {
            warn!("Failed to record cycle for {}: {}", record.source, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::fetcher::{DocumentFetcher, FetchResult};
    use crate::record::ListingItem;
    use crate::source::{FieldSpec, Schema};
    use crate::state::CrawlState;
    use crate::storage::{HarvestQuery, MemoryStore, StateStore, StorageError, StorageResult};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::time::Duration;

    /// A source with a single listing page at `https://{name}.test/`
    struct StubSource {
        name: String,
        urls: Vec<String>,
        listing: Schema,
        detail: Schema,
        panics: bool,
    }

    impl StubSource {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                urls: vec![format!("https://{}.test/", name)],
                listing: Schema::new("stub-listing", "li")
                    .field(FieldSpec::attribute("url", "a", "href"))
                    .with_url_field("url"),
                detail: Schema::new("stub-detail", "article").field(FieldSpec::text("title", "h1")),
                panics: false,
            }
        }

        fn panicking(name: &str) -> Self {
            Self {
                panics: true,
                ..Self::new(name)
            }
        }
    }

    impl SourceDescriptor for StubSource {
        fn name(&self) -> &str {
            &self.name
        }

        fn listing_urls(&self) -> &[String] {
            &self.urls
        }

        fn listing_schema(&self) -> &Schema {
            &self.listing
        }

        fn detail_schema(&self) -> &Schema {
            &self.detail
        }

        fn unique_id(&self, item: &ListingItem) -> Option<String> {
            if self.panics {
                panic!("broken source plugin");
            }
            item.detail_url.clone()
        }
    }

    /// Serves one listing with one offer for every host
    struct StubFetcher;

    #[async_trait]
    impl DocumentFetcher for StubFetcher {
        async fn fetch(&self, url: &str, _timeout: Duration) -> FetchResult {
            let body = if url.ends_with("/offre") {
                "<article><h1>Comptable</h1></article>".to_string()
            } else {
                r#"<ul><li><a href="/offre">Comptable</a></li></ul>"#.to_string()
            };
            FetchResult::Success {
                final_url: url.to_string(),
                status_code: 200,
                body,
            }
        }
    }

    /// State store whose merge fails for one source
    struct FailingMerge {
        inner: MemoryStore,
        failing: String,
    }

    impl StateStore for FailingMerge {
        fn load_state(&self, source: &str) -> StorageResult<CrawlState> {
            self.inner.load_state(source)
        }

        fn merge_state(
            &self,
            source: &str,
            new_ids: &HashSet<String>,
            cycle_started: DateTime<Utc>,
        ) -> StorageResult<()> {
            if source == self.failing {
                return Err(StorageError::Database("disk full".to_string()));
            }
            self.inner.merge_state(source, new_ids, cycle_started)
        }

        fn reset_state(&self, source: &str) -> StorageResult<()> {
            self.inner.reset_state(source)
        }
    }

    fn context(store: Arc<MemoryStore>) -> CrawlContext {
        CrawlContext::new(Arc::new(StubFetcher), store.clone(), store)
    }

    #[tokio::test]
    async fn test_all_sources_complete() {
        let store = Arc::new(MemoryStore::new());
        let scheduler =
            Scheduler::new(context(store.clone()), 2).with_cycle_log(store.clone(), "abc123");

        let sources: Vec<Arc<dyn SourceDescriptor>> = vec![
            Arc::new(StubSource::new("alpha")),
            Arc::new(StubSource::new("beta")),
            Arc::new(StubSource::new("gamma")),
        ];
        let report = scheduler.run(sources).await;

        assert_eq!(report.outcomes.len(), 3);
        assert!(report.failed_sources().is_empty());
        assert_eq!(report.total_exported(), 3);
        assert_eq!(store.count_offers().unwrap(), 3);

        let cycles = store.cycles();
        assert_eq!(cycles.len(), 3);
        assert!(cycles.iter().all(|c| c.status == CycleStatus::Completed));
        assert!(cycles.iter().all(|c| c.config_hash == "abc123"));
    }

    #[tokio::test]
    async fn test_panicking_source_is_isolated() {
        let store = Arc::new(MemoryStore::new());
        let scheduler = Scheduler::new(context(store.clone()), 4).with_cycle_log(store.clone(), "h");

        let sources: Vec<Arc<dyn SourceDescriptor>> = vec![
            Arc::new(StubSource::new("alpha")),
            Arc::new(StubSource::panicking("broken")),
        ];
        let report = scheduler.run(sources).await;

        assert_eq!(report.failed_sources(), vec!["broken"]);
        assert_eq!(report.total_exported(), 1);
        assert!(store.load_state("alpha").unwrap().has_seen("https://alpha.test/offre"));

        let failed: Vec<_> = store
            .cycles()
            .into_iter()
            .filter(|c| c.status == CycleStatus::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].source, "broken");
    }

    #[tokio::test]
    async fn test_state_persist_failure_fails_only_that_source() {
        let store = Arc::new(MemoryStore::new());
        let states = Arc::new(FailingMerge {
            inner: MemoryStore::new(),
            failing: "beta".to_string(),
        });
        let context = CrawlContext::new(Arc::new(StubFetcher), states.clone(), store.clone());
        let scheduler = Scheduler::new(context, 1);

        let sources: Vec<Arc<dyn SourceDescriptor>> = vec![
            Arc::new(StubSource::new("alpha")),
            Arc::new(StubSource::new("beta")),
        ];
        let report = scheduler.run(sources).await;

        assert_eq!(report.failed_sources(), vec!["beta"]);
        assert!(states.load_state("alpha").unwrap().has_seen("https://alpha.test/offre"));
        assert_eq!(states.load_state("beta").unwrap(), CrawlState::new());
    }

    #[tokio::test]
    async fn test_duplicate_sources_run_once() {
        let store = Arc::new(MemoryStore::new());
        let scheduler = Scheduler::new(context(store.clone()), 2);

        let sources: Vec<Arc<dyn SourceDescriptor>> = vec![
            Arc::new(StubSource::new("alpha")),
            Arc::new(StubSource::new("alpha")),
        ];
        let report = scheduler.run(sources).await;

        assert_eq!(report.outcomes.len(), 1);
    }
}
