//! Crawler module for incremental harvesting
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching under per-request timeouts
//! - The per-source crawl cycle (listing walk, detail resolution, export)
//! - Concurrent scheduling of cycles across sources

mod coordinator;
mod fetcher;
mod scheduler;

pub use coordinator::{Coordinator, CrawlContext, CrawlSettings, CycleReport, ItemOutcome};
pub use fetcher::{build_http_client, fetch_url, DocumentFetcher, FetchResult, HttpFetcher};
pub use scheduler::{Scheduler, SchedulerReport, SourceOutcome};

use crate::collab::LlmEnricher;
use crate::config::Config;
use crate::source::SourceRegistry;
use crate::storage::{open_storage, StateStore};
use crate::HarvestError;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Per-run choices made on the command line
#[derive(Debug, Clone, Default)]
pub struct HarvestOptions {
    /// Forget each selected source's state before crawling
    pub fresh: bool,

    /// Sources to crawl; empty means the configured or registered ones
    pub sources: Vec<String>,
}

/// Runs one crawl cycle for every selected source
///
/// This is the main entry point for a harvest. It will:
/// 1. Open the storage database
/// 2. Build the source registry (built-in plus configured sources)
/// 3. Build the HTTP client and the optional enricher
/// 4. Run every selected source's cycle concurrently
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `config_hash` - Hash of the configuration file, stored with each cycle
/// * `options` - Source selection and fresh-start flag
///
/// # Returns
///
/// * `Ok(SchedulerReport)` - Every source ran; individual failures are in the report
/// * `Err(HarvestError)` - Setup failed before any source ran
pub async fn run_harvest(
    config: &Config,
    config_hash: &str,
    options: &HarvestOptions,
) -> Result<SchedulerReport, HarvestError> {
    let storage = Arc::new(open_storage(Path::new(&config.output.database_path))?);

    let registry = SourceRegistry::builtin().with_configured(&config.sources)?;
    let names = if options.sources.is_empty() {
        &config.crawler.enabled_sources
    } else {
        &options.sources
    };
    let sources = registry.select(names)?;

    if options.fresh {
        for source in &sources {
            info!("Resetting crawl state for {}", source.name());
            storage.reset_state(source.name())?;
        }
    }

    let client = build_http_client(&config.user_agent)?;
    let mut context = CrawlContext::new(
        Arc::new(HttpFetcher::new(client.clone())),
        storage.clone(),
        storage.clone(),
    )
    .with_settings(CrawlSettings::from_config(config));

    match config
        .enrichment
        .as_ref()
        .and_then(|e| LlmEnricher::from_config(client, e))
    {
        Some(enricher) => {
            info!("Enrichment enabled");
            context = context.with_enricher(Arc::new(enricher));
        }
        None => info!("Enrichment disabled"),
    }

    info!(
        "Harvesting {} source(s): {}",
        sources.len(),
        sources.iter().map(|s| s.name()).collect::<Vec<_>>().join(", ")
    );

    let scheduler = Scheduler::new(context, config.crawler.max_concurrent_sources)
        .with_cycle_log(storage, config_hash);
    Ok(scheduler.run(sources).await)
}
