//! Offer Harvester main entry point
//!
//! This is the command-line interface for the incremental job-offer crawler.

use anyhow::Context;
use clap::Parser;
use offer_harvester::config::{load_config_with_hash, Config};
use offer_harvester::crawler::{run_harvest, HarvestOptions};
use offer_harvester::output::{load_statistics, print_run_summary, print_statistics};
use offer_harvester::source::SourceRegistry;
use offer_harvester::storage::SqliteStorage;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Offer Harvester: an incremental job-offer crawler
///
/// Offer Harvester walks the listing pages of job boards, resolves every
/// field of each new offer through an extraction cascade and stores the
/// result, remembering which offers it has already seen.
#[derive(Parser, Debug)]
#[command(name = "offer-harvester")]
#[command(version = "1.0.0")]
#[command(about = "An incremental job-offer crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Forget the crawl state of the selected sources before crawling
    #[arg(long)]
    fresh: bool,

    /// Crawl only this source (repeatable)
    #[arg(long = "source", value_name = "NAME")]
    sources: Vec<String>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "fresh"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "fresh"])]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config, &cli.sources)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        let options = HarvestOptions {
            fresh: cli.fresh,
            sources: cli.sources,
        };
        handle_harvest(&config, &config_hash, &options).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("offer_harvester=info,warn"),
            1 => EnvFilter::new("offer_harvester=debug,info"),
            2 => EnvFilter::new("offer_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, cli_sources: &[String]) -> anyhow::Result<()> {
    println!("=== Offer Harvester Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max age: {} days", config.crawler.max_age_days);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!(
        "  Max concurrent sources: {}",
        config.crawler.max_concurrent_sources
    );

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nEnrichment:");
    match &config.enrichment {
        Some(enrichment) if enrichment.api_key().is_some() => {
            println!("  {} via {}", enrichment.model, enrichment.endpoint);
        }
        Some(enrichment) => println!("  disabled (${} is not set)", enrichment.api_key_env),
        None => println!("  disabled"),
    }

    let registry = SourceRegistry::builtin().with_configured(&config.sources)?;
    let names = if cli_sources.is_empty() {
        config.crawler.enabled_sources.as_slice()
    } else {
        cli_sources
    };
    let sources = registry.select(names)?;

    println!("\nSources ({}):", sources.len());
    for source in &sources {
        println!(
            "  - {} ({} listing fields, {} detail fields)",
            source.name(),
            source.listing_schema().fields.len(),
            source.detail_schema().fields.len()
        );
        for url in source.listing_urls() {
            println!("    * {}", url);
        }
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: &Config,
    config_hash: &str,
    options: &HarvestOptions,
) -> anyhow::Result<()> {
    if options.fresh {
        tracing::info!("Starting fresh harvest (ignoring previous state)");
    }

    let report = run_harvest(config, config_hash, options)
        .await
        .context("harvest failed")?;
    print_run_summary(&report);

    let failed = report.failed_sources();
    if failed.is_empty() {
        tracing::info!("Harvest completed successfully");
    } else {
        tracing::warn!("Harvest finished with failed sources: {}", failed.join(", "));
    }
    Ok(())
}
