//! Offer Harvester: incremental job-offer crawler
//!
//! This crate walks the listing and detail pages of job boards, resolves
//! every declared field through an ordered extraction cascade, and exports
//! the resulting records while tracking which offers were already seen.

pub mod collab;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod record;
pub mod source;
pub mod state;
pub mod storage;
pub mod text;

use thiserror::Error;

/// Main error type for harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Enrichment error: {0}")]
    Enrichment(#[from] collab::EnrichmentError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source '{source_name}' failed: {message}")]
    Source {
        source_name: String,
        message: String,
    },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Unknown source: {0}")]
    UnknownSource(String),
}

/// Result type alias for harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use record::{DetailRecord, FieldValue, ListingItem, Provenance};
pub use source::{SourceDescriptor, SourceRegistry};
pub use state::CrawlState;
