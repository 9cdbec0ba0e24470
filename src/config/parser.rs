use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use offer_harvester::config::load_config;
///
/// let config = load_config(Path::new("harvester.toml")).unwrap();
/// println!("Declared sources: {}", config.sources.len());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    // Read the configuration file
    let content = std::fs::read_to_string(path)?;

    // Parse TOML
    let config: Config = toml::from_str(&content)?;

    // Validate the configuration
    validate(&config)?;

    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// The hash is stored with every crawl cycle report, so a change in
/// schemas or cutoff settings between runs can be traced.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok((Config, String))` - Successfully loaded configuration and its hash
/// * `Err(ConfigError)` - Failed to load or parse the configuration
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const BASE_CONFIG: &str = r#"
[user-agent]
crawler-name = "OfferHarvester"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[output]
database-path = "./offers.db"
"#;

    #[test]
    fn test_load_minimal_config_uses_defaults() {
        let file = create_temp_config(BASE_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.max_age_days, 7);
        assert_eq!(config.crawler.request_timeout_secs, 60);
        assert!(config.crawler.enabled_sources.is_empty());
        assert_eq!(config.user_agent.crawler_name, "OfferHarvester");
        assert!(config.enrichment.is_none());
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_load_full_config() {
        let config_content = format!(
            r#"
[crawler]
max-age-days = 14
request-timeout-secs = 20
enabled-sources = ["emploitogo_info", "local_board"]
{}
[enrichment]
endpoint = "https://api.example.com/v1"
model = "small-model"
timeout-secs = 10

[[source]]
name = "local_board"
listing-urls = ["https://jobs.example.tg/offres"]
next-page-selector = "a.next"

[source.listing]
base-selector = "article.offer"
url-field = "url"

[[source.listing.fields]]
name = "url"
selector = "h2 a"
type = "attribute"
attribute = "href"

[source.detail]
base-selector = "main"
date-field = "date_posted"

[[source.detail.fields]]
name = "title"
selector = "h1"

[[source.detail.fields]]
name = "date_posted"
selector = "time"

[[source.detail.fields]]
name = "remote_possible"
selector = ".description"
type = "keyword"
keywords = ["télétravail", "remote"]
"#,
            BASE_CONFIG
        );

        let file = create_temp_config(&config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.max_age_days, 14);
        assert_eq!(config.crawler.enabled_sources.len(), 2);

        let enrichment = config.enrichment.unwrap();
        assert_eq!(enrichment.model, "small-model");
        assert_eq!(enrichment.api_key_env, "ENRICHMENT_API_KEY");
        assert_eq!(enrichment.timeout_secs, 10);

        assert_eq!(config.sources.len(), 1);
        let source = &config.sources[0];
        assert_eq!(source.next_page_selector.as_deref(), Some("a.next"));
        assert_eq!(source.listing.fields[0].kind, "attribute");
        assert_eq!(source.detail.fields[0].kind, "text");
        assert_eq!(source.detail.fields[2].keywords.len(), 2);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let config_content = "this is not valid TOML {{{";
        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = format!("[crawler]\nmax-age-days = 0\n{}", BASE_CONFIG);

        let file = create_temp_config(&config_content);
        let result = load_config(file.path());
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_hash_tracks_config_content() {
        let file = create_temp_config(BASE_CONFIG);
        let (_, hash) = load_config_with_hash(file.path()).unwrap();

        assert_eq!(hash, compute_config_hash(file.path()).unwrap());
        assert_eq!(hash.len(), 64);

        let changed = create_temp_config(&format!("[crawler]\nmax-age-days = 3\n{}", BASE_CONFIG));
        assert_ne!(hash, compute_config_hash(changed.path()).unwrap());
    }
}
