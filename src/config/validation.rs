use crate::config::types::{
    Config, CrawlerConfig, EnrichmentConfig, OutputConfig, SchemaConfig, SourceConfig,
    UserAgentConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    if let Some(enrichment) = &config.enrichment {
        validate_enrichment_config(enrichment)?;
    }
    validate_sources(&config.sources)?;
    Ok(())
}

/// Validates crawl cycle configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_age_days < 1 || config.max_age_days > 365 {
        return Err(ConfigError::Validation(format!(
            "max_age_days must be between 1 and 365, got {}",
            config.max_age_days
        )));
    }

    if config.request_timeout_secs < 1 || config.request_timeout_secs > 600 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be between 1 and 600, got {}",
            config.request_timeout_secs
        )));
    }

    if config.max_concurrent_sources < 1 || config.max_concurrent_sources > 32 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_sources must be between 1 and 32, got {}",
            config.max_concurrent_sources
        )));
    }

    if config.enabled_sources.iter().any(|s| s.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "enabled_sources cannot contain empty names".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the enrichment section
fn validate_enrichment_config(config: &EnrichmentConfig) -> Result<(), ConfigError> {
    let endpoint = Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid enrichment endpoint: {}", e)))?;

    if endpoint.scheme() != "http" && endpoint.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "Enrichment endpoint '{}' must use http or https",
            config.endpoint
        )));
    }

    if config.model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "enrichment model cannot be empty".to_string(),
        ));
    }

    if config.api_key_env.trim().is_empty() {
        return Err(ConfigError::Validation(
            "enrichment api_key_env cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 || config.timeout_secs > 300 {
        return Err(ConfigError::Validation(format!(
            "enrichment timeout_secs must be between 1 and 300, got {}",
            config.timeout_secs
        )));
    }

    Ok(())
}

/// Validates declarative sources
///
/// Field-level checks (extraction types, hints) happen when the source is
/// registered; this only checks what can be judged from the entry itself.
fn validate_sources(sources: &[SourceConfig]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();

    for source in sources {
        validate_source_name(&source.name)?;

        if !names.insert(source.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Source '{}' is declared more than once",
                source.name
            )));
        }

        if source.listing_urls.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Source '{}' must have at least one listing URL",
                source.name
            )));
        }

        for listing_url in &source.listing_urls {
            let url = Url::parse(listing_url).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid listing URL '{}': {}", listing_url, e))
            })?;

            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ConfigError::Validation(format!(
                    "Listing URL '{}' must use http or https",
                    listing_url
                )));
            }
        }

        validate_schema(&source.name, "listing", &source.listing)?;
        validate_schema(&source.name, "detail", &source.detail)?;

        if source.listing.url_field.is_none() && source.id_field.is_none() {
            return Err(ConfigError::Validation(format!(
                "Source '{}' needs a listing url-field or an id-field to identify items",
                source.name
            )));
        }
    }

    Ok(())
}

fn validate_schema(source: &str, role: &str, schema: &SchemaConfig) -> Result<(), ConfigError> {
    if schema.base_selector.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "Source '{}' {} schema needs a base-selector",
            source, role
        )));
    }

    let mut names = HashSet::new();
    for field in &schema.fields {
        if field.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "Source '{}' {} schema has a field without a name",
                source, role
            )));
        }
        if !names.insert(field.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Source '{}' {} schema declares field '{}' twice",
                source, role, field.name
            )));
        }
    }

    for (label, reference) in [("date-field", &schema.date_field), ("url-field", &schema.url_field)] {
        if let Some(name) = reference {
            if !names.contains(name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Source '{}' {} schema {} '{}' is not a declared field",
                    source, role, label, name
                )));
            }
        }
    }

    Ok(())
}

/// Source names are used as database keys and CLI arguments
fn validate_source_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::Validation(
            "Source name cannot be empty".to_string(),
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "Source name must contain only ASCII letters, digits, '_' and '-', got '{}'",
            name
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
