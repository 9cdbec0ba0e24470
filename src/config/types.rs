use serde::Deserialize;

/// Main configuration structure for the harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub enrichment: Option<EnrichmentConfig>,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
}

/// Crawl cycle configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Oldest posting age (in days) still worth exporting
    #[serde(rename = "max-age-days", default = "default_max_age_days")]
    pub max_age_days: u32,

    /// Per-request timeout for listing and detail fetches (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Number of sources crawled at the same time
    #[serde(rename = "max-concurrent-sources", default = "default_max_concurrent_sources")]
    pub max_concurrent_sources: usize,

    /// Sources to crawl; empty means every registered source
    #[serde(rename = "enabled-sources", default)]
    pub enabled_sources: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_age_days: default_max_age_days(),
            request_timeout_secs: default_request_timeout(),
            max_concurrent_sources: default_max_concurrent_sources(),
            enabled_sources: Vec::new(),
        }
    }
}

fn default_max_age_days() -> u32 {
    7
}

fn default_request_timeout() -> u64 {
    60
}

fn default_max_concurrent_sources() -> usize {
    4
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database holding state, offers and cycle history
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Values commonly left in example environments instead of a real key
const PLACEHOLDER_KEYS: &[&str] = &[
    "DEMO_MODE_PLACEHOLDER",
    "your_api_key_here",
    "your_gemini_api_key_here",
    "changeme",
];

/// Optional language-model enrichment
#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`)
    pub endpoint: String,

    /// Model name sent with each request
    pub model: String,

    /// Environment variable holding the API key
    #[serde(rename = "api-key-env", default = "default_api_key_env")]
    pub api_key_env: String,

    /// Upper bound on one enrichment call (seconds)
    #[serde(rename = "timeout-secs", default = "default_enrichment_timeout")]
    pub timeout_secs: u64,
}

impl EnrichmentConfig {
    /// Reads the API key from the environment
    ///
    /// Returns `None` when the variable is unset, blank or holds a
    /// placeholder, which disables enrichment for the run.
    pub fn api_key(&self) -> Option<String> {
        let key = std::env::var(&self.api_key_env).ok()?;
        let key = key.trim();
        if key.is_empty() || PLACEHOLDER_KEYS.contains(&key) {
            None
        } else {
            Some(key.to_string())
        }
    }
}

fn default_api_key_env() -> String {
    "ENRICHMENT_API_KEY".to_string()
}

fn default_enrichment_timeout() -> u64 {
    30
}

/// A declarative source (`[[source]]`)
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Unique source name
    pub name: String,

    /// Listing entry points, crawled in order
    #[serde(rename = "listing-urls")]
    pub listing_urls: Vec<String>,

    pub listing: SchemaConfig,

    pub detail: SchemaConfig,

    /// Selector of the "next page" link on listing pages
    #[serde(rename = "next-page-selector", default)]
    pub next_page_selector: Option<String>,

    /// Listing field used as the item identifier (default: detail URL)
    #[serde(rename = "id-field", default)]
    pub id_field: Option<String>,
}

/// A listing or detail schema
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(rename = "base-selector")]
    pub base_selector: String,

    #[serde(rename = "date-field", default)]
    pub date_field: Option<String>,

    #[serde(rename = "url-field", default)]
    pub url_field: Option<String>,

    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

/// One field of a schema
#[derive(Debug, Clone, Deserialize)]
pub struct FieldConfig {
    pub name: String,

    #[serde(default)]
    pub selector: Option<String>,

    /// Extraction type: text, attribute, html, text-list, keyword,
    /// key-value-list or url-from-listing
    #[serde(rename = "type", default = "default_field_type")]
    pub kind: String,

    #[serde(default)]
    pub attribute: Option<String>,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(rename = "label-selector", default)]
    pub label_selector: Option<String>,

    #[serde(rename = "value-selector", default)]
    pub value_selector: Option<String>,

    /// Overrides the hint inferred from the field name ("none" disables it)
    #[serde(default)]
    pub hint: Option<String>,

    #[serde(rename = "clean-html", default)]
    pub clean_html: Option<bool>,
}

fn default_field_type() -> String {
    "text".to_string()
}

impl FieldConfig {
    pub fn new(name: &str, selector: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            selector: Some(selector.to_string()),
            kind: kind.to_string(),
            attribute: None,
            keywords: Vec::new(),
            label_selector: None,
            value_selector: None,
            hint: None,
            clean_html: None,
        }
    }

    pub fn with_attribute(mut self, attribute: &str) -> Self {
        self.attribute = Some(attribute.to_string());
        self
    }

    pub fn with_hint(mut self, hint: &str) -> Self {
        self.hint = Some(hint.to_string());
        self
    }
}
