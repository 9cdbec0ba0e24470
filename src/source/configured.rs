//! Sources declared in the configuration file

use super::{next_link_by_selector, ExtractionKind, FieldHint, FieldSpec, Schema, SourceDescriptor};
use crate::config::{FieldConfig, SchemaConfig, SourceConfig};
use crate::record::ListingItem;
use crate::{ConfigError, ConfigResult};

/// A source built from a `[[source]]` configuration entry
#[derive(Debug, Clone)]
pub struct ConfiguredSource {
    name: String,
    listing_urls: Vec<String>,
    listing: Schema,
    detail: Schema,
    next_page_selector: Option<String>,
    id_field: Option<String>,
}

impl ConfiguredSource {
    /// Builds a source from its configuration entry
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if a field uses an unknown
    /// extraction type or hint, or lacks a parameter its type requires.
    pub fn from_config(config: &SourceConfig) -> ConfigResult<Self> {
        let listing = schema_from_config(&config.name, "listing", &config.listing)?;
        let detail = schema_from_config(&config.name, "detail", &config.detail)?;

        Ok(Self {
            name: config.name.clone(),
            listing_urls: config.listing_urls.clone(),
            listing,
            detail,
            next_page_selector: config.next_page_selector.clone(),
            id_field: config.id_field.clone(),
        })
    }
}

impl SourceDescriptor for ConfiguredSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn listing_urls(&self) -> &[String] {
        &self.listing_urls
    }

    fn listing_schema(&self) -> &Schema {
        &self.listing
    }

    fn detail_schema(&self) -> &Schema {
        &self.detail
    }

    fn unique_id(&self, item: &ListingItem) -> Option<String> {
        match &self.id_field {
            Some(field) => item
                .get(field)
                .map(|value| value.to_plain_text().trim().to_string())
                .filter(|id| !id.is_empty()),
            None => item.detail_url.clone(),
        }
    }

    fn next_page_url(&self, page_body: &str, current_url: &str) -> Option<String> {
        let selector = self.next_page_selector.as_deref()?;
        next_link_by_selector(page_body, selector, current_url)
    }
}

fn schema_from_config(source: &str, role: &str, config: &SchemaConfig) -> ConfigResult<Schema> {
    let name = config
        .name
        .clone()
        .unwrap_or_else(|| format!("{}-{}", source, role));

    let mut schema = Schema::new(&name, &config.base_selector);
    for field in &config.fields {
        let spec = field_spec_from_config(field).map_err(|msg| {
            ConfigError::Validation(format!(
                "source '{}' {} field '{}': {}",
                source, role, field.name, msg
            ))
        })?;
        schema = schema.field(spec);
    }
    schema.date_field = config.date_field.clone();
    schema.url_field = config.url_field.clone();
    Ok(schema)
}

fn field_spec_from_config(config: &FieldConfig) -> Result<FieldSpec, String> {
    let kind = match config.kind.as_str() {
        "text" => ExtractionKind::Text,
        "attribute" => ExtractionKind::Attribute {
            attribute: config
                .attribute
                .clone()
                .ok_or_else(|| "type 'attribute' requires 'attribute'".to_string())?,
        },
        "html" => ExtractionKind::HtmlBlock,
        "text-list" => ExtractionKind::TextList,
        "keyword" => {
            if config.keywords.is_empty() {
                return Err("type 'keyword' requires a non-empty 'keywords' list".to_string());
            }
            ExtractionKind::KeywordFlag {
                keywords: config.keywords.clone(),
            }
        }
        "key-value-list" => ExtractionKind::KeyValueMap {
            label_selector: config
                .label_selector
                .clone()
                .unwrap_or_else(|| "strong".to_string()),
            value_selector: config
                .value_selector
                .clone()
                .unwrap_or_else(|| "span".to_string()),
        },
        "url-from-listing" => ExtractionKind::CopyFromListing,
        other => return Err(format!("unknown extraction type '{}'", other)),
    };

    let mut spec = FieldSpec::new(&config.name, config.selector.as_deref(), kind);

    if let Some(hint) = &config.hint {
        let hint = match hint.as_str() {
            "none" => None,
            other => Some(other.parse::<FieldHint>()?),
        };
        spec = spec.with_hint(hint);
    }

    if let Some(clean) = config.clean_html {
        spec = spec.with_clean_html(clean);
    }

    Ok(spec)
}
