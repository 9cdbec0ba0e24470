//! The resolution cascade
//!
//! Every declared field of a detail schema is resolved by trying, in order:
//!
//! 1. the structural selector (or the listing value for `CopyFromListing`)
//! 2. the same-named listing value
//! 3. the hint's patterns, over the nearest ancestor block, then the page
//! 4. the hint's heuristic, over the offer's free text
//!
//! The first non-empty value wins and is tagged with the stage that produced
//! it. Whatever is still unresolved may then be handed to an [`Enricher`].

use super::heuristic::infer;
use super::pattern::PatternSet;
use super::structural::{ancestor_prefixes, block_text, extract_field, parse_selector};
use crate::collab::{clean_html, Enricher, EnrichmentRequest};
use crate::record::{DetailRecord, FieldValue, ListingItem, Provenance};
use crate::source::{ExtractionKind, FieldHint, FieldSpec, Schema, SourceDescriptor};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on the text sent to the enrichment collaborator (chars)
const MAX_CONTEXT_CHARS: usize = 8000;

/// A parsed detail page
pub struct DetailDocument {
    html: Html,
    base: Option<Selector>,
    text: String,
}

impl DetailDocument {
    /// Parses a detail page against the schema's base selector
    pub fn parse(body: &str, schema: &Schema) -> Self {
        let html = Html::parse_document(body);
        let base = parse_selector(&schema.base_selector);
        let text = block_text(html.root_element());
        Self { html, base, text }
    }

    /// The element fields are extracted from
    ///
    /// The first match of the base selector, or the whole document when the
    /// selector is unusable or matches nothing.
    pub fn root(&self) -> ElementRef<'_> {
        self.base
            .as_ref()
            .and_then(|base| self.html.select(base).next())
            .unwrap_or_else(|| self.html.root_element())
    }

    /// Visible text of the whole document, one line per text node
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text of the nearest existing ancestor block of the field's selector
    pub fn block_text_for(&self, spec: &FieldSpec) -> Option<String> {
        let selector = spec.scoped_selector()?;
        let root = self.root();
        ancestor_prefixes(selector).iter().find_map(|prefix| {
            let ancestor = parse_selector(prefix)?;
            root.select(&ancestor).next().map(block_text)
        })
    }
}

/// Free text the heuristic and enrichment stages work from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionContext {
    /// Cleaned description/profile text of the offer
    pub free_text: String,
}

impl ResolutionContext {
    /// Collects the free-text fields of the detail page and the listing item
    ///
    /// Detail fields hinted as free text are extracted and cleaned; listing
    /// free-text fields fill in for the ones the page lacks.
    pub fn build(schema: &Schema, listing: &ListingItem, document: &DetailDocument) -> Self {
        let mut parts: Vec<String> = Vec::new();

        for spec in schema.fields_with_hint(FieldHint::FreeText) {
            let value = extract_field(spec, document.root()).or_else(|| listing.get(&spec.name).cloned());
            if let Some(value) = value {
                parts.push(clean_html(&value.to_plain_text()));
            }
        }
        for (name, value) in &listing.fields {
            if schema.get(name).is_none()
                && FieldHint::from_field_name(name) == Some(FieldHint::FreeText)
            {
                parts.push(clean_html(&value.to_plain_text()));
            }
        }

        parts.retain(|p| !p.is_empty());
        Self {
            free_text: parts.join("\n"),
        }
    }

    /// The free text, or `fallback` when the offer has none
    pub fn text_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        if self.free_text.trim().is_empty() {
            fallback
        } else {
            &self.free_text
        }
    }
}

/// Output of [`FieldResolver::resolve_detail`]
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDetail {
    pub record: DetailRecord,

    /// Offer text for the collaborators (free text, else page text)
    pub text: String,
}

/// Outcome of the enrichment stage for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentOutcome {
    /// Nothing was unresolved
    Skipped,

    /// The collaborator answered; number of fields it filled
    Filled(usize),

    /// The collaborator failed or answered garbage
    Failed,

    /// The collaborator did not answer in time
    TimedOut,
}

/// Runs the cascade over detail documents
#[derive(Debug, Default)]
pub struct FieldResolver {
    patterns: PatternSet,
}

impl FieldResolver {
    pub fn new() -> Self {
        Self {
            patterns: PatternSet::new(),
        }
    }

    /// Uses a custom pattern table
    pub fn with_patterns(patterns: PatternSet) -> Self {
        Self { patterns }
    }

    /// Resolves one field
    ///
    /// # Arguments
    ///
    /// * `spec` - The field declaration
    /// * `listing` - The listing item the detail page was reached from
    /// * `document` - The parsed detail page
    /// * `context` - Free text for the heuristic stage
    ///
    /// # Returns
    ///
    /// The value and the stage that produced it, or `(None, Unresolved)`.
    pub fn resolve(
        &self,
        spec: &FieldSpec,
        listing: &ListingItem,
        document: &DetailDocument,
        context: &ResolutionContext,
    ) -> (Option<FieldValue>, Provenance) {
        let structural = match &spec.kind {
            ExtractionKind::CopyFromListing => listing
                .get(&spec.name)
                .cloned()
                .or_else(|| listing.detail_url.clone().map(FieldValue::Text)),
            _ => extract_field(spec, document.root()),
        };
        if let Some(value) = structural.and_then(FieldValue::non_empty) {
            return (Some(value), Provenance::Structural);
        }

        if let Some(value) = listing.get(&spec.name).cloned().and_then(FieldValue::non_empty) {
            return (Some(value), Provenance::Structural);
        }

        let Some(hint) = spec.hint else {
            return (None, Provenance::Unresolved);
        };

        if self.patterns.covers(hint) {
            let found = document
                .block_text_for(spec)
                .and_then(|block| self.patterns.find(hint, &block))
                .or_else(|| self.patterns.find(hint, document.text()));
            if let Some(value) = found {
                debug!("Field '{}' resolved by pattern", spec.name);
                return (Some(value), Provenance::Pattern);
            }
        }

        if let Some(value) = infer(hint, context.text_or(document.text())) {
            debug!("Field '{}' resolved by heuristic", spec.name);
            return (Some(value), Provenance::Heuristic);
        }

        (None, Provenance::Unresolved)
    }

    /// Builds a detail record from a listing item and its detail page
    ///
    /// Every detail-schema field gets a value slot and a provenance tag.
    /// Listing fields the detail schema does not declare are carried over as
    /// structural values, so the record covers both schemas.
    pub fn resolve_detail(
        &self,
        source: &dyn SourceDescriptor,
        unique_id: &str,
        listing: &ListingItem,
        body: &str,
    ) -> ResolvedDetail {
        let schema = source.detail_schema();
        let document = DetailDocument::parse(body, schema);
        let context = ResolutionContext::build(schema, listing, &document);

        let mut record = DetailRecord::new(source.name(), unique_id, listing.detail_url.clone());
        for spec in &schema.fields {
            let (value, provenance) = self.resolve(spec, listing, &document, &context);
            record.set(&spec.name, value, provenance);
        }

        for spec in &source.listing_schema().fields {
            if schema.get(&spec.name).is_none() {
                record.set(&spec.name, listing.get(&spec.name).cloned(), Provenance::Structural);
            }
        }

        let text = context.text_or(document.text()).to_string();
        ResolvedDetail { record, text }
    }
}

/// Asks the enricher to fill the record's unresolved fields
///
/// Only fields tagged unresolved are sent and only non-empty answers for
/// them are accepted. On failure or timeout the record is left untouched.
pub async fn apply_enrichment(
    record: &mut DetailRecord,
    enricher: &dyn Enricher,
    timeout: Duration,
    context: &str,
) -> EnrichmentOutcome {
    let unresolved = record.unresolved_fields();
    if unresolved.is_empty() {
        return EnrichmentOutcome::Skipped;
    }

    let known = record
        .fields
        .iter()
        .filter(|(name, _)| FieldHint::from_field_name(name) != Some(FieldHint::FreeText))
        .filter_map(|(name, value)| value.clone().map(|v| (name.clone(), v)))
        .collect();
    let request = EnrichmentRequest {
        source: record.source.clone(),
        known,
        unresolved,
        context: context.chars().take(MAX_CONTEXT_CHARS).collect(),
    };

    match tokio::time::timeout(timeout, enricher.enrich(&request)).await {
        Err(_) => {
            warn!(
                "Enrichment of {} timed out after {:?}",
                record.unique_id, timeout
            );
            EnrichmentOutcome::TimedOut
        }
        Ok(Err(e)) => {
            warn!("Enrichment of {} failed: {}", record.unique_id, e);
            EnrichmentOutcome::Failed
        }
        Ok(Ok(answers)) => {
            let mut filled = 0;
            for name in &request.unresolved {
                if let Some(value) = answers.get(name).cloned().and_then(FieldValue::non_empty) {
                    record.set(name, Some(value), Provenance::Enrichment);
                    filled += 1;
                }
            }
            debug!("Enrichment filled {} fields of {}", filled, record.unique_id);
            EnrichmentOutcome::Filled(filled)
        }
    }
}
