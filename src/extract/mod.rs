//! Field extraction
//!
//! This module implements the extraction cascade:
//! - Structural: selector-driven extraction from the parsed document
//! - Pattern: field-specific regular expressions over block text
//! - Heuristic: keyword inference over the offer's free text
//! - Enrichment: an optional external collaborator for what is left
//!
//! Parsed documents (`scraper::Html`) are not `Send`, so everything up to
//! the enrichment stage runs synchronously and returns owned values.

mod cascade;
mod heuristic;
mod pattern;
mod structural;

pub use cascade::{
    apply_enrichment, DetailDocument, EnrichmentOutcome, FieldResolver, ResolutionContext,
    ResolvedDetail,
};
pub use heuristic::infer;
pub use pattern::PatternSet;
pub use structural::{ancestor_prefixes, block_text, element_text, extract_field, parse_listing, parse_selector};
