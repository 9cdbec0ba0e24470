//! Collaborators applied to resolved records
//!
//! This module provides:
//! - Category classification
//! - Location extraction
//! - HTML cleaning for free-text fields
//! - LLM enrichment of unresolved fields

mod classifier;
mod enrichment;
mod geo;
mod html_clean;

pub use classifier::{Category, Classifier, KeywordClassifier};
pub use enrichment::{parse_answer, Enricher, EnrichmentError, EnrichmentRequest, LlmEnricher};
pub use geo::{GeoExtractor, GeoLocator};
pub use html_clean::clean_html;
