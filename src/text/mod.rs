//! Text helpers shared by the extractors and collaborators
//!
//! This module provides:
//! - Whitespace collapsing and accent folding
//! - Loose date parsing (ISO, numeric and French long forms)
//! - Link resolution and normalization for detail-page identifiers

mod dates;
mod links;
mod normalize;

pub use dates::{find_date_token, parse_date_loose, parse_french_long_date, to_iso};
pub use links::{normalize_link, resolve_link};
pub use normalize::{collapse_whitespace, contains_word, count_word, fold_accents};
