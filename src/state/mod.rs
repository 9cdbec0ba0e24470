//! Crawl state and the per-cycle cutoff
//!
//! # Components
//!
//! - `CrawlState`: per-source seen identifiers and last-run timestamp
//! - `CutoffPolicy`: the date boundary derived from that state once per cycle

mod crawl_state;
mod cutoff;

pub use crawl_state::CrawlState;
pub use cutoff::CutoffPolicy;
