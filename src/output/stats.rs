//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::record::Provenance;
use crate::storage::{CycleRecord, HarvestQuery, StorageResult};
use std::collections::BTreeMap;

/// Harvest statistics summary
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestStatistics {
    /// Total number of stored offers
    pub total_offers: u64,

    /// Offer counts per source
    pub offers_by_source: Vec<(String, u64)>,

    /// Offer counts per category
    pub offers_by_category: Vec<(String, u64)>,

    /// Field values per provenance tag
    pub provenance: BTreeMap<Provenance, u64>,

    /// Most recent cycle of every source
    pub latest_cycles: Vec<CycleRecord>,
}

impl HarvestStatistics {
    /// Share of field values resolved by any stage, as a percentage
    pub fn resolution_rate(&self) -> f64 {
        let total: u64 = self.provenance.values().sum();
        if total == 0 {
            return 0.0;
        }
        let unresolved = self
            .provenance
            .get(&Provenance::Unresolved)
            .copied()
            .unwrap_or(0);
        ((total - unresolved) as f64 / total as f64) * 100.0
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn HarvestQuery) -> StorageResult<HarvestStatistics> {
    Ok(HarvestStatistics {
        total_offers: storage.count_offers()?,
        offers_by_source: storage.offers_by_source()?,
        offers_by_category: storage.offers_by_category()?,
        provenance: storage.provenance_distribution()?,
        latest_cycles: storage.latest_cycles()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Total offers: {}", stats.total_offers);
    println!();

    if !stats.offers_by_source.is_empty() {
        println!("Offers by Source:");
        for (source, count) in &stats.offers_by_source {
            println!("  {}: {}", source, count);
        }
        println!();
    }

    if !stats.offers_by_category.is_empty() {
        println!("Offers by Category:");
        let mut counts: Vec<_> = stats.offers_by_category.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        for (category, count) in counts {
            println!("  {}: {}", category, count);
        }
        println!();
    }

    let total_values: u64 = stats.provenance.values().sum();
    if total_values > 0 {
        println!("Field Provenance:");
        for (tag, count) in &stats.provenance {
            let percentage = (*count as f64 / total_values as f64) * 100.0;
            println!("  {}: {} ({:.1}%)", tag, count, percentage);
        }
        println!();
    }

    if !stats.latest_cycles.is_empty() {
        println!("Latest Cycles:");
        for cycle in &stats.latest_cycles {
            println!(
                "  {} [{}] {}: {} exported, {} expired, {} errors",
                cycle.source,
                cycle.status.to_db_string(),
                cycle.finished_at.format("%Y-%m-%d %H:%M"),
                cycle.exported,
                cycle.expired,
                cycle.errors
            );
        }
        println!();
    }

    println!("Resolution Rate: {:.1}%", stats.resolution_rate());
}
