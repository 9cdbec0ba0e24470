//! Output module for run summaries and harvest statistics
//!
//! This module handles:
//! - Summarizing the outcome of one harvest run
//! - Reading aggregate statistics back from the database

pub mod stats;

pub use stats::{load_statistics, print_statistics, HarvestStatistics};

use crate::crawler::{SchedulerReport, SourceOutcome};
use std::fmt::Write;

/// Renders a plain-text summary of one harvest run
///
/// One line per source, then the totals.
///
/// # Arguments
///
/// * `report` - The scheduler's report for the run
pub fn format_run_summary(report: &SchedulerReport) -> String {
    let mut out = String::from("=== Harvest Summary ===\n\n");

    for outcome in &report.outcomes {
        // Writing into a String cannot fail
        let _ = match outcome {
            SourceOutcome::Completed(cycle) => writeln!(
                out,
                "  {}: {} page(s), {} exported, {} expired, {} error(s), {} newly seen",
                cycle.source,
                cycle.pages_visited,
                cycle.exported,
                cycle.expired,
                cycle.errors,
                cycle.seen_added
            ),
            SourceOutcome::Failed { source, error } => {
                writeln!(out, "  {}: FAILED ({})", source, error)
            }
        };
    }

    let failed = report.failed_sources();
    let _ = write!(
        out,
        "\nTotal: {} exported, {} error(s), {} failed source(s)\n",
        report.total_exported(),
        report.total_errors(),
        failed.len()
    );
    out
}

/// Prints the run summary to stdout
pub fn print_run_summary(report: &SchedulerReport) {
    print!("{}", format_run_summary(report));
}
