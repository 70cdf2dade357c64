//! Console reports
//!
//! This module handles:
//! - Printing the summary of a finished sync run
//! - Printing thumbnail backfill results
//! - Per-provider statistics from the database (`stats`)

pub mod stats;

pub use stats::{load_statistics, print_statistics, ProviderStatistics};

use crate::media::BackfillSummary;
use crate::model::Provider;
use crate::sync::RunSummary;

/// Prints the result of a sync run to stdout
pub fn print_run_summary(provider: Provider, summary: &RunSummary) {
    println!("=== Sync Summary: {} ===\n", provider);
    println!("  New:        {}", summary.new);
    println!("  Duplicate:  {}", summary.duplicate);
    println!("  Not found:  {}", summary.not_found);
    println!("  Failed:     {}", summary.failed);
    println!("  Pages:      {}", summary.pages_fetched);
    if let Some(reason) = summary.stop_reason {
        println!("  Stopped:    {}", reason);
    }
}

/// Prints thumbnail backfill results to stdout
pub fn print_backfill_summary(results: &[(Provider, BackfillSummary)]) {
    println!("=== Thumbnails ===\n");
    for (provider, summary) in results {
        println!(
            "  {}: {} created, {} already present, {} unsupported, {} failed",
            provider, summary.created, summary.skipped, summary.unsupported, summary.failed
        );
    }
}
