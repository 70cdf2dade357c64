//! Statistics generation from the mirror database
//!
//! This module provides functionality for extracting and displaying
//! per-provider statistics from the storage layer.

use crate::model::Provider;
use crate::storage::{RunRecord, Storage, StorageResult};

/// Mirror statistics for one provider
#[derive(Debug, Clone)]
pub struct ProviderStatistics {
    pub provider: Provider,

    /// Number of stored files
    pub files: u64,

    /// Number of stored pools
    pub pools: u64,

    /// Most recent sync run, if there was one
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `providers` - Providers to report on, in output order
pub fn load_statistics(
    storage: &dyn Storage,
    providers: &[Provider],
) -> StorageResult<Vec<ProviderStatistics>> {
    providers
        .iter()
        .map(|provider| {
            Ok(ProviderStatistics {
                provider: *provider,
                files: storage.count_files(*provider)?,
                pools: storage.count_pools(*provider)?,
                latest_run: storage.get_latest_run(*provider)?,
            })
        })
        .collect()
}

/// Seconds between the start and end of a finished run
pub fn run_duration_seconds(run: &RunRecord) -> Option<i64> {
    let started = run.started_at.parse::<chrono::DateTime<chrono::Utc>>().ok()?;
    let finished = run
        .finished_at
        .as_deref()?
        .parse::<chrono::DateTime<chrono::Utc>>()
        .ok()?;
    Some((finished - started).num_seconds())
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &[ProviderStatistics]) {
    println!("=== Mirror Statistics ===\n");

    for entry in stats {
        println!("{}:", entry.provider);
        println!("  Files: {}", entry.files);
        if entry.provider == Provider::Inkbunny {
            println!("  Pools: {}", entry.pools);
        }

        match &entry.latest_run {
            Some(run) => {
                println!(
                    "  Latest run: #{} started {} ({})",
                    run.id,
                    run.started_at,
                    run.status.to_db_string()
                );
                if let Some(seconds) = run_duration_seconds(run) {
                    println!("  Duration: {}s", seconds);
                }
                println!("  Result: {}", run.summary);
            }
            None => println!("  Latest run: none"),
        }
        println!();
    }
}
