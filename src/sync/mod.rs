//! Incremental sync
//!
//! Ties the pieces together for one provider: the listing crawler yields ids,
//! the provider's extractor turns them into submissions, the media pipeline
//! fetches the files and storage commits the result. A duplicate governor ends
//! the run once it keeps running into items that are already mirrored.

mod governor;
mod runner;
mod summary;

pub use governor::{DuplicateGovernor, ItemOutcome};
pub use runner::{RunnerSettings, SyncRunner};
pub use summary::{RunSummary, StopReason};

use crate::config::Config;
use crate::crawler::{CrawlerSettings, ListingCrawler, ListingSource};
use crate::extractor::ItemExtractor;
use crate::media::{BackfillSummary, LogProgress, MediaLayout, MediaPipeline};
use crate::model::Provider;
use crate::providers::{FurAffinity, Inkbunny};
use crate::storage::{open_storage, RunStatus, Storage};
use crate::transport::{build_http_client, RetryPolicy, RetryTransport};
use crate::SyncError;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Runs one incremental sync of a provider's favorites
///
/// Setup failures (database, HTTP client, login) are returned as errors.
/// Once the run has started, item failures only show up in the summary.
///
/// # Arguments
///
/// * `config` - Loaded configuration
/// * `provider` - Which site to sync; it must have a config section
/// * `config_hash` - Stored with the run record
/// * `cancel` - Set from outside to stop between two items
pub async fn run_sync(
    config: &Config,
    provider: Provider,
    config_hash: &str,
    cancel: Arc<AtomicBool>,
) -> Result<RunSummary, SyncError> {
    let mut storage = open_storage(&config.database.path)?;
    let client = build_http_client(&config.http)?;
    let layout = MediaLayout::new(&config.files.dir);

    match provider {
        Provider::FurAffinity => {
            let site = config
                .furaffinity
                .as_ref()
                .ok_or(SyncError::ProviderNotConfigured(provider))?;
            let source = FurAffinity::new(site, &config.http, client.clone())?;
            let downloads = RetryTransport::new(client, site.download_retry.policy());
            let pipeline = MediaPipeline::new(layout, downloads)
                .with_observer(Arc::new(LogProgress))
                .with_stall_timeout(config.http.download_stall());
            sync_provider(source, &pipeline, &mut storage, config, config_hash, cancel).await
        }
        Provider::Inkbunny => {
            let site = config
                .inkbunny
                .as_ref()
                .ok_or(SyncError::ProviderNotConfigured(provider))?;
            let source = Inkbunny::connect(site, &config.http, client.clone()).await?;
            let downloads = RetryTransport::new(client, site.download_retry.policy());
            let pipeline = MediaPipeline::new(layout, downloads)
                .with_observer(Arc::new(LogProgress))
                .with_stall_timeout(config.http.download_stall());
            sync_provider(source, &pipeline, &mut storage, config, config_hash, cancel).await
        }
    }
}

/// Runs the sync loop with an already built provider
///
/// Creates the run record before the first item and closes it with the
/// summary afterwards.
pub async fn sync_provider<P, S>(
    source: P,
    pipeline: &MediaPipeline,
    storage: &mut S,
    config: &Config,
    config_hash: &str,
    cancel: Arc<AtomicBool>,
) -> Result<RunSummary, SyncError>
where
    P: ListingSource + ItemExtractor + Clone,
    S: Storage,
{
    let provider = source.provider();
    let run_id = storage.create_run(provider, config_hash)?;
    tracing::info!("Starting sync run {} for {}", run_id, provider);

    let crawler_settings = CrawlerSettings {
        max_page_failures: config.sync.max_page_failures,
        page_retry_delay: config.sync.page_retry_delay(),
    };
    let mut crawler = ListingCrawler::new(source.clone(), crawler_settings);

    let summary = SyncRunner::new(
        &source,
        pipeline,
        storage,
        RunnerSettings::from(&config.sync),
        cancel,
    )
    .run(&mut crawler)
    .await;

    let status = match summary.stop_reason {
        Some(StopReason::Cancelled) => RunStatus::Interrupted,
        Some(StopReason::PageFailures) => RunStatus::Failed,
        _ => RunStatus::Completed,
    };
    storage.finish_run(run_id, status, &summary)?;

    tracing::info!("Sync of {} finished: {}", provider, summary);
    Ok(summary)
}

/// Creates missing thumbnails for the given providers' media trees
pub async fn rebuild_thumbnails(
    config: &Config,
    providers: &[Provider],
) -> Result<Vec<(Provider, BackfillSummary)>, SyncError> {
    let client = build_http_client(&config.http)?;
    let pipeline = MediaPipeline::new(
        MediaLayout::new(&config.files.dir),
        RetryTransport::new(client, RetryPolicy::once()),
    );

    let mut results = Vec::with_capacity(providers.len());
    for provider in providers {
        let summary = pipeline
            .rebuild_thumbnails(*provider, config.sync.media_concurrency)
            .await?;
        tracing::info!(
            "Thumbnails for {}: {} created, {} present, {} unsupported, {} failed",
            provider,
            summary.created,
            summary.skipped,
            summary.unsupported,
            summary.failed
        );
        results.push((*provider, summary));
    }
    Ok(results)
}
