use crate::config::SyncConfig;
use crate::crawler::{CrawlEnd, ListingCrawler, ListingSource};
use crate::extractor::{Extraction, ItemExtractor};
use crate::media::MediaPipeline;
use crate::model::{ItemId, MediaRecord, PoolRecord, Submission};
use crate::storage::Storage;
use crate::sync::governor::{DuplicateGovernor, ItemOutcome};
use crate::sync::summary::{RunSummary, StopReason};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Run-loop limits
#[derive(Debug, Clone, Copy)]
pub struct RunnerSettings {
    pub max_dup_count: u32,
    pub item_delay: Duration,
}

impl From<&SyncConfig> for RunnerSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            max_dup_count: config.max_dup_count,
            item_delay: config.item_delay(),
        }
    }
}

/// Drives one provider's sync: listing, extraction, media, persistence
///
/// Items are handled strictly one after another. No per-item error ends the
/// run; it is logged and counted as `Failed`.
pub struct SyncRunner<'a, E: ?Sized, S: ?Sized> {
    extractor: &'a E,
    pipeline: &'a MediaPipeline,
    storage: &'a mut S,
    settings: RunnerSettings,
    cancel: Arc<AtomicBool>,
}

impl<'a, E, S> SyncRunner<'a, E, S>
where
    E: ItemExtractor + ?Sized,
    S: Storage + ?Sized,
{
    pub fn new(
        extractor: &'a E,
        pipeline: &'a MediaPipeline,
        storage: &'a mut S,
        settings: RunnerSettings,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            extractor,
            pipeline,
            storage,
            settings,
            cancel,
        }
    }

    /// Processes listing entries until a stop condition is reached
    pub async fn run<L: ListingSource>(&mut self, crawler: &mut ListingCrawler<L>) -> RunSummary {
        let mut governor = DuplicateGovernor::new(self.settings.max_dup_count);
        let mut summary = RunSummary::default();
        let mut first = true;

        let stop_reason = loop {
            if self.cancel.load(Ordering::SeqCst) {
                tracing::info!("Cancellation requested, stopping before the next item");
                break StopReason::Cancelled;
            }
            if governor.is_exhausted() {
                tracing::info!(
                    "{} known items in a row, everything older is mirrored",
                    self.settings.max_dup_count
                );
                break StopReason::DuplicateBudget;
            }

            let Some(id) = crawler.next_id().await else {
                break match crawler.end() {
                    Some(CrawlEnd::PageFailures) => StopReason::PageFailures,
                    _ => StopReason::ListingExhausted,
                };
            };

            if !first && !self.settings.item_delay.is_zero() {
                tokio::time::sleep(self.settings.item_delay).await;
            }
            first = false;

            let outcome = self.process_item(&id).await;
            governor.observe(outcome);
            match outcome {
                ItemOutcome::New => summary.new += 1,
                ItemOutcome::Duplicate => summary.duplicate += 1,
                ItemOutcome::NotFound => summary.not_found += 1,
                ItemOutcome::Failed => summary.failed += 1,
            }
            tracing::debug!("Duplicate budget left: {}", governor.remaining());
        };

        summary.pages_fetched = crawler.pages_fetched();
        summary.stop_reason = Some(stop_reason);
        summary
    }

    async fn process_item(&mut self, id: &ItemId) -> ItemOutcome {
        match self.extractor.extract(id).await {
            Ok(Extraction::Found(submission)) => self.store_submission(id, submission).await,
            Ok(Extraction::NotFound) => {
                tracing::info!("#{} not found", id);
                ItemOutcome::NotFound
            }
            Err(e) => {
                tracing::warn!("Failed to fetch #{}: {}", id, e);
                ItemOutcome::Failed
            }
        }
    }

    /// Acquires media for every file and commits what was acquired
    ///
    /// The outcome is `New` only when the submission was not stored before and
    /// at least one file had to be downloaded.
    async fn store_submission(&mut self, id: &ItemId, submission: Submission) -> ItemOutcome {
        let provider = self.extractor.provider();
        let known = match self
            .storage
            .submission_exists(provider, submission.submission_id)
        {
            Ok(known) => known,
            Err(e) => {
                tracing::warn!("Failed to look up #{}: {}", id, e);
                return ItemOutcome::Failed;
            }
        };

        let mut files: Vec<MediaRecord> = Vec::with_capacity(submission.files.len());
        let mut downloaded_any = false;
        for record in &submission.files {
            let request = record
                .source_url
                .as_deref()
                .map(|url| self.extractor.asset_request(url));

            match self.pipeline.acquire(record, request).await {
                Ok(acquired) => {
                    downloaded_any |= acquired.downloaded;
                    files.push(acquired.record);
                }
                Err(e) => {
                    tracing::warn!("Failed to acquire {} of #{}: {}", record.file_name, id, e);
                }
            }
        }

        if files.is_empty() {
            tracing::warn!("No file of #{} could be acquired", id);
            return ItemOutcome::Failed;
        }

        let acquired_ids: BTreeSet<i64> = files.iter().map(|f| f.file_id).collect();
        let pools: Vec<PoolRecord> = submission
            .pools
            .into_iter()
            .map(|mut pool| {
                pool.files.retain(|file_id| acquired_ids.contains(file_id));
                pool
            })
            .collect();

        if let Err(e) = self.storage.commit_submission(&files, &pools) {
            tracing::warn!("Failed to store #{}: {}", id, e);
            return ItemOutcome::Failed;
        }

        let outcome = if known || !downloaded_any {
            ItemOutcome::Duplicate
        } else {
            ItemOutcome::New
        };
        tracing::info!(
            "#{} {} ({} of {} files)",
            id,
            match outcome {
                ItemOutcome::New => "stored",
                _ => "already mirrored",
            },
            files.len(),
            submission.files.len()
        );
        outcome
    }
}
