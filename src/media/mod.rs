//! Media acquisition
//!
//! For each record the pipeline makes sure the asset is on disk, derives the
//! content hash, MIME type and dimensions from the stored bytes, and creates a
//! thumbnail. Every stage is skipped when its output already exists, so
//! running a record twice costs nothing but a hash.

mod detect;
mod download;
mod layout;
mod thumbnail;

pub use detect::{hash_file, inspect_file, sniff_mime, DetectedMedia};
pub use download::{download_to, DownloadProgress, LogProgress, ProgressObserver};
pub use layout::{sanitize_component, MediaLayout};
pub use thumbnail::{
    FfmpegFrameExtractor, FrameExtractor, MediaKind, ThumbnailError, ThumbnailOutcome, Thumbnailer,
    UnsupportedMediaError, THUMBNAIL_SIZE,
};

use crate::model::{MediaRecord, Provider};
use crate::transport::{RequestSpec, RetryTransport, TransportError};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that abort the media step of one file
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("download failed: {0}")]
    Download(#[from] TransportError),

    #[error("download of {url} interrupted: {source}")]
    Stream {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("download of {url} stalled for {after:?}")]
    Stalled { url: String, after: Duration },

    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no download URL for {file_name}")]
    MissingSource { file_name: String },

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AcquisitionError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A record after its media step
#[derive(Debug, Clone, PartialEq)]
pub struct Acquired {
    /// The input record with MIME type, dimensions and hash from the bytes
    pub record: MediaRecord,

    /// False when the file was already on disk
    pub downloaded: bool,

    pub thumbnail: ThumbnailOutcome,
}

/// Counts from a thumbnail backfill
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillSummary {
    pub created: usize,
    pub skipped: usize,
    pub unsupported: usize,
    pub failed: usize,
}

/// Downloads, inspects and thumbnails media records
#[derive(Clone)]
pub struct MediaPipeline {
    layout: MediaLayout,
    transport: RetryTransport,
    thumbnailer: Thumbnailer,
    observer: Option<Arc<dyn ProgressObserver>>,
    stall_timeout: Option<Duration>,
}

impl MediaPipeline {
    /// Creates a pipeline that extracts video frames with ffmpeg
    pub fn new(layout: MediaLayout, transport: RetryTransport) -> Self {
        Self {
            layout,
            transport,
            thumbnailer: Thumbnailer::new(Arc::new(FfmpegFrameExtractor)),
            observer: None,
            stall_timeout: None,
        }
    }

    pub fn with_frame_extractor(mut self, frames: Arc<dyn FrameExtractor>) -> Self {
        self.thumbnailer = Thumbnailer::new(frames);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Bounds every download that does not carry its own stall timeout
    pub fn with_stall_timeout(mut self, stall_timeout: Duration) -> Self {
        self.stall_timeout = Some(stall_timeout);
        self
    }

    pub fn layout(&self) -> &MediaLayout {
        &self.layout
    }

    /// Runs the media step for one record
    ///
    /// `request` fetches the asset; it is only needed when the file is not on
    /// disk yet.
    pub async fn acquire(
        &self,
        record: &MediaRecord,
        request: Option<RequestSpec>,
    ) -> Result<Acquired, AcquisitionError> {
        let destination =
            self.layout
                .media_path(record.provider, &record.username, &record.file_name);

        let downloaded = if destination.exists() {
            tracing::debug!("{} already exists, skipping download", destination.display());
            false
        } else {
            let mut request = request.ok_or_else(|| AcquisitionError::MissingSource {
                file_name: record.file_name.clone(),
            })?;
            if request.stall_timeout.is_none() {
                request.stall_timeout = self.stall_timeout;
            }
            if let Some(parent) = destination.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| AcquisitionError::io(parent, source))?;
            }
            download_to(
                &self.transport,
                &request,
                &destination,
                self.observer.as_deref(),
            )
            .await?;
            true
        };

        let inspected_path = destination.clone();
        let detected = tokio::task::spawn_blocking(move || inspect_file(&inspected_path))
            .await?
            .map_err(|source| AcquisitionError::io(&destination, source))?;

        let mut record = record.clone();
        if detected.mime_type.is_some() {
            record.mime_type = detected.mime_type;
        }
        if let Some((width, height)) = detected.dimensions {
            record.width = width;
            record.height = height;
        }
        if let Some(remote) = record.content_hash.as_deref() {
            if !remote.eq_ignore_ascii_case(&detected.content_hash) {
                tracing::warn!(
                    "Content hash of {} differs from the remote digest ({} != {})",
                    destination.display(),
                    detected.content_hash,
                    remote
                );
            }
        }
        record.content_hash = Some(detected.content_hash);

        let thumbnail = match record.mime_type.as_deref() {
            Some(mime_type) => {
                let relative = destination
                    .strip_prefix(self.layout.provider_dir(record.provider))
                    .unwrap_or(destination.as_path());
                let is_video = MediaKind::classify(mime_type) == Ok(MediaKind::Video);
                let target = self
                    .layout
                    .thumbnail_path(record.provider, relative, is_video);
                self.thumbnailer.create(&destination, &target, mime_type).await
            }
            None => ThumbnailOutcome::Unsupported,
        };

        Ok(Acquired {
            record,
            downloaded,
            thumbnail,
        })
    }

    /// Creates every missing thumbnail for a provider's media tree
    ///
    /// Up to `concurrency` files are processed at once.
    pub async fn rebuild_thumbnails(
        &self,
        provider: Provider,
        concurrency: usize,
    ) -> Result<BackfillSummary, AcquisitionError> {
        let root = self.layout.provider_dir(provider);
        if !root.exists() {
            tracing::info!("No media for {} at {}", provider, root.display());
            return Ok(BackfillSummary::default());
        }

        let walk_root = root.clone();
        let files = tokio::task::spawn_blocking(move || list_media_files(&walk_root))
            .await?
            .map_err(|source| AcquisitionError::io(&root, source))?;

        let total = files.len();
        let processed = AtomicUsize::new(0);
        tracing::info!("Checking {} thumbnails for {}", total, provider);

        let outcomes: Vec<ThumbnailOutcome> = stream::iter(files)
            .map(|relative| {
                let processed = &processed;
                let root = &root;
                async move {
                    let n = processed.fetch_add(1, Ordering::SeqCst) + 1;
                    tracing::info!("[{}/{}] {}", n, total, relative.display());
                    self.backfill_one(provider, root, &relative).await
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut summary = BackfillSummary::default();
        for outcome in outcomes {
            match outcome {
                ThumbnailOutcome::Created(_) => summary.created += 1,
                ThumbnailOutcome::AlreadyExists(_) => summary.skipped += 1,
                ThumbnailOutcome::Unsupported => summary.unsupported += 1,
                ThumbnailOutcome::Failed(_) => summary.failed += 1,
            }
        }
        Ok(summary)
    }

    async fn backfill_one(&self, provider: Provider, root: &Path, relative: &Path) -> ThumbnailOutcome {
        let source = root.join(relative);
        let sniff_path = source.clone();
        let mime_type = match tokio::task::spawn_blocking(move || inspect_file(&sniff_path)).await {
            Ok(Ok(detected)) => detected.mime_type,
            Ok(Err(e)) => return ThumbnailOutcome::Failed(e.to_string()),
            Err(e) => return ThumbnailOutcome::Failed(e.to_string()),
        };

        let Some(mime_type) = mime_type else {
            return ThumbnailOutcome::Unsupported;
        };

        let is_video = MediaKind::classify(&mime_type) == Ok(MediaKind::Video);
        let target = self.layout.thumbnail_path(provider, relative, is_video);
        self.thumbnailer.create(&source, &target, &mime_type).await
    }
}

/// Lists files below `root` as relative paths, leaving out partial downloads
fn list_media_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().map_or(false, |e| e == "part") {
                continue;
            } else if let Ok(relative) = path.strip_prefix(root) {
                files.push(relative.to_path_buf());
            }
        }
    }

    files.sort();
    Ok(files)
}
