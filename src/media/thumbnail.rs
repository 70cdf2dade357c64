//! Thumbnail generation
//!
//! Stills are decoded with the `image` crate. Videos are reduced to a single
//! frame from the middle of the clip by a `FrameExtractor`, which by default
//! shells out to `ffprobe`/`ffmpeg`. Anything else is unsupported.

use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

/// Thumbnails fit inside a square of this many pixels
pub const THUMBNAIL_SIZE: u32 = 120;

/// The MIME type has no thumbnail strategy
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("no thumbnail support for {mime_type}")]
pub struct UnsupportedMediaError {
    pub mime_type: String,
}

/// Errors while creating a single thumbnail
#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error(transparent)]
    Unsupported(#[from] UnsupportedMediaError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame extraction failed: {0}")]
    Frame(String),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result of a thumbnail step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailOutcome {
    Created(PathBuf),
    AlreadyExists(PathBuf),
    Unsupported,
    Failed(String),
}

/// How a MIME type is thumbnailed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Still,
    Video,
}

impl MediaKind {
    pub fn classify(mime_type: &str) -> Result<Self, UnsupportedMediaError> {
        match mime_type {
            "image/png" | "image/jpeg" | "image/gif" | "image/webp" | "image/bmp"
            | "image/tiff" | "image/x-icon" | "image/vnd.microsoft.icon" => Ok(Self::Still),
            m if m.starts_with("video/") => Ok(Self::Video),
            m => Err(UnsupportedMediaError {
                mime_type: m.to_string(),
            }),
        }
    }
}

/// Pulls one representative frame out of a video
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Returns the frame encoded as PNG
    async fn extract_frame(&self, video: &Path) -> Result<Vec<u8>, ThumbnailError>;
}

/// Frame extraction through the `ffprobe` and `ffmpeg` binaries on `PATH`
#[derive(Debug, Clone, Default)]
pub struct FfmpegFrameExtractor;

impl FfmpegFrameExtractor {
    async fn duration_secs(&self, video: &Path) -> Result<f64, ThumbnailError> {
        let output = Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(video)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ThumbnailError::Frame(format!(
                "ffprobe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        text.trim()
            .parse::<f64>()
            .map_err(|_| ThumbnailError::Frame(format!("unreadable duration {:?}", text.trim())))
    }
}

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    async fn extract_frame(&self, video: &Path) -> Result<Vec<u8>, ThumbnailError> {
        let midpoint = self.duration_secs(video).await? / 2.0;

        let output = Command::new("ffmpeg")
            .args(["-v", "error", "-ss", &format!("{:.3}", midpoint), "-i"])
            .arg(video)
            .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "-"])
            .output()
            .await?;

        if !output.status.success() || output.stdout.is_empty() {
            return Err(ThumbnailError::Frame(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(output.stdout)
    }
}

/// Computes the size that fits `width` x `height` into `max` x `max`
///
/// Aspect ratio is kept and images are never enlarged.
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }

    let scale = f64::min(max as f64 / width as f64, max as f64 / height as f64);
    let fit = |v: u32| ((v as f64 * scale).round() as u32).max(1);
    (fit(width), fit(height))
}

/// Creates thumbnails, skipping ones that already exist
#[derive(Clone)]
pub struct Thumbnailer {
    frames: std::sync::Arc<dyn FrameExtractor>,
}

impl Thumbnailer {
    pub fn new(frames: std::sync::Arc<dyn FrameExtractor>) -> Self {
        Self { frames }
    }

    /// Creates the thumbnail for `source` at `target`
    ///
    /// Failures are reported in the outcome, never as an error.
    pub async fn create(&self, source: &Path, target: &Path, mime_type: &str) -> ThumbnailOutcome {
        if target.exists() {
            tracing::debug!("Thumbnail {} already exists", target.display());
            return ThumbnailOutcome::AlreadyExists(target.to_path_buf());
        }

        match self.render(source, target, mime_type).await {
            Ok(()) => ThumbnailOutcome::Created(target.to_path_buf()),
            Err(ThumbnailError::Unsupported(e)) => {
                tracing::debug!("Skipping thumbnail for {}: {}", source.display(), e);
                ThumbnailOutcome::Unsupported
            }
            Err(e) => {
                tracing::warn!("Failed to create thumbnail for {}: {}", source.display(), e);
                ThumbnailOutcome::Failed(e.to_string())
            }
        }
    }

    async fn render(&self, source: &Path, target: &Path, mime_type: &str) -> Result<(), ThumbnailError> {
        let kind = MediaKind::classify(mime_type)?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let (image, format) = match kind {
            MediaKind::Still => {
                let source = source.to_path_buf();
                tokio::task::spawn_blocking(move || open_sniffed(&source)).await??
            }
            MediaKind::Video => {
                let frame = self.frames.extract_frame(source).await?;
                let image =
                    tokio::task::spawn_blocking(move || image::load_from_memory(&frame)).await??;
                (image, Some(ImageFormat::Png))
            }
        };

        let target = target.to_path_buf();
        tokio::task::spawn_blocking(move || write_thumbnail(image, &target, format)).await??;
        Ok(())
    }
}

/// Decodes an image by its content, whatever its file name says
fn open_sniffed(source: &Path) -> Result<(DynamicImage, Option<ImageFormat>), image::ImageError> {
    let reader = ImageReader::open(source)?.with_guessed_format()?;
    let format = reader.format();
    Ok((reader.decode()?, format))
}

/// Picks the encoding of a thumbnail
///
/// The extension of `target` wins when `image` can write it, then `detected`,
/// then PNG.
fn output_format(target: &Path, detected: Option<ImageFormat>) -> ImageFormat {
    [ImageFormat::from_path(target).ok(), detected]
        .into_iter()
        .flatten()
        .find(|format| format.writing_enabled())
        .unwrap_or(ImageFormat::Png)
}

/// Scales an image into the thumbnail box and saves it
///
/// `detected` is the format of the source, used when the extension of
/// `target` names nothing `image` can write.
pub fn write_thumbnail(
    image: DynamicImage,
    target: &Path,
    detected: Option<ImageFormat>,
) -> Result<(), image::ImageError> {
    let (width, height) = fit_within(image.width(), image.height(), THUMBNAIL_SIZE);
    let resized = if (width, height) == (image.width(), image.height()) {
        image
    } else {
        image.resize_exact(width, height, FilterType::Lanczos3)
    };

    match output_format(target, detected) {
        ImageFormat::Jpeg => {
            DynamicImage::ImageRgb8(resized.to_rgb8()).save_with_format(target, ImageFormat::Jpeg)
        }
        format => resized.save_with_format(target, format),
    }
}
