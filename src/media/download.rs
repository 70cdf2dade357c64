use crate::media::AcquisitionError;
use crate::transport::{RequestSpec, RetryTransport};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Bytes received so far for one download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub received_bytes: u64,

    /// From `Content-Length`, when the server sent one
    pub total_bytes: Option<u64>,
}

/// Receives progress updates while an asset streams to disk
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, destination: &Path, progress: DownloadProgress);
}

/// Logs download progress at trace level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_progress(&self, destination: &Path, progress: DownloadProgress) {
        match progress.total_bytes {
            Some(total) => tracing::trace!(
                "{}: {}/{} bytes",
                destination.display(),
                progress.received_bytes,
                total
            ),
            None => tracing::trace!("{}: {} bytes", destination.display(), progress.received_bytes),
        }
    }
}

/// Path of the temporary file a download streams into
pub fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

/// Streams an asset to `destination`
///
/// The body is written to `<destination>.part` and renamed into place once
/// complete, so `destination` only ever exists with full contents. On failure
/// the partial file is removed. With a `stall_timeout` on the request, a body
/// that goes quiet for longer than that fails the download. Returns the number
/// of bytes written.
pub async fn download_to(
    transport: &RetryTransport,
    spec: &RequestSpec,
    destination: &Path,
    observer: Option<&dyn ProgressObserver>,
) -> Result<u64, AcquisitionError> {
    let part = part_path(destination);
    let mut response = transport.send(spec).await?;
    let total_bytes = response.content_length();

    let written = async {
        let mut file = tokio::fs::File::create(&part)
            .await
            .map_err(|source| AcquisitionError::io(&part, source))?;
        let mut received_bytes = 0u64;

        loop {
            let next = match spec.stall_timeout {
                Some(limit) => tokio::time::timeout(limit, response.chunk())
                    .await
                    .map_err(|_| AcquisitionError::Stalled {
                        url: spec.url.clone(),
                        after: limit,
                    })?,
                None => response.chunk().await,
            };
            let Some(chunk) = next.map_err(|source| AcquisitionError::Stream {
                url: spec.url.clone(),
                source,
            })?
            else {
                break;
            };

            file.write_all(&chunk)
                .await
                .map_err(|source| AcquisitionError::io(&part, source))?;
            received_bytes += chunk.len() as u64;

            if let Some(observer) = observer {
                observer.on_progress(
                    destination,
                    DownloadProgress {
                        received_bytes,
                        total_bytes,
                    },
                );
            }
        }

        file.flush()
            .await
            .map_err(|source| AcquisitionError::io(&part, source))?;
        Ok::<u64, AcquisitionError>(received_bytes)
    }
    .await;

    match written {
        Ok(bytes) => {
            tokio::fs::rename(&part, destination)
                .await
                .map_err(|source| AcquisitionError::io(destination, source))?;
            tracing::debug!("Downloaded {} bytes to {}", bytes, destination.display());
            Ok(bytes)
        }
        Err(e) => {
            if let Err(cleanup) = tokio::fs::remove_file(&part).await {
                tracing::debug!("Could not remove {}: {}", part.display(), cleanup);
            }
            Err(e)
        }
    }
}
