use crate::model::Provider;
use std::path::{Path, PathBuf};

/// On-disk layout of mirrored media and thumbnails
///
/// ```text
/// <root>/<provider>/<username>/<file name>
/// <root>/<provider>-thumbnails/<username>/<file name>
/// ```
#[derive(Debug, Clone)]
pub struct MediaLayout {
    root: PathBuf,
}

impl MediaLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn provider_dir(&self, provider: Provider) -> PathBuf {
        self.root.join(provider.to_db_string())
    }

    pub fn thumbnail_dir(&self, provider: Provider) -> PathBuf {
        self.root.join(provider.thumbnail_dir_name())
    }

    /// Where the asset of a record is stored
    pub fn media_path(&self, provider: Provider, username: &str, file_name: &str) -> PathBuf {
        self.provider_dir(provider)
            .join(sanitize_component(username))
            .join(sanitize_component(file_name))
    }

    /// Where the thumbnail for a media file is stored
    ///
    /// `relative` is the media path below the provider directory. Video
    /// thumbnails are stills and get a `.png` extension.
    pub fn thumbnail_path(&self, provider: Provider, relative: &Path, is_video: bool) -> PathBuf {
        let path = self.thumbnail_dir(provider).join(relative);
        if is_video {
            path.with_extension("png")
        } else {
            path
        }
    }
}

/// Makes a remote name safe to use as a single path component
///
/// Separators are replaced, and names that would refer to the current or
/// parent directory become `_`.
pub fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
