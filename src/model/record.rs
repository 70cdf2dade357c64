use crate::model::Provider;
use std::collections::BTreeSet;
use std::fmt;

/// Identifier of a remote submission as it appears in a listing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the id as the numeric submission id both providers use
    pub fn as_number(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One remote file and its derived metadata
///
/// `(provider, file_id)` identifies the record; every write is an upsert on
/// that key. `mime_type`, `width`, `height` and `content_hash` are filled in
/// from the downloaded bytes by the media pipeline; extractor-provided values
/// are only kept when detection fails.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRecord {
    pub provider: Provider,
    pub submission_id: i64,
    pub file_id: i64,
    pub file_name: String,
    pub mime_type: Option<String>,
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub description: String,
    pub username: String,
    pub user_id: Option<i64>,
    pub tags: BTreeSet<String>,
    pub create_timestamp: Option<i64>,
    pub create_datetime: Option<String>,
    pub content_hash: Option<String>,
    pub pools: BTreeSet<i64>,

    /// Where the asset is downloaded from; never persisted
    pub source_url: Option<String>,
}

impl MediaRecord {
    /// Creates a record with only the key fields set
    pub fn new(provider: Provider, submission_id: i64, file_id: i64, file_name: &str) -> Self {
        Self {
            provider,
            submission_id,
            file_id,
            file_name: file_name.to_string(),
            mime_type: None,
            width: 0,
            height: 0,
            title: String::new(),
            description: String::new(),
            username: String::new(),
            user_id: None,
            tags: BTreeSet::new(),
            create_timestamp: None,
            create_datetime: None,
            content_hash: None,
            pools: BTreeSet::new(),
            source_url: None,
        }
    }
}

/// A named collection of submissions (Inkbunny only)
///
/// Membership only ever grows; name and description follow the latest sighting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolRecord {
    pub provider: Provider,
    pub pool_id: i64,
    pub name: String,
    pub description: String,
    pub files: BTreeSet<i64>,
}

/// Everything an extractor learned about one listing entry
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub submission_id: i64,
    pub files: Vec<MediaRecord>,
    pub pools: Vec<PoolRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id_number() {
        assert_eq!(ItemId::from("12345").as_number(), Some(12345));
        assert_eq!(ItemId::from("abc").as_number(), None);
    }

    #[test]
    fn test_new_record_defaults() {
        let record = MediaRecord::new(Provider::FurAffinity, 7, 99, "99.x_file.png");
        assert_eq!(record.width, 0);
        assert_eq!(record.height, 0);
        assert!(record.tags.is_empty());
        assert!(record.content_hash.is_none());
    }
}
