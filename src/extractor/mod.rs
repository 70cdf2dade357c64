//! Item extraction interface
//!
//! An extractor turns a listing id into a normalized `Submission`. Each
//! provider ships its own implementation (see `crate::providers`), so the
//! site-specific parsing never leaks into the sync loop.

use crate::model::{ItemId, Provider, Submission};
use crate::transport::RequestSpec;
use crate::SyncError;
use async_trait::async_trait;

/// Result of looking up one listing entry
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// The submission exists and was parsed
    Found(Submission),

    /// The submission was deleted or is not visible to the current credentials
    NotFound,
}

/// Fetches and normalizes one submission
///
/// `extract` must not have side effects visible to the sync loop. It may retry
/// internally before giving up with an error or `NotFound`.
#[async_trait]
pub trait ItemExtractor: Send + Sync {
    /// The provider whose records this extractor produces
    fn provider(&self) -> Provider;

    /// Looks up a single submission
    async fn extract(&self, id: &ItemId) -> Result<Extraction, SyncError>;

    /// Builds the request that downloads an asset of this provider
    ///
    /// The default is a plain GET; providers that need credentials on
    /// downloads override it.
    fn asset_request(&self, url: &str) -> RequestSpec {
        RequestSpec::get(url)
    }
}
