//! Provider strategies
//!
//! Each supported site gets one type implementing both `ListingSource`
//! (walking the favorites listing) and `ItemExtractor` (turning an id into a
//! `Submission`). All site-specific parsing lives here:
//! - `furaffinity`: HTML pages parsed with `scraper` selectors
//! - `inkbunny`: JSON API with a session id and pools

pub mod furaffinity;
pub mod inkbunny;

pub use furaffinity::FurAffinity;
pub use inkbunny::{Inkbunny, InkbunnySession, SearchCursor};

use crate::transport::TransportError;
use url::Url;

/// Resolves `path` against a provider's base URL
pub(crate) fn endpoint(base_url: &Url, path: &str) -> Result<Url, TransportError> {
    base_url
        .join(path)
        .map_err(|e| TransportError::InvalidUrl {
            url: path.to_string(),
            message: e.to_string(),
        })
}
