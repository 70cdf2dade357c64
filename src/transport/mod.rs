//! HTTP transport with bounded retry
//!
//! Every network call in the sync engine (listing pages, submission
//! lookups, asset downloads) goes through a `RetryTransport`. It retries
//! connection failures and non-2xx statuses a fixed number of times with a
//! fixed delay; anything that arrives as a readable 2xx body is handed back to
//! the caller, even if the body itself reports an error.

mod client;
mod retry;

pub use client::build_http_client;
pub use retry::{RequestSpec, RetryPolicy, RetryTransport};

use std::time::Duration;
use thiserror::Error;

/// Errors produced by the transport layer
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Network error for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("No response from {url} within {after:?}")]
    Stalled { url: String, after: Duration },

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Remote error from {url}: {message}")]
    Remote { url: String, message: String },

    #[error("Invalid request URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
}

impl TransportError {
    /// Returns true for failures the transport retries
    ///
    /// Decode and remote errors come from a response that was delivered
    /// successfully, so sending the same request again will not change them.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Status { .. } | Self::Network { .. } | Self::Stalled { .. }
        )
    }

    /// Returns the HTTP status code, if the failure carried one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;
