//! favsync: incremental favorites mirror
//!
//! This crate walks a user's favorites listing on a gallery site, fetches every
//! submission it has not seen yet, downloads the media into a local tree,
//! generates thumbnails and upserts the metadata into a SQLite document store.
//! A run stops early once it keeps running into items it already has.

pub mod config;
pub mod crawler;
pub mod extractor;
pub mod media;
pub mod model;
pub mod output;
pub mod providers;
pub mod storage;
pub mod sync;
pub mod transport;

use thiserror::Error;

/// Main error type for favsync operations
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] transport::TransportError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Acquisition error: {0}")]
    Acquisition(#[from] media::AcquisitionError),

    #[error("Malformed submission {id}: {message}")]
    Extraction { id: String, message: String },

    #[error("Login failed: {0}")]
    Login(String),

    #[error("Provider {0} is not configured")]
    ProviderNotConfigured(model::Provider),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for favsync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{ItemId, MediaRecord, PoolRecord, Provider, Submission};
pub use sync::{run_sync, RunSummary};
