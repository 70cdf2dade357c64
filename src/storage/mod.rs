//! Storage module for persisting mirrored metadata
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Idempotent upserts of files and pools
//! - Tag and full-text lookups
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::model::Provider;
use crate::sync::RunSummary;

use std::path::Path;

/// Initializes or opens a storage database
///
/// Parent directories of `path` are created when missing.
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    SqliteStorage::new(path)
}

/// Represents a sync run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub provider: Provider,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,

    /// All zeros while the run is in progress
    pub summary: RunSummary,
}

/// Status of a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
