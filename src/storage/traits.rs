//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::model::{MediaRecord, PoolRecord, Provider};
use crate::storage::{RunRecord, RunStatus};
use crate::sync::RunSummary;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Files are keyed by `(provider, file_id)` and pools by `(provider, pool_id)`.
/// Writes are upserts; nothing is ever deleted, and pool membership only grows.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new sync run
    ///
    /// # Arguments
    ///
    /// * `provider` - The provider being synced
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, provider: Provider, config_hash: &str) -> StorageResult<i64>;

    /// Records the end of a run together with its counters
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        summary: &RunSummary,
    ) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run for a provider
    fn get_latest_run(&self, provider: Provider) -> StorageResult<Option<RunRecord>>;

    // ===== Files and Pools =====

    /// Inserts or refreshes a file
    ///
    /// Mutable fields and the tag set are overwritten; pool memberships in
    /// `record.pools` are added to the existing ones.
    fn upsert_file(&mut self, record: &MediaRecord) -> StorageResult<()>;

    /// Inserts a pool or overwrites its name and description
    ///
    /// Every id in `pool.files`, plus `add_member` when given, is added to the
    /// pool's membership.
    fn upsert_pool(&mut self, pool: &PoolRecord, add_member: Option<i64>) -> StorageResult<()>;

    /// Writes all files and pools of one submission in a single transaction
    fn commit_submission(&mut self, files: &[MediaRecord], pools: &[PoolRecord])
        -> StorageResult<()>;

    /// Looks up a file by its key
    fn find_file(&self, provider: Provider, file_id: i64) -> StorageResult<Option<MediaRecord>>;

    /// Returns true if any file of the submission is stored
    fn submission_exists(&self, provider: Provider, submission_id: i64) -> StorageResult<bool>;

    /// Looks up a pool and its members
    fn get_pool(&self, provider: Provider, pool_id: i64) -> StorageResult<Option<PoolRecord>>;

    // ===== Queries =====

    /// Gets all files carrying a normalized tag, newest first
    fn files_with_tag(&self, provider: Provider, tag: &str) -> StorageResult<Vec<MediaRecord>>;

    /// Full-text search over titles and descriptions, newest first
    ///
    /// Every whitespace-separated word of `query` must match.
    fn search_files(&self, provider: Provider, query: &str) -> StorageResult<Vec<MediaRecord>>;

    /// Gets the number of stored files
    fn count_files(&self, provider: Provider) -> StorageResult<u64>;

    /// Gets the number of stored pools
    fn count_pools(&self, provider: Provider) -> StorageResult<u64>;
}
