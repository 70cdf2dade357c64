//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::model::{MediaRecord, PoolRecord, Provider};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use crate::sync::{RunSummary, StopReason};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::Path;

/// Columns read for a file, in the order `file_from_row` expects
const FILE_COLUMNS: &str = "files.id, files.submission_id, files.file_id, files.file_name, \
     files.mime_type, files.width, files.height, files.title, files.description, \
     files.username, files.user_id, files.create_timestamp, files.create_datetime, \
     files.content_hash";

const RUN_COLUMNS: &str = "id, provider, started_at, finished_at, config_hash, status, \
     new_items, duplicates, not_found, failed, pages, stop_reason";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn query_files<P: rusqlite::Params>(
        &self,
        provider: Provider,
        sql: &str,
        params: P,
    ) -> StorageResult<Vec<MediaRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, |row| file_from_row(provider, row))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(row_id, record)| hydrate_file(&self.conn, row_id, record))
            .collect()
    }
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, provider: Provider, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (provider, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                provider.to_db_string(),
                now,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        summary: &RunSummary,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, new_items = ?3, duplicates = ?4,
             not_found = ?5, failed = ?6, pages = ?7, stop_reason = ?8
             WHERE id = ?9",
            params![
                status.to_db_string(),
                now,
                summary.new as i64,
                summary.duplicate as i64,
                summary.not_found as i64,
                summary.failed as i64,
                summary.pages_fetched,
                summary.stop_reason.map(|r| r.to_db_string()),
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self, provider: Provider) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM runs WHERE provider = ?1 ORDER BY id DESC LIMIT 1",
                    RUN_COLUMNS
                ),
                params![provider.to_db_string()],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    // ===== Files and Pools =====

    fn upsert_file(&mut self, record: &MediaRecord) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        write_file(&tx, record)?;
        tx.commit()?;
        Ok(())
    }

    fn upsert_pool(&mut self, pool: &PoolRecord, add_member: Option<i64>) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        write_pool(&tx, pool, add_member)?;
        tx.commit()?;
        Ok(())
    }

    fn commit_submission(
        &mut self,
        files: &[MediaRecord],
        pools: &[PoolRecord],
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        for pool in pools {
            write_pool(&tx, pool, None)?;
        }
        for file in files {
            write_file(&tx, file)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn find_file(&self, provider: Provider, file_id: i64) -> StorageResult<Option<MediaRecord>> {
        let found = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM files WHERE provider = ?1 AND file_id = ?2",
                    FILE_COLUMNS
                ),
                params![provider.to_db_string(), file_id],
                |row| file_from_row(provider, row),
            )
            .optional()?;

        match found {
            Some((row_id, record)) => Ok(Some(hydrate_file(&self.conn, row_id, record)?)),
            None => Ok(None),
        }
    }

    fn submission_exists(&self, provider: Provider, submission_id: i64) -> StorageResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM files WHERE provider = ?1 AND submission_id = ?2)",
            params![provider.to_db_string(), submission_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn get_pool(&self, provider: Provider, pool_id: i64) -> StorageResult<Option<PoolRecord>> {
        let pool = self
            .conn
            .query_row(
                "SELECT name, description FROM pools WHERE provider = ?1 AND pool_id = ?2",
                params![provider.to_db_string(), pool_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        let Some((name, description)) = pool else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT file_id FROM pool_members WHERE provider = ?1 AND pool_id = ?2",
        )?;
        let files = stmt
            .query_map(params![provider.to_db_string(), pool_id], |row| {
                row.get::<_, i64>(0)
            })?
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(Some(PoolRecord {
            provider,
            pool_id,
            name,
            description,
            files,
        }))
    }

    // ===== Queries =====

    fn files_with_tag(&self, provider: Provider, tag: &str) -> StorageResult<Vec<MediaRecord>> {
        let sql = format!(
            "SELECT {} FROM files
             JOIN file_tags ON file_tags.file_row = files.id
             WHERE files.provider = ?1 AND file_tags.tag = ?2
             ORDER BY files.create_timestamp DESC, files.file_id DESC",
            FILE_COLUMNS
        );
        self.query_files(provider, &sql, params![provider.to_db_string(), tag])
    }

    fn search_files(&self, provider: Provider, query: &str) -> StorageResult<Vec<MediaRecord>> {
        let Some(match_expr) = fts_query(query) else {
            return Ok(Vec::new());
        };

        let sql = format!(
            "SELECT {} FROM files_fts
             JOIN files ON files.id = files_fts.rowid
             WHERE files_fts MATCH ?1 AND files.provider = ?2
             ORDER BY files.create_timestamp DESC, files.file_id DESC",
            FILE_COLUMNS
        );
        self.query_files(provider, &sql, params![match_expr, provider.to_db_string()])
    }

    fn count_files(&self, provider: Provider) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM files WHERE provider = ?1",
            params![provider.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_pools(&self, provider: Provider) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pools WHERE provider = ?1",
            params![provider.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

fn write_file(conn: &Connection, record: &MediaRecord) -> StorageResult<()> {
    let provider = record.provider.to_db_string();
    let now = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO files (provider, submission_id, file_id, file_name, mime_type, width, height,
             title, description, username, user_id, create_timestamp, create_datetime,
             content_hash, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
         ON CONFLICT(provider, file_id) DO UPDATE SET
             submission_id = excluded.submission_id,
             file_name = excluded.file_name,
             mime_type = excluded.mime_type,
             width = excluded.width,
             height = excluded.height,
             title = excluded.title,
             description = excluded.description,
             username = excluded.username,
             user_id = excluded.user_id,
             create_timestamp = excluded.create_timestamp,
             create_datetime = excluded.create_datetime,
             content_hash = excluded.content_hash,
             updated_at = excluded.updated_at",
        params![
            provider,
            record.submission_id,
            record.file_id,
            record.file_name,
            record.mime_type,
            record.width,
            record.height,
            record.title,
            record.description,
            record.username,
            record.user_id,
            record.create_timestamp,
            record.create_datetime,
            record.content_hash,
            now
        ],
    )?;

    let row_id: i64 = conn.query_row(
        "SELECT id FROM files WHERE provider = ?1 AND file_id = ?2",
        params![provider, record.file_id],
        |row| row.get(0),
    )?;

    conn.execute("DELETE FROM file_tags WHERE file_row = ?1", params![row_id])?;
    let mut insert_tag =
        conn.prepare_cached("INSERT OR IGNORE INTO file_tags (file_row, tag) VALUES (?1, ?2)")?;
    for tag in &record.tags {
        insert_tag.execute(params![row_id, tag])?;
    }

    for pool_id in &record.pools {
        add_pool_member(conn, record.provider, *pool_id, record.file_id)?;
    }

    Ok(())
}

fn write_pool(conn: &Connection, pool: &PoolRecord, add_member: Option<i64>) -> StorageResult<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO pools (provider, pool_id, name, description, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(provider, pool_id) DO UPDATE SET
             name = excluded.name,
             description = excluded.description,
             updated_at = excluded.updated_at",
        params![
            pool.provider.to_db_string(),
            pool.pool_id,
            pool.name,
            pool.description,
            now
        ],
    )?;

    for file_id in pool.files.iter().copied().chain(add_member) {
        add_pool_member(conn, pool.provider, pool.pool_id, file_id)?;
    }
    Ok(())
}

fn add_pool_member(
    conn: &Connection,
    provider: Provider,
    pool_id: i64,
    file_id: i64,
) -> StorageResult<()> {
    conn.prepare_cached(
        "INSERT OR IGNORE INTO pool_members (provider, pool_id, file_id) VALUES (?1, ?2, ?3)",
    )?
    .execute(params![provider.to_db_string(), pool_id, file_id])?;
    Ok(())
}

fn file_from_row(provider: Provider, row: &Row<'_>) -> rusqlite::Result<(i64, MediaRecord)> {
    let mut record = MediaRecord::new(provider, row.get(1)?, row.get(2)?, "");
    record.file_name = row.get(3)?;
    record.mime_type = row.get(4)?;
    record.width = row.get(5)?;
    record.height = row.get(6)?;
    record.title = row.get(7)?;
    record.description = row.get(8)?;
    record.username = row.get(9)?;
    record.user_id = row.get(10)?;
    record.create_timestamp = row.get(11)?;
    record.create_datetime = row.get(12)?;
    record.content_hash = row.get(13)?;
    Ok((row.get(0)?, record))
}

/// Loads the tag set and pool memberships of a file row
fn hydrate_file(conn: &Connection, row_id: i64, mut record: MediaRecord) -> StorageResult<MediaRecord> {
    let mut tags = conn.prepare_cached("SELECT tag FROM file_tags WHERE file_row = ?1")?;
    record.tags = tags
        .query_map(params![row_id], |row| row.get::<_, String>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;

    let mut pools = conn
        .prepare_cached("SELECT pool_id FROM pool_members WHERE provider = ?1 AND file_id = ?2")?;
    record.pools = pools
        .query_map(
            params![record.provider.to_db_string(), record.file_id],
            |row| row.get::<_, i64>(0),
        )?
        .collect::<Result<BTreeSet<_>, _>>()?;

    Ok(record)
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let provider: String = row.get(1)?;
    let provider = Provider::from_db_string(&provider).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            Type::Text,
            format!("unknown provider {:?}", provider).into(),
        )
    })?;

    Ok(RunRecord {
        id: row.get(0)?,
        provider,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?).unwrap_or(RunStatus::Failed),
        summary: RunSummary {
            new: row.get::<_, i64>(6)? as u64,
            duplicate: row.get::<_, i64>(7)? as u64,
            not_found: row.get::<_, i64>(8)? as u64,
            failed: row.get::<_, i64>(9)? as u64,
            pages_fetched: row.get(10)?,
            stop_reason: row
                .get::<_, Option<String>>(11)?
                .as_deref()
                .and_then(StopReason::from_db_string),
        },
    })
}

/// Turns free text into an FTS5 expression matching every word
fn fts_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}
