//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the favsync database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track sync runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    provider TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    new_items INTEGER NOT NULL DEFAULT 0,
    duplicates INTEGER NOT NULL DEFAULT 0,
    not_found INTEGER NOT NULL DEFAULT 0,
    failed INTEGER NOT NULL DEFAULT 0,
    pages INTEGER NOT NULL DEFAULT 0,
    stop_reason TEXT
);

CREATE INDEX IF NOT EXISTS idx_runs_provider ON runs(provider);

-- One row per mirrored file
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    provider TEXT NOT NULL,
    submission_id INTEGER NOT NULL,
    file_id INTEGER NOT NULL,
    file_name TEXT NOT NULL,
    mime_type TEXT,
    width INTEGER NOT NULL DEFAULT 0,
    height INTEGER NOT NULL DEFAULT 0,
    title TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    username TEXT NOT NULL DEFAULT '',
    user_id INTEGER,
    create_timestamp INTEGER,
    create_datetime TEXT,
    content_hash TEXT,
    updated_at TEXT NOT NULL,
    UNIQUE(provider, file_id)
);

CREATE INDEX IF NOT EXISTS idx_files_username ON files(username);
CREATE INDEX IF NOT EXISTS idx_files_user_id ON files(user_id);
CREATE INDEX IF NOT EXISTS idx_files_submission ON files(provider, submission_id);
CREATE INDEX IF NOT EXISTS idx_files_file_name ON files(file_name);
CREATE INDEX IF NOT EXISTS idx_files_content_hash ON files(content_hash);
CREATE INDEX IF NOT EXISTS idx_files_create_timestamp ON files(create_timestamp);

-- Tag set of each file, replaced on every upsert
CREATE TABLE IF NOT EXISTS file_tags (
    file_row INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    tag TEXT NOT NULL,
    PRIMARY KEY(file_row, tag)
);

CREATE INDEX IF NOT EXISTS idx_file_tags_tag ON file_tags(tag);

-- Pools (named collections of submissions)
CREATE TABLE IF NOT EXISTS pools (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    provider TEXT NOT NULL,
    pool_id INTEGER NOT NULL,
    name TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    updated_at TEXT NOT NULL,
    UNIQUE(provider, pool_id)
);

CREATE INDEX IF NOT EXISTS idx_pools_name ON pools(provider, name);

-- Pool membership; rows are only ever added
CREATE TABLE IF NOT EXISTS pool_members (
    provider TEXT NOT NULL,
    pool_id INTEGER NOT NULL,
    file_id INTEGER NOT NULL,
    PRIMARY KEY(provider, pool_id, file_id)
);

CREATE INDEX IF NOT EXISTS idx_pool_members_pool ON pool_members(provider, pool_id);
CREATE INDEX IF NOT EXISTS idx_pool_members_file ON pool_members(provider, file_id);

-- Full-text index over title and description
CREATE VIRTUAL TABLE IF NOT EXISTS files_fts USING fts5(
    title,
    description,
    content='files',
    content_rowid='id'
);

CREATE TRIGGER IF NOT EXISTS files_fts_insert AFTER INSERT ON files BEGIN
    INSERT INTO files_fts(rowid, title, description)
    VALUES (new.id, new.title, new.description);
END;

CREATE TRIGGER IF NOT EXISTS files_fts_delete AFTER DELETE ON files BEGIN
    INSERT INTO files_fts(files_fts, rowid, title, description)
    VALUES ('delete', old.id, old.title, old.description);
END;

CREATE TRIGGER IF NOT EXISTS files_fts_update AFTER UPDATE ON files BEGIN
    INSERT INTO files_fts(files_fts, rowid, title, description)
    VALUES ('delete', old.id, old.title, old.description);
    INSERT INTO files_fts(rowid, title, description)
    VALUES (new.id, new.title, new.description);
END;
"#;

/// Initializes the database schema
///
/// Safe to run against an existing database.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
