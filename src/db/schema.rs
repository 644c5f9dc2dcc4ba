//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Cached synthesized audio, keyed by the original (pre-normalization)
        -- phrase text and language tag. Payloads are raw audio bytes stored
        -- as BLOBs so they survive restarts without any string encoding.
        CREATE TABLE IF NOT EXISTS audio_cache (
            text TEXT NOT NULL,
            language TEXT NOT NULL,
            payload BLOB NOT NULL,
            byte_len INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            last_accessed TEXT NOT NULL,
            PRIMARY KEY (text, language)
        );

        CREATE INDEX IF NOT EXISTS idx_audio_cache_lru ON audio_cache(last_accessed);

        -- Deferred network operations, replayed in seq order on reconnect.
        CREATE TABLE IF NOT EXISTS operation_queue (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            kind TEXT NOT NULL,
            payload BLOB NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            important INTEGER NOT NULL DEFAULT 0,
            attempts INTEGER NOT NULL DEFAULT 0,
            max_attempts INTEGER NOT NULL,
            enqueued_at TEXT NOT NULL
        );

        PRAGMA user_version = 1;
        ",
    )?;

    Ok(())
}
