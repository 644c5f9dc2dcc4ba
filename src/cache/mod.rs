//! Binary audio cache
//!
//! Stores synthesized audio keyed by (original phrase text, language tag).
//! Repeated phrases dominate assistive-communication usage, so caching
//! trades a bounded amount of storage for avoiding repeated synthesis
//! round-trips and keeps common phrases speakable while briefly offline.
//!
//! Eviction is strict LRU-by-recency under a total byte cap, with a hard
//! TTL floor: entries older than the TTL are invalid regardless of recency,
//! so stale audio cannot outlive a voice-model update. Payloads live in
//! SQLite BLOB columns and survive restarts as real bytes.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};

use crate::config::CacheConfig;
use crate::db::DbPool;
use crate::{Error, Result};

/// Bounded, persistent store of synthesized audio
#[derive(Clone)]
pub struct AudioCache {
    pool: DbPool,
    config: CacheConfig,
}

impl AudioCache {
    /// Create a cache over the shared database pool
    #[must_use]
    pub fn new(pool: DbPool, config: CacheConfig) -> Self {
        Self { pool, config }
    }

    /// Look up cached audio for a phrase.
    ///
    /// Expired or absent entries miss. A hit refreshes the entry's
    /// last-accessed timestamp.
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn get(&self, text: &str, language: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn()?;

        let row: Option<(Vec<u8>, String)> = conn
            .query_row(
                "SELECT payload, created_at FROM audio_cache
                 WHERE text = ?1 AND language = ?2",
                params![text, language],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((payload, created_at)) = row else {
            return Ok(None);
        };

        if self.is_expired(&created_at) {
            conn.execute(
                "DELETE FROM audio_cache WHERE text = ?1 AND language = ?2",
                params![text, language],
            )?;
            tracing::debug!(text, language, "cache entry expired");
            return Ok(None);
        }

        conn.execute(
            "UPDATE audio_cache SET last_accessed = ?3
             WHERE text = ?1 AND language = ?2",
            params![text, language, Utc::now().to_rfc3339()],
        )?;

        tracing::debug!(text, language, bytes = payload.len(), "cache hit");
        Ok(Some(payload))
    }

    /// Store synthesized audio for a phrase.
    ///
    /// Payloads above the per-entry ceiling are not cached (no-op): long-form
    /// text is synthesized fresh every time. Insertion evicts
    /// least-recently-used entries until the total payload size is back under
    /// the cap. Last write wins per key.
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn put(&self, text: &str, language: &str, payload: &[u8]) -> Result<()> {
        if payload.len() as u64 > self.config.max_entry_bytes {
            tracing::debug!(
                text,
                language,
                bytes = payload.len(),
                ceiling = self.config.max_entry_bytes,
                "payload above per-entry ceiling, not cached"
            );
            return Ok(());
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(Error::Sqlite)?;
        let now = Utc::now().to_rfc3339();

        tx.execute(
            "INSERT OR REPLACE INTO audio_cache
             (text, language, payload, byte_len, created_at, last_accessed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![text, language, payload, payload.len() as i64, now],
        )?;

        // Expired rows first, then oldest-accessed until under the cap.
        let cutoff = (Utc::now() - self.ttl()).to_rfc3339();
        tx.execute(
            "DELETE FROM audio_cache WHERE created_at < ?1",
            params![cutoff],
        )?;

        loop {
            let total: i64 = tx.query_row(
                "SELECT COALESCE(SUM(byte_len), 0) FROM audio_cache",
                [],
                |row| row.get(0),
            )?;

            if total <= 0 || total as u64 <= self.config.max_total_bytes {
                break;
            }

            let evicted = tx.execute(
                "DELETE FROM audio_cache WHERE rowid IN (
                     SELECT rowid FROM audio_cache
                     ORDER BY last_accessed ASC LIMIT 1
                 )",
                [],
            )?;
            if evicted == 0 {
                break;
            }
            tracing::debug!(total, "evicted least-recently-used cache entry");
        }

        tx.commit().map_err(Error::Sqlite)?;
        Ok(())
    }

    /// Drop all entries
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn clear(&self) -> Result<()> {
        self.conn()?.execute("DELETE FROM audio_cache", [])?;
        tracing::debug!("audio cache cleared");
        Ok(())
    }

    /// Total cached payload bytes
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn total_bytes(&self) -> Result<u64> {
        let total: i64 = self.conn()?.query_row(
            "SELECT COALESCE(SUM(byte_len), 0) FROM audio_cache",
            [],
            |row| row.get(0),
        )?;
        Ok(total.max(0) as u64)
    }

    /// Number of cached entries
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn len(&self) -> Result<usize> {
        let count: i64 =
            self.conn()?
                .query_row("SELECT COUNT(*) FROM audio_cache", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }

    /// Whether the cache holds no entries
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn conn(&self) -> Result<crate::db::DbConn> {
        self.pool.get().map_err(|e| Error::Database(e.to_string()))
    }

    fn ttl(&self) -> Duration {
        Duration::seconds(self.config.ttl_secs.min(i64::MAX as u64) as i64)
    }

    fn is_expired(&self, created_at: &str) -> bool {
        let Ok(created) = DateTime::parse_from_rfc3339(created_at) else {
            // Unparseable timestamp: treat as expired rather than serve
            // audio of unknown age.
            return true;
        };
        Utc::now() - created.with_timezone(&Utc) > self.ttl()
    }
}
