//! Durable operation queue
//!
//! FIFO of deferred network operations (offline transcription jobs, feedback
//! uploads) persisted to SQLite so pending work survives a process restart.
//! Replayed strictly in enqueue order when connectivity returns; operations
//! leave the queue only on confirmed success, on exhaustion of their retry
//! budget, or immediately when the failure is not worth retrying.

mod backoff;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::db::DbPool;
use crate::{Error, Result};

pub use backoff::{delay_for_attempt, RetryPolicy};

/// What a queued operation does once connectivity returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Upload recorded audio for remote transcription
    Transcription,
    /// Deliver a feedback/telemetry payload
    Feedback,
}

impl OperationKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Transcription => "transcription",
            Self::Feedback => "feedback",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "transcription" => Some(Self::Transcription),
            "feedback" => Some(Self::Feedback),
            _ => None,
        }
    }
}

/// A deferred unit of work requiring connectivity
#[derive(Debug, Clone)]
pub struct QueuedOperation {
    /// Unique operation id
    pub id: String,
    /// What replaying this operation does
    pub kind: OperationKind,
    /// Binary body (WAV bytes for transcription, UTF-8 JSON for feedback)
    pub payload: Vec<u8>,
    /// Structured parameters (e.g. language tag)
    pub metadata: serde_json::Value,
    /// Marked important at enqueue time (issued deliberately while offline)
    pub important: bool,
    /// Replay attempts so far
    pub attempts: u32,
    /// Attempts before the operation is dropped as a permanent failure
    pub max_attempts: u32,
    /// When the operation was enqueued
    pub enqueued_at: DateTime<Utc>,
}

/// Queue lifecycle notifications surfaced to the UI layer
#[derive(Debug, Clone)]
pub enum QueueEvent {
    /// An operation was added to the queue
    Enqueued {
        /// Operation id
        id: String,
    },
    /// An operation completed successfully and left the queue
    Completed {
        /// Operation id
        id: String,
        /// Executor result (e.g. the transcript for a deferred
        /// transcription); `Null` when the operation has no result body
        result: serde_json::Value,
    },
    /// An operation failed validation and was dropped without retries
    Rejected {
        /// Operation id
        id: String,
        /// Human-readable reason
        message: String,
    },
    /// An operation exhausted its retry budget — permanent failure,
    /// distinguishable from "queued for later"
    Failed {
        /// Operation id
        id: String,
        /// Attempts made before giving up
        attempts: u32,
        /// Human-readable reason
        message: String,
    },
    /// A drain pass finished
    Drained {
        /// Operations completed during the pass
        completed: usize,
    },
}

/// Executes queued operations against the network
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    /// Perform the network call for one operation.
    ///
    /// # Errors
    ///
    /// Returns a transient error (per [`Error::is_transient`]) to request a
    /// retry, or any other error to drop the operation immediately.
    async fn execute(&self, op: &QueuedOperation) -> Result<serde_json::Value>;
}

/// Durable FIFO of deferred network operations
#[derive(Clone)]
pub struct OperationQueue {
    pool: DbPool,
    policy: RetryPolicy,
    default_max_attempts: u32,
    draining: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<QueueEvent>,
}

impl OperationQueue {
    /// Create a queue over the shared database pool.
    ///
    /// Previously persisted operations are already present in the store and
    /// will be replayed on the next drain. Returns the queue and the
    /// receiving end of its event channel.
    #[must_use]
    pub fn new(pool: DbPool, config: &QueueConfig) -> (Self, mpsc::UnboundedReceiver<QueueEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        (
            Self {
                pool,
                policy: RetryPolicy::from(config),
                default_max_attempts: config.max_attempts.max(1),
                draining: Arc::new(AtomicBool::new(false)),
                events,
            },
            receiver,
        )
    }

    /// Append an operation and persist it immediately.
    ///
    /// Returns the new operation's id.
    ///
    /// # Errors
    ///
    /// Returns error if the operation cannot be persisted
    pub fn enqueue(
        &self,
        kind: OperationKind,
        payload: Vec<u8>,
        metadata: serde_json::Value,
        important: bool,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO operation_queue
             (id, kind, payload, metadata, important, attempts, max_attempts, enqueued_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7)",
            params![
                id,
                kind.as_str(),
                payload,
                metadata.to_string(),
                important,
                self.default_max_attempts,
                Utc::now().to_rfc3339(),
            ],
        )?;

        tracing::debug!(id = %id, kind = kind.as_str(), important, "operation enqueued");
        let _ = self.events.send(QueueEvent::Enqueued { id: id.clone() });
        Ok(id)
    }

    /// Number of pending operations
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn len(&self) -> Result<usize> {
        let count: i64 =
            self.conn()?
                .query_row("SELECT COUNT(*) FROM operation_queue", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }

    /// Whether the queue holds no operations
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// All pending operations in replay order
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn pending(&self) -> Result<Vec<QueuedOperation>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, kind, payload, metadata, important, attempts, max_attempts, enqueued_at
             FROM operation_queue ORDER BY seq ASC",
        )?;

        let rows = stmt.query_map([], map_operation)?;
        let mut ops = Vec::new();
        for row in rows {
            if let Some(op) = row? {
                ops.push(op);
            }
        }
        Ok(ops)
    }

    /// Replay pending operations strictly in FIFO order.
    ///
    /// Must only be invoked while online. Non-reentrant: a call that overlaps
    /// an in-flight drain is a no-op. For each operation the executor runs
    /// the network call; transient failures are retried in-pass after a
    /// backoff delay until the operation's attempt budget runs out, at which
    /// point it is dropped and reported as a permanent failure. Failures the
    /// executor classifies as non-transient drop the operation immediately.
    ///
    /// Returns the number of operations completed.
    ///
    /// # Errors
    ///
    /// Returns error if queue persistence fails mid-pass
    pub async fn drain(&self, executor: &dyn OperationExecutor) -> Result<usize> {
        if self.draining.swap(true, Ordering::SeqCst) {
            tracing::debug!("drain already in progress");
            return Ok(0);
        }
        let _guard = DrainGuard(&self.draining);

        let mut completed = 0usize;
        loop {
            let Some(op) = self.head()? else {
                break;
            };

            match executor.execute(&op).await {
                Ok(result) => {
                    self.remove(&op.id)?;
                    completed += 1;
                    tracing::debug!(id = %op.id, "queued operation completed");
                    let _ = self.events.send(QueueEvent::Completed { id: op.id, result });
                }
                Err(e) if e.is_transient() => {
                    let attempts = op.attempts + 1;
                    if attempts >= op.max_attempts {
                        self.remove(&op.id)?;
                        tracing::warn!(
                            id = %op.id,
                            attempts,
                            error = %e,
                            "operation dropped after exhausting retries"
                        );
                        let _ = self.events.send(QueueEvent::Failed {
                            id: op.id,
                            attempts,
                            message: e.to_string(),
                        });
                    } else {
                        self.record_attempt(&op.id, attempts)?;
                        let delay = delay_for_attempt(&self.policy, attempts - 1);
                        tracing::debug!(
                            id = %op.id,
                            attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "transient failure, retrying after backoff"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => {
                    // Malformed/validation failures are never retried
                    self.remove(&op.id)?;
                    tracing::warn!(id = %op.id, error = %e, "operation rejected");
                    let _ = self.events.send(QueueEvent::Rejected {
                        id: op.id,
                        message: e.to_string(),
                    });
                }
            }
        }

        let _ = self.events.send(QueueEvent::Drained { completed });
        Ok(completed)
    }

    /// Manual retry trigger: resets the current pass state and drains.
    ///
    /// # Errors
    ///
    /// Returns error if queue persistence fails mid-pass
    pub async fn reconnect(&self, executor: &dyn OperationExecutor) -> Result<usize> {
        tracing::info!("manual reconnect requested, draining queue");
        self.drain(executor).await
    }

    fn head(&self) -> Result<Option<QueuedOperation>> {
        let conn = self.conn()?;
        let op = conn
            .query_row(
                "SELECT id, kind, payload, metadata, important, attempts, max_attempts, enqueued_at
                 FROM operation_queue ORDER BY seq ASC LIMIT 1",
                [],
                map_operation,
            )
            .optional()?;

        match op {
            Some(Some(op)) => Ok(Some(op)),
            // Unknown kind from a newer schema: drop it rather than wedge
            // the head of the queue forever.
            Some(None) => {
                conn.execute(
                    "DELETE FROM operation_queue WHERE seq = (
                         SELECT MIN(seq) FROM operation_queue
                     )",
                    [],
                )?;
                self.head()
            }
            None => Ok(None),
        }
    }

    fn remove(&self, id: &str) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM operation_queue WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn record_attempt(&self, id: &str, attempts: u32) -> Result<()> {
        self.conn()?.execute(
            "UPDATE operation_queue SET attempts = ?2 WHERE id = ?1",
            params![id, attempts],
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<crate::db::DbConn> {
        self.pool.get().map_err(|e| Error::Database(e.to_string()))
    }
}

/// Resets the draining flag when a pass ends, even on early error return
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn map_operation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Option<QueuedOperation>> {
    let kind_raw: String = row.get(1)?;
    let Some(kind) = OperationKind::from_str(&kind_raw) else {
        return Ok(None);
    };

    let metadata_raw: String = row.get(3)?;
    let enqueued_raw: String = row.get(7)?;

    Ok(Some(QueuedOperation {
        id: row.get(0)?,
        kind,
        payload: row.get(2)?,
        metadata: serde_json::from_str(&metadata_raw)
            .unwrap_or(serde_json::Value::Null),
        important: row.get(4)?,
        attempts: row.get(5)?,
        max_attempts: row.get(6)?,
        enqueued_at: DateTime::parse_from_rfc3339(&enqueued_raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn test_queue() -> (OperationQueue, mpsc::UnboundedReceiver<QueueEvent>) {
        let config = QueueConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
        };
        OperationQueue::new(db::init_memory().unwrap(), &config)
    }

    #[test]
    fn enqueue_persists_operation() {
        let (queue, _events) = test_queue();

        let id = queue
            .enqueue(
                OperationKind::Feedback,
                br#"{"rating":5}"#.to_vec(),
                serde_json::Value::Null,
                true,
            )
            .unwrap();

        let pending = queue.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert_eq!(pending[0].kind, OperationKind::Feedback);
        assert!(pending[0].important);
        assert_eq!(pending[0].attempts, 0);
    }

    #[test]
    fn pending_preserves_enqueue_order() {
        let (queue, _events) = test_queue();

        for name in ["a", "b", "c"] {
            queue
                .enqueue(
                    OperationKind::Feedback,
                    name.as_bytes().to_vec(),
                    serde_json::Value::Null,
                    false,
                )
                .unwrap();
        }

        let payloads: Vec<Vec<u8>> = queue
            .pending()
            .unwrap()
            .into_iter()
            .map(|op| op.payload)
            .collect();
        assert_eq!(payloads, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn kind_round_trips() {
        for kind in [OperationKind::Transcription, OperationKind::Feedback] {
            assert_eq!(OperationKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(OperationKind::from_str("unknown"), None);
    }
}
