//! The [`SessionStore`] — append-only session and message log.
//!
//! Every write runs inside a single SQLite transaction, so callers never
//! observe partial state.
//!
//! INVARIANT: message writes are serialized per-session via in-process mutex
//! locks, and SQLite `UNIQUE(session_id, seq)` enforces ordering at the DB
//! level. Two loops racing on one session cannot interleave their appends.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use metrics::counter;
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use provost_core::ids::{new_message_id, new_session_id};
use provost_core::messages::{MessageContent, Role, StoredMessage};

use crate::connection::{ConnectionPool, PooledConnection};
use crate::errors::{Result, StoreError};

/// A session row as persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRow {
    /// Session ID (`ses_` prefix).
    pub id: String,
    /// Persona/tool-set tag (`academic` or `reporting`).
    pub category: String,
    /// Lazily generated title; `None` until the title task completes.
    pub title: Option<String>,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
    /// ISO 8601 last-append timestamp.
    pub updated_at: String,
    /// Number of persisted messages.
    pub message_count: i64,
}

/// Durable, append-only message log keyed by session.
pub struct SessionStore {
    pool: ConnectionPool,
    session_write_locks: Mutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl SessionStore {
    const SQLITE_BUSY_MAX_RETRIES: u32 = 32;

    /// Create a store over an initialized (migrated) pool.
    #[must_use]
    pub fn new(pool: ConnectionPool) -> Self {
        Self {
            pool,
            session_write_locks: Mutex::new(HashMap::new()),
        }
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    fn acquire_session_write_lock(&self, session_id: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .session_write_locks
            .lock()
            .map_err(|_| StoreError::Internal("session lock map poisoned".into()))?;

        // Opportunistically prune dead weak refs when the map grows.
        if locks.len() > 128 {
            locks.retain(|_, weak| weak.strong_count() > 0);
        }

        if let Some(existing) = locks.get(session_id).and_then(Weak::upgrade) {
            return Ok(existing);
        }

        let lock = Arc::new(Mutex::new(()));
        let _ = locks.insert(session_id.to_string(), Arc::downgrade(&lock));
        Ok(lock)
    }

    fn with_session_write_lock<T>(
        &self,
        session_id: &str,
        f: impl FnMut() -> Result<T>,
    ) -> Result<T> {
        let session_lock = self.acquire_session_write_lock(session_id)?;
        let _guard = session_lock
            .lock()
            .map_err(|_| StoreError::Internal("session write lock poisoned".into()))?;
        Self::retry_on_sqlite_busy(f)
    }

    /// Retry an operation on SQLite BUSY/LOCKED with linear backoff + jitter.
    fn retry_on_sqlite_busy<T>(mut f: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempts = 0;
        loop {
            match f() {
                Ok(value) => return Ok(value),
                Err(err)
                    if Self::is_sqlite_busy_or_locked(&err)
                        && attempts < Self::SQLITE_BUSY_MAX_RETRIES =>
                {
                    attempts += 1;
                    let base_ms = u64::from(attempts).saturating_mul(10).min(500);
                    let jitter_range = base_ms / 4;
                    let jitter = if jitter_range > 0 {
                        rand::random::<u64>() % (jitter_range * 2 + 1)
                    } else {
                        0
                    };
                    let backoff_ms = base_ms.saturating_sub(jitter_range) + jitter;
                    std::thread::sleep(Duration::from_millis(backoff_ms));
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn is_sqlite_busy_or_locked(err: &StoreError) -> bool {
        match err {
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(code, _)) => matches!(
                code.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Create a session, seeding the persona greeting as message 0.
    ///
    /// Atomic: session insert and greeting append happen in one transaction.
    #[instrument(skip(self, greeting), fields(category))]
    pub fn create_session(&self, category: &str, greeting: &str) -> Result<SessionRow> {
        let session_id = new_session_id();
        let now = chrono::Utc::now().to_rfc3339();
        let greeting_content = MessageContent::Text {
            text: greeting.to_string(),
        };
        let content_json = serde_json::to_string(&greeting_content)?;

        self.with_session_write_lock(&session_id, || {
            let conn = self.conn()?;
            let tx = conn.unchecked_transaction()?;
            let _ = tx.execute(
                "INSERT INTO sessions (id, category, title, created_at, updated_at)
                 VALUES (?1, ?2, NULL, ?3, ?3)",
                params![session_id, category, now],
            )?;
            let _ = tx.execute(
                "INSERT INTO messages (id, session_id, seq, role, content, created_at)
                 VALUES (?1, ?2, 0, ?3, ?4, ?5)",
                params![
                    new_message_id(),
                    session_id,
                    Role::Model.as_str(),
                    content_json,
                    now
                ],
            )?;
            tx.commit()?;
            Ok(())
        })?;

        counter!("store_sessions_created_total", "category" => category.to_string()).increment(1);
        debug!(session_id = %session_id, category, "session created");

        self.get_session(&session_id)?
            .ok_or_else(|| StoreError::Internal("session vanished after create".into()))
    }

    /// Append one message to a session's log. Returns the stored row.
    ///
    /// The next `seq` is assigned inside the transaction, so a dense,
    /// gap-free order is guaranteed even under writer contention.
    #[instrument(skip(self, content), fields(session_id, role = %role))]
    pub fn append_message(
        &self,
        session_id: &str,
        role: Role,
        content: &MessageContent,
    ) -> Result<StoredMessage> {
        let content_json = serde_json::to_string(content)?;
        let message_id = new_message_id();
        let now = chrono::Utc::now().to_rfc3339();

        let seq = self.with_session_write_lock(session_id, || {
            let conn = self.conn()?;
            let tx = conn.unchecked_transaction()?;

            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM sessions WHERE id = ?1)",
                params![session_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(StoreError::SessionNotFound(session_id.to_string()));
            }

            let seq: i64 = tx.query_row(
                "SELECT COALESCE(MAX(seq) + 1, 0) FROM messages WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )?;
            let _ = tx.execute(
                "INSERT INTO messages (id, session_id, seq, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![message_id, session_id, seq, role.as_str(), content_json, now],
            )?;
            let _ = tx.execute(
                "UPDATE sessions SET updated_at = ?1 WHERE id = ?2",
                params![now, session_id],
            )?;
            tx.commit()?;
            Ok(seq)
        })?;

        counter!("store_messages_appended_total", "role" => role.as_str()).increment(1);

        Ok(StoredMessage {
            id: message_id,
            session_id: session_id.to_string(),
            seq,
            role,
            content: content.clone(),
            created_at: now,
        })
    }

    /// Load the full ordered history of a session.
    #[instrument(skip(self), fields(session_id))]
    pub fn load_history(&self, session_id: &str) -> Result<Vec<StoredMessage>> {
        let conn = self.conn()?;

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sessions WHERE id = ?1)",
            params![session_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StoreError::SessionNotFound(session_id.to_string()));
        }

        let mut stmt = conn.prepare(
            "SELECT id, session_id, seq, role, content, created_at
             FROM messages WHERE session_id = ?1 ORDER BY seq",
        )?;
        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, session_id, seq, role, content, created_at)| {
                let role = Role::parse(&role)
                    .ok_or_else(|| StoreError::CorruptRow(format!("unknown role '{role}'")))?;
                let content: MessageContent = serde_json::from_str(&content)?;
                Ok(StoredMessage {
                    id,
                    session_id,
                    seq,
                    role,
                    content,
                    created_at,
                })
            })
            .collect()
    }

    /// Set a session's title. Best-effort caller contract: the title task
    /// treats any error as log-and-drop. Returns `false` for unknown ids.
    #[instrument(skip(self, title), fields(session_id))]
    pub fn set_title(&self, session_id: &str, title: &str) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE sessions SET title = ?1, updated_at = ?2 WHERE id = ?3",
            params![title, chrono::Utc::now().to_rfc3339(), session_id],
        )?;
        Ok(changed > 0)
    }

    /// Fetch one session with its message count.
    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionRow>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT s.id, s.category, s.title, s.created_at, s.updated_at,
                        (SELECT COUNT(*) FROM messages WHERE session_id = s.id) AS message_count
                 FROM sessions s WHERE s.id = ?1",
                params![session_id],
                Self::map_session_row,
            )
            .optional()?;
        Ok(row)
    }

    /// List sessions, optionally filtered by category, most recent first.
    pub fn list_sessions(&self, category: Option<&str>) -> Result<Vec<SessionRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT s.id, s.category, s.title, s.created_at, s.updated_at,
                    (SELECT COUNT(*) FROM messages WHERE session_id = s.id) AS message_count
             FROM sessions s
             WHERE (?1 IS NULL OR s.category = ?1)
             ORDER BY s.updated_at DESC",
        )?;
        let rows = stmt
            .query_map(params![category], Self::map_session_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
        Ok(SessionRow {
            id: row.get(0)?,
            category: row.get(1)?,
            title: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
            message_count: row.get(5)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
