//! Schema migrations.
//!
//! Versioned, forward-only. Applied versions are recorded in
//! `schema_migrations`; re-running is a no-op.

use rusqlite::Connection;
use tracing::info;

use crate::errors::Result;

/// Ordered list of `(version, sql)` migrations.
const MIGRATIONS: &[(i64, &str)] = &[(
    1,
    "CREATE TABLE sessions (
         id         TEXT PRIMARY KEY,
         category   TEXT NOT NULL,
         title      TEXT,
         created_at TEXT NOT NULL,
         updated_at TEXT NOT NULL
     );
     CREATE TABLE messages (
         id         TEXT PRIMARY KEY,
         session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
         seq        INTEGER NOT NULL,
         role       TEXT NOT NULL,
         content    TEXT NOT NULL,
         created_at TEXT NOT NULL,
         UNIQUE (session_id, seq)
     );
     CREATE INDEX idx_messages_session_seq ON messages (session_id, seq);
     CREATE INDEX idx_sessions_category ON sessions (category, updated_at);",
)];

/// Run all pending migrations. Returns the number applied.
pub fn run_migrations(conn: &Connection) -> Result<u32> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
             version    INTEGER PRIMARY KEY,
             applied_at TEXT NOT NULL
         );",
    )?;

    let current: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    let mut applied = 0u32;
    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        let _ = tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![version, chrono::Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        applied += 1;
        info!(version, "migration applied");
    }
    Ok(applied)
}
