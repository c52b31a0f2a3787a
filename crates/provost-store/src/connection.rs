//! SQLite connection pooling and pragmas.

use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;

use crate::errors::Result;

/// Pool of SQLite connections.
pub type ConnectionPool = r2d2::Pool<SqliteConnectionManager>;
/// One checked-out connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Pool construction options.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Maximum pool size.
    pub max_size: u32,
    /// SQLite busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_size: 8,
            busy_timeout_ms: 5000,
        }
    }
}

fn init_pragmas(busy_timeout_ms: u32) -> impl Fn(&mut rusqlite::Connection) -> rusqlite::Result<()>
{
    move |conn| {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = {busy_timeout_ms};"
        ))
    }
}

/// Open a pool backed by a database file.
pub fn new_pool(path: &Path, config: &ConnectionConfig) -> Result<ConnectionPool> {
    let manager =
        SqliteConnectionManager::file(path).with_init(init_pragmas(config.busy_timeout_ms));
    Ok(r2d2::Pool::builder()
        .max_size(config.max_size)
        .build(manager)?)
}

/// Open a single-connection in-memory pool (tests and ephemeral runs).
///
/// In-memory SQLite databases are per-connection, so the pool is pinned to
/// one connection — handing out a second would silently hand out an empty
/// database.
pub fn new_in_memory(config: &ConnectionConfig) -> Result<ConnectionPool> {
    let manager = SqliteConnectionManager::memory().with_init(init_pragmas(config.busy_timeout_ms));
    Ok(r2d2::Pool::builder().max_size(1).build(manager)?)
}
