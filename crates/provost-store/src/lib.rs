//! # provost-store
//!
//! Durable, append-only session and message log on SQLite.
//!
//! The store owns the persistence side of the loop invariants: message
//! order is total and append-only, and per-session write locks plus a
//! `UNIQUE(session_id, seq)` constraint keep concurrent writers from
//! corrupting the order.
//!
//! ## Crate Position
//!
//! Depends on `provost-core` for the message vocabulary. Used by the
//! runtime (the orchestration loop) and the server (history reads).

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod migrations;
pub mod store;

pub use connection::{ConnectionConfig, ConnectionPool, new_in_memory, new_pool};
pub use errors::{Result, StoreError};
pub use migrations::run_migrations;
pub use store::{SessionRow, SessionStore};
