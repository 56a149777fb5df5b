//! # mnemo-store
//!
//! `SQLite` persistence for the continuity engine.
//!
//! - `memory_records`: append-only log; triggers reject deletes and any
//!   change other than `status`
//! - `sessions`: keyed session snapshots
//! - `session_summaries`: one row per `(session, tier)`, so re-delivered
//!   summarization work overwrites instead of duplicating
//! - `context_threads` / `thread_sessions`: cross-session grouping
//!
//! Connections come from an `r2d2` pool with WAL and foreign keys on. The
//! schema version lives in `PRAGMA user_version`.

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod migrations;
pub mod repositories;
pub mod store;

pub use connection::{ConnectionPool, Database, open_pool};
pub use errors::{Result, StoreError};
pub use migrations::run_migrations;
pub use store::ContinuityStore;
