//! Database utilities for connections and schema migrations.
//!
//! - [`connection::connect_sqlite`] opens a tuned SQLite connection (WAL,
//!   foreign_keys=ON, 5000ms busy_timeout).
//! - [`migrate::run_pending`] applies the embedded Diesel migrations.
//!
//! Reads from the query surface run concurrently with ingestion under WAL
//! and accept eventually-consistent results.

pub mod connection;
pub mod migrate;

pub use connection::connect_sqlite;
pub use migrate::run_pending;
