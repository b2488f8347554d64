//! Repository: the only owner of persisted state.
//!
//! Everything downstream of ingestion (CLI inspection, an API layer) reads
//! through [`query`]; everything upstream writes through the idempotent
//! upsert and get-or-create operations here. Natural-key upserts make
//! re-ingestion of the same upstream slice overwrite rather than duplicate.

pub mod facts;
pub mod query;
pub mod regions;
pub mod snapshots;
pub mod sources;

use thiserror::Error;

/// Errors raised by repository operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database operation failed.
    #[error("database error: {0}")]
    Diesel(#[from] diesel::result::Error),

    /// A natural-key conflict escaped the upsert semantics. This is a
    /// programming-invariant violation; it is surfaced, not retried.
    #[error("natural-key conflict outside upsert semantics: {0}")]
    Conflict(String),

    /// A named entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Convenience alias for repository results.
pub type StoreResult<T> = Result<T, StoreError>;
