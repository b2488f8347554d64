//! Ingestion orchestration: drives fetch, normalize, and persist per dataset.
//!
//! Each dataset run walks a small state machine (pending, fetching,
//! normalizing, persisting, then a terminal completed/failed/cancelled) and
//! commits one page at a time: the raw snapshot and the facts normalized
//! from it land in a single transaction, so a crash mid-run leaves whole
//! pages, never half a page. Runs for the same dataset are serialized by a
//! keyed lock; distinct datasets fan out over a bounded worker pool.

pub mod locks;
pub mod run;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use thiserror::Error;

pub use run::{Orchestrator, OrchestratorConfig};

/// Lifecycle of one dataset ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    /// Queued, nothing done yet.
    Pending,
    /// Requesting a page from the upstream.
    Fetching,
    /// Flattening and normalizing a fetched page.
    Normalizing,
    /// Writing a page's snapshot and facts.
    Persisting,
    /// All pages ingested; source timestamp advanced.
    Completed,
    /// Aborted on error; pages committed before the failure are kept.
    Failed,
    /// Stopped cooperatively; pages committed before the stop are kept.
    Cancelled,
}

impl RunState {
    /// True for the three states a run can end in.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Failed | RunState::Cancelled
        )
    }
}

/// Outcome summary for one dataset run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Dataset the run was for.
    pub dataset_id: String,
    /// Terminal state the run ended in.
    pub state: RunState,
    /// Pages committed (snapshot plus facts, atomically).
    pub pages_persisted: u32,
    /// Facts written across all committed pages.
    pub facts_upserted: usize,
    /// Records dropped as malformed across all pages.
    pub records_dropped: usize,
    /// Human-readable failure cause when `state` is `Failed`.
    pub error: Option<String>,
}

/// Errors that end a dataset run in `Failed`.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The dataset id is not in the registry.
    #[error(transparent)]
    Registry(#[from] stat_ingestor::registry::RegistryError),

    /// The upstream fetch failed (post-retry).
    #[error(transparent)]
    Source(#[from] stat_ingestor::providers::SourceError),

    /// A repository write or read failed.
    #[error(transparent)]
    Store(#[from] crate::repo::StoreError),

    /// The database could not be opened.
    #[error("database connection: {0}")]
    Connect(anyhow::Error),

    /// Another run held the dataset's lock past the wait budget.
    #[error("timed out waiting for the lock on dataset '{dataset_id}'")]
    LockTimeout {
        /// The contended dataset.
        dataset_id: String,
    },
}

/// Shared cooperative-cancellation flag, checked at page boundaries.
///
/// Cancellation never rolls back committed pages.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A fresh, unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of every run watching this flag.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
