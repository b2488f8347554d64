//! The dataset run driver and the multi-dataset worker pool.

use std::sync::Arc;
use std::time::Duration;

use diesel::Connection;
use diesel::SqliteConnection;
use indexmap::IndexMap;
use serde_json::Value;
use stat_ingestor::jsonstat::{self, FlatRecord};
use stat_ingestor::models::{raw_page::RawPage, request::FetchRequest};
use stat_ingestor::providers::{DecodeSnafu, PageStream, SourceError, StatProvider};
use stat_ingestor::registry::DatasetRegistry;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::db::connect_sqlite;
use crate::normalize::{self, DropStats};
use crate::pipeline::locks::DatasetLocks;
use crate::pipeline::{CancelFlag, IngestError, RunReport, RunState};
use crate::repo::{facts, snapshots, sources};

/// Knobs for the orchestrator; the defaults suit a CLI batch run.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// How long a run waits for its dataset's lock before failing.
    pub lock_wait: Duration,
    /// Upper bound on datasets ingested at once by [`Orchestrator::run_all`].
    pub max_concurrency: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            lock_wait: Duration::from_secs(30),
            max_concurrency: 4,
        }
    }
}

/// Drives ingestion runs: one per dataset, serialized per dataset id,
/// fanned out across datasets.
#[derive(Clone)]
pub struct Orchestrator {
    provider: Arc<dyn StatProvider>,
    registry: Arc<DatasetRegistry>,
    database_url: String,
    locks: Arc<DatasetLocks>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Builds an orchestrator over the given provider and registry.
    pub fn new(
        provider: Arc<dyn StatProvider>,
        registry: DatasetRegistry,
        database_url: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            registry: Arc::new(registry),
            database_url: database_url.into(),
            locks: Arc::new(DatasetLocks::new()),
            config: OrchestratorConfig::default(),
        }
    }

    /// Replaces the default configuration.
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Ingests one dataset end to end and reports the outcome.
    ///
    /// Never panics and never returns `Err`: every failure mode is folded
    /// into the report so a multi-dataset run can keep going.
    pub async fn run_dataset(
        &self,
        dataset_id: &str,
        overrides: &IndexMap<String, String>,
        cancel: &CancelFlag,
    ) -> RunReport {
        let mut report = RunReport {
            dataset_id: dataset_id.to_string(),
            state: RunState::Pending,
            pages_persisted: 0,
            facts_upserted: 0,
            records_dropped: 0,
            error: None,
        };

        match self.drive(dataset_id, overrides, cancel, &mut report).await {
            Ok(()) => {}
            Err(err) => {
                tracing::error!(dataset_id, error = %err, "ingestion run failed");
                report.state = RunState::Failed;
                report.error = Some(err.to_string());
            }
        }
        report
    }

    async fn drive(
        &self,
        dataset_id: &str,
        overrides: &IndexMap<String, String>,
        cancel: &CancelFlag,
        report: &mut RunReport,
    ) -> Result<(), IngestError> {
        let descriptor = self.registry.lookup(dataset_id)?.clone();
        let _guard = self.locks.acquire(&descriptor.id, self.config.lock_wait).await?;

        let mut conn = connect_sqlite(&self.database_url).map_err(IngestError::Connect)?;
        let source =
            sources::get_or_create_source(&mut conn, &descriptor.id, self.provider.source_type())?;

        let mut request = FetchRequest::for_descriptor(&descriptor);
        for (key, value) in overrides {
            request = request.with_param(key.clone(), value.clone());
        }

        tracing::info!(dataset_id = %descriptor.id, "starting ingestion run");
        let mut pager = self.provider.pages(request);

        loop {
            if cancel.is_cancelled() {
                tracing::info!(dataset_id = %descriptor.id, "run cancelled");
                report.state = RunState::Cancelled;
                return Ok(());
            }

            report.state = RunState::Fetching;
            let Some(page) = pager.next_page().await? else {
                break;
            };

            report.state = RunState::Normalizing;
            let records = decode_records(&page)?;
            let (batch, drops) = normalize::normalize_batch(&records, &descriptor);
            log_drops(&descriptor.id, page.page, &drops);
            report.records_dropped += drops.dropped;

            report.state = RunState::Persisting;
            let written = persist_page(&mut conn, source.id, &page, &batch)?;
            report.pages_persisted += 1;
            report.facts_upserted += written;
            tracing::debug!(
                dataset_id = %descriptor.id,
                page = page.page,
                facts = written,
                "page committed"
            );
        }

        sources::touch_source(&mut conn, source.id)?;
        report.state = RunState::Completed;
        tracing::info!(
            dataset_id = %descriptor.id,
            pages = report.pages_persisted,
            facts = report.facts_upserted,
            dropped = report.records_dropped,
            "ingestion run completed"
        );
        Ok(())
    }

    /// Ingests every named dataset concurrently, bounded by
    /// `max_concurrency`, and returns one report per dataset in input order.
    pub async fn run_all(&self, dataset_ids: &[String], cancel: &CancelFlag) -> Vec<RunReport> {
        let pool = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut tasks: JoinSet<(usize, RunReport)> = JoinSet::new();

        for (index, dataset_id) in dataset_ids.iter().enumerate() {
            let this = self.clone();
            let pool = Arc::clone(&pool);
            let cancel = cancel.clone();
            let dataset_id = dataset_id.clone();
            tasks.spawn(async move {
                // Closed only when the JoinSet is dropped, which aborts us
                // first.
                let _permit = pool.acquire_owned().await;
                let report = this
                    .run_dataset(&dataset_id, &IndexMap::new(), &cancel)
                    .await;
                (index, report)
            });
        }

        let mut reports: Vec<Option<RunReport>> = (0..dataset_ids.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            if let Ok((index, report)) = joined {
                reports[index] = Some(report);
            }
        }

        reports
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| RunReport {
                    dataset_id: dataset_ids[index].clone(),
                    state: RunState::Failed,
                    pages_persisted: 0,
                    facts_upserted: 0,
                    records_dropped: 0,
                    error: Some("worker task panicked".to_string()),
                })
            })
            .collect()
    }
}

/// Decodes a raw page body into flattened records.
///
/// Accepts either the `{ "data": <json-stat> }` transport envelope or a
/// bare JSON-stat root.
fn decode_records(page: &RawPage) -> Result<Vec<FlatRecord>, SourceError> {
    let root: Value = serde_json::from_slice(&page.body).map_err(|err| {
        DecodeSnafu {
            dataset_id: page.dataset_id.clone(),
            page: page.page,
            message: err.to_string(),
        }
        .build()
    })?;
    let dataset = root.get("data").unwrap_or(&root);
    jsonstat::flatten(dataset).map_err(|err| {
        DecodeSnafu {
            dataset_id: page.dataset_id.clone(),
            page: page.page,
            message: err.to_string(),
        }
        .build()
    })
}

fn log_drops(dataset_id: &str, page: u32, drops: &DropStats) {
    if drops.dropped > 0 {
        tracing::warn!(
            dataset_id,
            page,
            input = drops.input,
            kept = drops.kept,
            dropped = drops.dropped,
            "dropped malformed records"
        );
    }
}

/// Commits one page atomically: the raw snapshot and its facts land
/// together or not at all.
fn persist_page(
    conn: &mut SqliteConnection,
    source_id: i32,
    page: &RawPage,
    batch: &[normalize::FactRecord],
) -> Result<usize, IngestError> {
    let written = conn.transaction(|conn| {
        snapshots::archive_snapshot(conn, page)?;
        facts::upsert_facts(conn, source_id, batch)
    })?;
    Ok(written)
}
