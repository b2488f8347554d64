//! Raw snapshot archive: append-only provenance writes.

use diesel::prelude::*;
use diesel::{SqliteConnection, insert_into};
use stat_ingestor::models::raw_page::RawPage;

use crate::models::{NewRawSnapshot, RawSnapshot};
use crate::repo::StoreResult;
use crate::schema::raw_snapshots::dsl as rs;

/// Archives one fetched page, byte-for-byte.
///
/// Append-only: duplicate content on re-runs is expected and harmless; the
/// archive is the audit trail and is never updated or deleted.
pub fn archive_snapshot(conn: &mut SqliteConnection, page: &RawPage) -> StoreResult<()> {
    let params_json =
        serde_json::to_string(&page.params).unwrap_or_else(|_| "{}".to_string());
    let row = NewRawSnapshot {
        dataset_id: &page.dataset_id,
        page: page.page as i32,
        params_json,
        fetched_at: page.fetched_at.naive_utc(),
        payload: &page.body,
        content_hash: &page.content_hash,
    };
    insert_into(rs::raw_snapshots).values(&row).execute(conn)?;
    Ok(())
}

/// Number of archived snapshots, optionally for one dataset.
pub fn snapshot_count(conn: &mut SqliteConnection, dataset_id: Option<&str>) -> StoreResult<i64> {
    let count = match dataset_id {
        Some(id) => rs::raw_snapshots
            .filter(rs::dataset_id.eq(id))
            .count()
            .get_result(conn)?,
        None => rs::raw_snapshots.count().get_result(conn)?,
    };
    Ok(count)
}

/// Snapshots for one dataset, newest first, for audit inspection.
pub fn snapshots_for_dataset(
    conn: &mut SqliteConnection,
    dataset_id: &str,
) -> StoreResult<Vec<RawSnapshot>> {
    let rows = rs::raw_snapshots
        .filter(rs::dataset_id.eq(dataset_id))
        .order(rs::fetched_at.desc())
        .select(RawSnapshot::as_select())
        .load(conn)?;
    Ok(rows)
}
