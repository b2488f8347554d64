//! Data source dimension table: get-or-create by name, monotonic
//! last-updated stamp.

use chrono::Utc;
use diesel::prelude::*;
use diesel::{SqliteConnection, insert_into};

use crate::models::{DataSource, NewDataSource};
use crate::repo::StoreResult;
use crate::schema::data_sources::dsl as s;

/// Returns the source with this name, creating it if absent.
pub fn get_or_create_source(
    conn: &mut SqliteConnection,
    name: &str,
    source_type: &str,
) -> StoreResult<DataSource> {
    if let Some(existing) = find_by_name(conn, name)? {
        return Ok(existing);
    }

    let row = NewDataSource {
        name,
        source_type,
        last_updated: Utc::now().naive_utc(),
    };
    insert_into(s::data_sources)
        .values(&row)
        .on_conflict(s::name)
        .do_nothing()
        .execute(conn)?;

    let created = s::data_sources
        .filter(s::name.eq(name))
        .select(DataSource::as_select())
        .first(conn)?;
    tracing::info!(name, source_type, "created data source");
    Ok(created)
}

/// Advances the source's `last_updated` to now.
///
/// Called only on successful ingestion completion, so the stamp moves
/// forward and is never rolled back by a failed run.
pub fn touch_source(conn: &mut SqliteConnection, source_id: i32) -> StoreResult<()> {
    diesel::update(s::data_sources.filter(s::id.eq(source_id)))
        .set(s::last_updated.eq(Utc::now().naive_utc()))
        .execute(conn)?;
    Ok(())
}

/// Looks up a source by name.
pub fn find_by_name(conn: &mut SqliteConnection, name: &str) -> StoreResult<Option<DataSource>> {
    let found = s::data_sources
        .filter(s::name.eq(name))
        .select(DataSource::as_select())
        .first(conn)
        .optional()?;
    Ok(found)
}

/// All sources ordered by name.
pub fn list_sources(conn: &mut SqliteConnection) -> StoreResult<Vec<DataSource>> {
    let rows = s::data_sources
        .order(s::name.asc())
        .select(DataSource::as_select())
        .load(conn)?;
    Ok(rows)
}
