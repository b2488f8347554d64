//! Region dimension table: get-or-create by stable code.

use diesel::prelude::*;
use diesel::{SqliteConnection, insert_into};

use crate::models::{NewRegion, Region};
use crate::repo::StoreResult;
use crate::schema::regions::dsl as r;

/// Returns the region with this code, creating it if absent.
///
/// First-write-wins: if the code already exists, the stored name and level
/// are returned untouched even when the caller passes different ones. A
/// later ingestion never silently rewrites region metadata.
pub fn get_or_create_region(
    conn: &mut SqliteConnection,
    code: &str,
    name: &str,
    level: Option<&str>,
    parent_code: Option<&str>,
) -> StoreResult<Region> {
    if let Some(existing) = find_by_code(conn, code)? {
        return Ok(existing);
    }

    let row = NewRegion {
        code,
        name,
        level,
        parent_code,
    };
    // do_nothing keeps a concurrent creator's row; the re-select below
    // returns whichever write won.
    insert_into(r::regions)
        .values(&row)
        .on_conflict(r::code)
        .do_nothing()
        .execute(conn)?;

    let created = r::regions
        .filter(r::code.eq(code))
        .select(Region::as_select())
        .first(conn)?;
    tracing::debug!(code, name, "region ensured");
    Ok(created)
}

/// Looks up a region by code.
pub fn find_by_code(conn: &mut SqliteConnection, code: &str) -> StoreResult<Option<Region>> {
    let found = r::regions
        .filter(r::code.eq(code))
        .select(Region::as_select())
        .first(conn)
        .optional()?;
    Ok(found)
}

/// All regions ordered by code.
pub fn list_regions(conn: &mut SqliteConnection) -> StoreResult<Vec<Region>> {
    let rows = r::regions
        .order(r::code.asc())
        .select(Region::as_select())
        .load(conn)?;
    Ok(rows)
}
