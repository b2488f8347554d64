//! Idempotent fact persistence keyed on natural identity.
//!
//! Re-ingesting the same page must not duplicate facts: each fact table has
//! a unique index over its natural key (source, region, period, and the
//! family's breakdown axes) and inserts go through
//! `on_conflict(...).do_update()` so a replay refreshes the value in place.
//! Optional axes are stored as sentinels ([`AGE_ALL`], [`MONTH_ANNUAL`],
//! [`NACE_ALL`]) because SQLite unique indexes treat NULLs as distinct.

use diesel::prelude::*;
use diesel::{SqliteConnection, delete, insert_into};

use crate::models::{AGE_ALL, MONTH_ANNUAL, NACE_ALL, NewDemographicFact, NewIndustrialFact};
use crate::normalize::FactRecord;
use crate::repo::regions::get_or_create_region;
use crate::repo::{StoreError, StoreResult};
use crate::schema::data_sources::dsl as ds;
use crate::schema::demographic_facts::dsl as df;
use crate::schema::industrial_facts::dsl as inf;

/// Upserts a batch of normalized facts for one source, atomically.
///
/// Regions are resolved (created on first sight) per record. Returns the
/// number of facts written; conflicting rows have their value refreshed
/// rather than duplicated, so the count is the batch size on success.
///
/// The batch is one transaction (a savepoint when the caller already holds
/// one): a failure partway through leaves no facts and no regions from the
/// batch behind.
pub fn upsert_facts(
    conn: &mut SqliteConnection,
    source_id: i32,
    facts: &[FactRecord],
) -> StoreResult<usize> {
    conn.transaction(|conn| upsert_batch(conn, source_id, facts))
}

fn upsert_batch(
    conn: &mut SqliteConnection,
    source_id: i32,
    facts: &[FactRecord],
) -> StoreResult<usize> {
    let mut written = 0usize;

    for fact in facts {
        let region = fact.region();
        let region_row = get_or_create_region(conn, &region.code, &region.name, None, None)?;

        match fact {
            FactRecord::Demographic {
                year,
                sex,
                age_min,
                age_max,
                population,
                ..
            } => {
                let row = NewDemographicFact {
                    source_id,
                    region_id: region_row.id,
                    year: *year,
                    sex: sex.clone(),
                    age_min: age_min.unwrap_or(AGE_ALL),
                    age_max: age_max.unwrap_or(AGE_ALL),
                    population: *population,
                };
                insert_into(df::demographic_facts)
                    .values(&row)
                    .on_conflict((df::source_id, df::region_id, df::year, df::sex, df::age_min, df::age_max))
                    .do_update()
                    .set(df::population.eq(*population))
                    .execute(conn)?;
            }
            FactRecord::Industrial {
                year,
                month,
                nace,
                value,
                unit,
                ..
            } => {
                let row = NewIndustrialFact {
                    source_id,
                    region_id: region_row.id,
                    year: *year,
                    month: month.map(|m| m as i32).unwrap_or(MONTH_ANNUAL),
                    nace_code: nace.clone().unwrap_or_else(|| NACE_ALL.to_string()),
                    value: *value,
                    unit: unit.clone(),
                };
                insert_into(inf::industrial_facts)
                    .values(&row)
                    .on_conflict((inf::source_id, inf::region_id, inf::year, inf::month, inf::nace_code))
                    .do_update()
                    .set((inf::value.eq(*value), inf::unit.eq(unit.clone())))
                    .execute(conn)?;
            }
        }
        written += 1;
    }

    Ok(written)
}

/// Deletes every fact belonging to the named source.
///
/// The source row itself is kept, preserving its surrogate id and its
/// monotonic `last_updated` stamp, and raw snapshots are deliberately left
/// untouched: the archive is the audit trail and survives purges. Purging
/// an already-empty source removes zero facts.
///
/// Returns the number of fact rows removed.
pub fn delete_by_source(conn: &mut SqliteConnection, source_name: &str) -> StoreResult<usize> {
    conn.transaction(|conn| {
        let source_id: Option<i32> = ds::data_sources
            .filter(ds::name.eq(source_name))
            .select(ds::id)
            .first(conn)
            .optional()?;
        let Some(source_id) = source_id else {
            return Err(StoreError::NotFound(format!("source '{source_name}'")));
        };

        let mut removed = 0usize;
        removed += delete(df::demographic_facts.filter(df::source_id.eq(source_id))).execute(conn)?;
        removed += delete(inf::industrial_facts.filter(inf::source_id.eq(source_id))).execute(conn)?;
        Ok(removed)
    })
}
