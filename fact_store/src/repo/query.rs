//! Read-side queries over the fact tables.
//!
//! Output rows carry region codes (joined in) rather than surrogate ids,
//! and sentinel dimension values are mapped back to `None` so callers never
//! see the storage encoding.

use diesel::prelude::*;
use diesel::SqliteConnection;
use serde::Serialize;

use crate::models::{AGE_ALL, MONTH_ANNUAL, NACE_ALL};
use crate::repo::StoreResult;
use crate::schema::demographic_facts::dsl as df;
use crate::schema::industrial_facts::dsl as inf;
use crate::schema::regions::dsl as r;

/// Optional filters shared by the fact queries. Absent fields match
/// everything.
#[derive(Debug, Default, Clone)]
pub struct FactFilters {
    /// Restrict to one region code.
    pub region_code: Option<String>,
    /// Inclusive lower bound on the reference year.
    pub year_from: Option<i32>,
    /// Inclusive upper bound on the reference year.
    pub year_to: Option<i32>,
    /// Restrict demographic facts to one sex category; ignored by the
    /// industrial query.
    pub sex: Option<String>,
    /// Restrict industrial facts to one NACE code; ignored by the
    /// demographic query.
    pub nace: Option<String>,
    /// Maximum number of rows to return.
    pub limit: Option<i64>,
}

/// List envelope: results plus the count of rows returned.
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    /// Number of entries in `data`.
    pub count: usize,
    /// The matching rows.
    pub data: Vec<T>,
}

impl<T> ListResponse<T> {
    fn from_rows(data: Vec<T>) -> Self {
        ListResponse {
            count: data.len(),
            data,
        }
    }
}

/// A demographic fact as presented to readers.
#[derive(Debug, Serialize)]
pub struct DemographicFactOut {
    /// Region code.
    pub region: String,
    /// Reference year.
    pub year: i32,
    /// Sex category.
    pub sex: String,
    /// Lower age bound, `None` for all ages.
    pub age_min: Option<i32>,
    /// Upper age bound (exclusive), `None` for open or all.
    pub age_max: Option<i32>,
    /// Population count.
    pub population: i64,
}

/// An industrial fact as presented to readers.
#[derive(Debug, Serialize)]
pub struct IndustrialFactOut {
    /// Region code.
    pub region: String,
    /// Reference year.
    pub year: i32,
    /// Month 1-12, `None` for annual data.
    pub month: Option<u32>,
    /// NACE activity code, `None` for all activities.
    pub nace_code: Option<String>,
    /// Observation value.
    pub value: f64,
    /// Unit code.
    pub unit: Option<String>,
}

fn none_if(sentinel: i32, v: i32) -> Option<i32> {
    (v != sentinel).then_some(v)
}

/// Queries demographic facts, ordered by region code then year.
pub fn query_demographics(
    conn: &mut SqliteConnection,
    filters: &FactFilters,
) -> StoreResult<ListResponse<DemographicFactOut>> {
    let mut query = df::demographic_facts
        .inner_join(r::regions)
        .select((
            r::code,
            df::year,
            df::sex,
            df::age_min,
            df::age_max,
            df::population,
        ))
        .order((r::code.asc(), df::year.asc()))
        .into_boxed();

    if let Some(code) = &filters.region_code {
        query = query.filter(r::code.eq(code.clone()));
    }
    if let Some(from) = filters.year_from {
        query = query.filter(df::year.ge(from));
    }
    if let Some(to) = filters.year_to {
        query = query.filter(df::year.le(to));
    }
    if let Some(sex) = &filters.sex {
        query = query.filter(df::sex.eq(sex.clone()));
    }
    if let Some(limit) = filters.limit {
        query = query.limit(limit);
    }

    let rows: Vec<(String, i32, String, i32, i32, i64)> = query.load(conn)?;
    let data = rows
        .into_iter()
        .map(
            |(region, year, sex, age_min, age_max, population)| DemographicFactOut {
                region,
                year,
                sex,
                age_min: none_if(AGE_ALL, age_min),
                age_max: none_if(AGE_ALL, age_max),
                population,
            },
        )
        .collect();
    Ok(ListResponse::from_rows(data))
}

/// Queries industrial facts, ordered by region code, year, then month.
pub fn query_industrial(
    conn: &mut SqliteConnection,
    filters: &FactFilters,
) -> StoreResult<ListResponse<IndustrialFactOut>> {
    let mut query = inf::industrial_facts
        .inner_join(r::regions)
        .select((
            r::code,
            inf::year,
            inf::month,
            inf::nace_code,
            inf::value,
            inf::unit,
        ))
        .order((r::code.asc(), inf::year.asc(), inf::month.asc()))
        .into_boxed();

    if let Some(code) = &filters.region_code {
        query = query.filter(r::code.eq(code.clone()));
    }
    if let Some(from) = filters.year_from {
        query = query.filter(inf::year.ge(from));
    }
    if let Some(to) = filters.year_to {
        query = query.filter(inf::year.le(to));
    }
    if let Some(nace) = &filters.nace {
        query = query.filter(inf::nace_code.eq(nace.clone()));
    }
    if let Some(limit) = filters.limit {
        query = query.limit(limit);
    }

    let rows: Vec<(String, i32, i32, String, f64, Option<String>)> = query.load(conn)?;
    let data = rows
        .into_iter()
        .map(|(region, year, month, nace_code, value, unit)| IndustrialFactOut {
            region,
            year,
            month: none_if(MONTH_ANNUAL, month).map(|m| m as u32),
            nace_code: (nace_code != NACE_ALL).then_some(nace_code),
            value,
            unit,
        })
        .collect();
    Ok(ListResponse::from_rows(data))
}

/// Summary figures over the facts matching a filter set.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatsSummary {
    /// Demographic fact rows.
    pub demographic_records: i64,
    /// Industrial fact rows.
    pub industrial_records: i64,
    /// Total fact rows across both families.
    pub total_records: i64,
    /// Inclusive year span covered by any matching fact, `None` when
    /// nothing matches.
    pub years_covered: Option<(i32, i32)>,
    /// Distinct regions referenced by the matching facts.
    pub region_count: i64,
}

fn demo_stats_filters<'a, ST>(
    mut q: crate::schema::demographic_facts::BoxedQuery<'a, diesel::sqlite::Sqlite, ST>,
    region_id: Option<i32>,
    filters: &FactFilters,
) -> crate::schema::demographic_facts::BoxedQuery<'a, diesel::sqlite::Sqlite, ST> {
    if let Some(id) = region_id {
        q = q.filter(df::region_id.eq(id));
    }
    if let Some(from) = filters.year_from {
        q = q.filter(df::year.ge(from));
    }
    if let Some(to) = filters.year_to {
        q = q.filter(df::year.le(to));
    }
    q
}

fn industrial_stats_filters<'a, ST>(
    mut q: crate::schema::industrial_facts::BoxedQuery<'a, diesel::sqlite::Sqlite, ST>,
    region_id: Option<i32>,
    filters: &FactFilters,
) -> crate::schema::industrial_facts::BoxedQuery<'a, diesel::sqlite::Sqlite, ST> {
    if let Some(id) = region_id {
        q = q.filter(inf::region_id.eq(id));
    }
    if let Some(from) = filters.year_from {
        q = q.filter(inf::year.ge(from));
    }
    if let Some(to) = filters.year_to {
        q = q.filter(inf::year.le(to));
    }
    q
}

/// Computes summary figures for the facts matching `filters`.
///
/// Only the region and year filters apply here; sex/NACE are query-side
/// refinements.
pub fn statistics(conn: &mut SqliteConnection, filters: &FactFilters) -> StoreResult<StatsSummary> {
    use std::collections::HashSet;

    use diesel::dsl::{count_star, max, min};

    // The fact tables carry region ids, so a code filter resolves to an id
    // up front; an unknown code matches nothing.
    let region_id = match &filters.region_code {
        Some(code) => match crate::repo::regions::find_by_code(conn, code)? {
            Some(region) => Some(region.id),
            None => {
                return Ok(StatsSummary {
                    demographic_records: 0,
                    industrial_records: 0,
                    total_records: 0,
                    years_covered: None,
                    region_count: 0,
                });
            }
        },
        None => None,
    };

    let demographic_records: i64 = demo_stats_filters(
        df::demographic_facts.select(count_star()).into_boxed(),
        region_id,
        filters,
    )
    .first(conn)?;
    let industrial_records: i64 = industrial_stats_filters(
        inf::industrial_facts.select(count_star()).into_boxed(),
        region_id,
        filters,
    )
    .first(conn)?;

    let demo_span: (Option<i32>, Option<i32>) = demo_stats_filters(
        df::demographic_facts
            .select((min(df::year), max(df::year)))
            .into_boxed(),
        region_id,
        filters,
    )
    .first(conn)?;
    let ind_span: (Option<i32>, Option<i32>) = industrial_stats_filters(
        inf::industrial_facts
            .select((min(inf::year), max(inf::year)))
            .into_boxed(),
        region_id,
        filters,
    )
    .first(conn)?;

    let lo = match (demo_span.0, ind_span.0) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    let hi = match (demo_span.1, ind_span.1) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };

    let mut region_ids: HashSet<i32> = HashSet::new();
    region_ids.extend(
        demo_stats_filters(
            df::demographic_facts
                .select(df::region_id)
                .distinct()
                .into_boxed(),
            region_id,
            filters,
        )
        .load::<i32>(conn)?,
    );
    region_ids.extend(
        industrial_stats_filters(
            inf::industrial_facts
                .select(inf::region_id)
                .distinct()
                .into_boxed(),
            region_id,
            filters,
        )
        .load::<i32>(conn)?,
    );

    Ok(StatsSummary {
        demographic_records,
        industrial_records,
        total_records: demographic_records + industrial_records,
        years_covered: lo.zip(hi),
        region_count: region_ids.len() as i64,
    })
}
