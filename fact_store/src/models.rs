//! Row models for the fact store tables.
//!
//! All structs are Diesel-compatible (Queryable/Insertable/Selectable) for
//! SQLite. Total/"all" dimension values are encoded with fixed sentinels in
//! the fact tables so the natural-key unique indexes compare them as equal;
//! the sentinels are confined to this layer and [`crate::repo`].

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

/// Sentinel for "all ages" in `age_min`/`age_max`.
pub const AGE_ALL: i32 = -1;
/// Sentinel for annual (non-monthly) data in `month`.
pub const MONTH_ANNUAL: i32 = 0;
/// Sentinel for "all activities" in `nace_code`.
pub const NACE_ALL: &str = "";

/// A geographic region row. `code` is the stable natural key; name and
/// level are first-write-wins and never silently rewritten by later runs.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::regions)]
pub struct Region {
    /// Surrogate id.
    pub id: i32,
    /// Stable ISO/NUTS-style code, unique and immutable once created.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Hierarchy level (country/nuts1/nuts2/nuts3/city), if known.
    pub level: Option<String>,
    /// Weak reference to a parent region by code.
    pub parent_code: Option<String>,
}

/// Insertable form of [`Region`].
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::regions)]
pub struct NewRegion<'a> {
    /// Stable region code.
    pub code: &'a str,
    /// Display name.
    pub name: &'a str,
    /// Hierarchy level, if known.
    pub level: Option<&'a str>,
    /// Parent region code, if known.
    pub parent_code: Option<&'a str>,
}

/// A data source row. `last_updated` advances monotonically on each
/// successful ingestion and is never rolled back.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::data_sources)]
pub struct DataSource {
    /// Surrogate id.
    pub id: i32,
    /// Unique source name (usually the dataset id).
    pub name: String,
    /// Source type, e.g. "api" or "file".
    pub source_type: String,
    /// Last successful ingestion completion (UTC).
    pub last_updated: NaiveDateTime,
}

/// Insertable form of [`DataSource`].
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::data_sources)]
pub struct NewDataSource<'a> {
    /// Unique source name.
    pub name: &'a str,
    /// Source type.
    pub source_type: &'a str,
    /// Initial timestamp.
    pub last_updated: NaiveDateTime,
}

/// A raw payload snapshot: the append-only audit trail. One row per
/// successfully fetched page; never updated or deleted.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = crate::schema::raw_snapshots)]
pub struct RawSnapshot {
    /// Surrogate id.
    pub id: i32,
    /// Dataset the page belongs to.
    pub dataset_id: String,
    /// Zero-based page number within its fetch.
    pub page: i32,
    /// The exact query parameters used, as a JSON object.
    pub params_json: String,
    /// Retrieval timestamp (UTC).
    pub fetched_at: NaiveDateTime,
    /// Raw payload bytes, unmodified.
    pub payload: Vec<u8>,
    /// Lowercase hex SHA-256 of the payload.
    pub content_hash: String,
}

/// Insertable form of [`RawSnapshot`].
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::raw_snapshots)]
pub struct NewRawSnapshot<'a> {
    /// Dataset id.
    pub dataset_id: &'a str,
    /// Page number.
    pub page: i32,
    /// Query parameters as JSON.
    pub params_json: String,
    /// Retrieval timestamp.
    pub fetched_at: NaiveDateTime,
    /// Raw payload.
    pub payload: &'a [u8],
    /// Payload hash.
    pub content_hash: &'a str,
}

/// A demographic fact row (population by region/year/sex/age band).
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = crate::schema::demographic_facts)]
pub struct DemographicFact {
    /// Surrogate id.
    pub id: i32,
    /// Owning data source.
    pub source_id: i32,
    /// Region the fact applies to.
    pub region_id: i32,
    /// Reference year.
    pub year: i32,
    /// "M", "F", "O", or "Total".
    pub sex: String,
    /// Inclusive lower bound of the age band, or [`AGE_ALL`].
    pub age_min: i32,
    /// Exclusive upper bound of the age band, or [`AGE_ALL`] when open or
    /// total.
    pub age_max: i32,
    /// Population count.
    pub population: i64,
}

/// Insertable form of [`DemographicFact`].
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::demographic_facts)]
pub struct NewDemographicFact {
    /// Owning data source.
    pub source_id: i32,
    /// Region id.
    pub region_id: i32,
    /// Reference year.
    pub year: i32,
    /// Sex category.
    pub sex: String,
    /// Age band lower bound or sentinel.
    pub age_min: i32,
    /// Age band upper bound or sentinel.
    pub age_max: i32,
    /// Population count.
    pub population: i64,
}

/// An industrial fact row (index/level value by region/period/activity).
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = crate::schema::industrial_facts)]
pub struct IndustrialFact {
    /// Surrogate id.
    pub id: i32,
    /// Owning data source.
    pub source_id: i32,
    /// Region the fact applies to.
    pub region_id: i32,
    /// Reference year.
    pub year: i32,
    /// Month 1-12, or [`MONTH_ANNUAL`] for annual data.
    pub month: i32,
    /// NACE activity code, or [`NACE_ALL`].
    pub nace_code: String,
    /// Observation value (index or level).
    pub value: f64,
    /// Unit code as reported upstream (e.g. "I21", "GWH").
    pub unit: Option<String>,
}

/// Insertable form of [`IndustrialFact`].
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::industrial_facts)]
pub struct NewIndustrialFact {
    /// Owning data source.
    pub source_id: i32,
    /// Region id.
    pub region_id: i32,
    /// Reference year.
    pub year: i32,
    /// Month or sentinel.
    pub month: i32,
    /// NACE code or sentinel.
    pub nace_code: String,
    /// Observation value.
    pub value: f64,
    /// Unit code.
    pub unit: Option<String>,
}
