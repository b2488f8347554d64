//! Persistent store and ingestion pipeline for harmonized statistics.
//!
//! This crate owns the SQLite schema (regions, data sources, raw snapshot
//! archive, and the two fact families), the descriptor-driven normalizer
//! that turns flattened upstream records into typed facts, the idempotent
//! repository layer, and the orchestrator that drives fetch, normalize,
//! and persist per dataset. Upstream access comes from the companion
//! `stat_ingestor` crate.

#![deny(missing_docs)]

pub mod db;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod repo;
#[allow(missing_docs)]
pub mod schema;
