//! Upstream-facing half of the statistics pipeline.
//!
//! This crate owns everything that talks to, or decodes payloads from, the
//! Eurostat dissemination API: the dataset descriptor registry, the
//! rate-limited and retrying source client, and JSON-stat 2.0 flattening.
//! It holds no persistent state; the `fact_store` crate consumes its output.

pub mod jsonstat;
pub mod models;
pub mod providers;
pub mod registry;
