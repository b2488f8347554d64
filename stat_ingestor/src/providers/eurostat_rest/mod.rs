//! Eurostat dissemination ("Statistics API") provider.
//!
//! Requests one dataset slice per page from
//! `https://ec.europa.eu/eurostat/api/dissemination/statistics/1.0/data/<id>`
//! with descriptor-driven query parameters, a shared per-host rate limiter,
//! and retry-with-backoff for transient failures.

mod params;
mod provider;
mod response;

pub use params::construct_params;
pub use provider::{EurostatConfig, EurostatProvider};
pub use response::{PageBody, parse_page};
