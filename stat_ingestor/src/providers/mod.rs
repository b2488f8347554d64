//! Source client abstraction for upstream statistics data.
//!
//! This module defines the [`StatProvider`] trait, the unified interface for
//! fetching paged raw data from any statistics source, and the
//! [`PageStream`] pager it hands out. Each concrete provider (the Eurostat
//! dissemination API, or a directory of staged files) implements its own
//! page retrieval behind these traits; [`provider_for_location`] picks one
//! from a source location string.
//!
//! The traits are object-safe (`dyn StatProvider`) so the orchestrator can
//! select a provider at runtime and tests can substitute scripted fakes.

pub mod eurostat_rest;
pub mod file_source;

use std::sync::Arc;

use async_trait::async_trait;
use snafu::{Backtrace, Snafu};

use crate::models::{raw_page::RawPage, request::FetchRequest};
use crate::providers::eurostat_rest::{EurostatConfig, EurostatProvider};
use crate::providers::file_source::FileProvider;

/// A restartable, lazy sequence of raw pages for one dataset.
///
/// Each call issues at most one upstream request. Returning `Ok(None)`
/// signals end-of-data; after that the stream keeps returning `Ok(None)`.
#[async_trait]
pub trait PageStream: Send {
    /// Fetches the next page, or `None` when the upstream is exhausted.
    async fn next_page(&mut self) -> Result<Option<RawPage>, SourceError>;
}

/// Trait for fetching paged raw statistical data from an upstream API.
///
/// A pager built from a request with `start_page = n` re-issues the request
/// for page `n` only, so a failed run can be resumed without refetching
/// earlier pages.
pub trait StatProvider: Send + Sync {
    /// Builds a pager over the dataset described by `request`.
    fn pages<'a>(&'a self, request: FetchRequest) -> Box<dyn PageStream + 'a>;

    /// How data is obtained ("api" or "file"), recorded on the source row.
    fn source_type(&self) -> &'static str;
}

/// Picks a provider from a source location.
///
/// `None` means the default Eurostat API. An `http(s)` URL gets the REST
/// client with that URL as its API root; anything else is taken as a
/// directory of staged page files.
pub fn provider_for_location(
    location: Option<&str>,
) -> Result<Arc<dyn StatProvider>, ProviderInitError> {
    match location {
        None => Ok(Arc::new(EurostatProvider::new()?)),
        Some(loc) if loc.starts_with("http://") || loc.starts_with("https://") => {
            let mut base_url = loc.to_string();
            if !base_url.ends_with('/') {
                base_url.push('/');
            }
            let cfg = EurostatConfig {
                base_url,
                ..EurostatConfig::default()
            };
            Ok(Arc::new(EurostatProvider::with_config(cfg)?))
        }
        Some(dir) => Ok(Arc::new(FileProvider::new(dir))),
    }
}

/// Errors that can occur during the creation of a provider instance.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// Failed to build the underlying HTTP client.
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },
}

/// Errors raised while fetching from an upstream statistics API.
///
/// Transient variants have already been retried by the time they surface;
/// every variant fails the affected dataset's run (and only that run).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SourceError {
    /// The request could not be sent or the response body not read.
    #[snafu(display("request failed for {query}: {source}"))]
    Transport {
        source: reqwest::Error,
        query: String,
        backtrace: Backtrace,
    },

    /// The upstream answered with a failure status, retries exhausted for
    /// transient statuses.
    #[snafu(display("upstream returned HTTP {status} for {query}"))]
    Status {
        status: u16,
        query: String,
        backtrace: Backtrace,
    },

    /// A page body was not valid JSON / JSON-stat. Aborts the fetch for the
    /// dataset; pages already handed out stay valid.
    #[snafu(display("malformed page {page} of {dataset_id}: {message}"))]
    Decode {
        dataset_id: String,
        page: u32,
        message: String,
        backtrace: Backtrace,
    },

    /// A staged page file could not be read.
    #[snafu(display("failed to read {path}: {source}"))]
    Io {
        path: String,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// An internal invariant was violated inside the provider.
    #[snafu(display("internal provider error: {message}"))]
    Internal {
        message: String,
        backtrace: Backtrace,
    },
}

impl SourceError {
    /// True for failures that may succeed on a later whole-run retry.
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Transport { .. } => true,
            SourceError::Status { status, .. } => *status == 429 || *status >= 500,
            SourceError::Decode { .. } | SourceError::Io { .. } | SourceError::Internal { .. } => {
                false
            }
        }
    }
}
