use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use reqwest::{Client, header};
use snafu::ResultExt;

use crate::jsonstat::is_empty_dataset;
use crate::models::{raw_page::RawPage, request::FetchRequest};
use crate::providers::{
    ClientBuildSnafu, DecodeSnafu, PageStream, ProviderInitError, SourceError, StatProvider,
    StatusSnafu, TransportSnafu,
};

use super::params::{construct_params, render_query};
use super::response::parse_page;

const BASE_URL: &str = "https://ec.europa.eu/eurostat/api/dissemination/statistics/1.0/data/";
const USER_AGENT: &str = "stat-ingestor (Eurostat crawler; contact: local-dev)";

/// Rate limiters shared per upstream host across every provider instance,
/// so fan-out ingestion of many datasets never exceeds one host's tolerated
/// request rate. The first registration fixes a host's interval.
static HOST_LIMITERS: Lazy<Mutex<HashMap<String, Arc<DefaultDirectRateLimiter>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn limiter_for_host(host: &str, min_interval: Duration) -> Option<Arc<DefaultDirectRateLimiter>> {
    let quota = Quota::with_period(min_interval)?;
    let mut limiters = HOST_LIMITERS.lock().unwrap_or_else(|e| e.into_inner());
    Some(
        limiters
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(RateLimiter::direct(quota)))
            .clone(),
    )
}

/// Tuning knobs for the Eurostat client.
#[derive(Clone, Debug)]
pub struct EurostatConfig {
    /// API root; dataset ids are appended to it.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retries after the initial attempt, for transient failures only.
    pub max_retries: u32,
    /// Base backoff delay, doubled on each retry.
    pub retry_backoff: Duration,
    /// Minimum interval between requests to this host. Zero disables
    /// rate limiting (tests).
    pub min_interval: Duration,
}

impl Default for EurostatConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
            min_interval: Duration::from_millis(250),
        }
    }
}

/// Source client for the Eurostat dissemination API.
pub struct EurostatProvider {
    client: Client,
    cfg: EurostatConfig,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl EurostatProvider {
    /// Creates a provider with default tuning.
    pub fn new() -> Result<Self, ProviderInitError> {
        Self::with_config(EurostatConfig::default())
    }

    /// Creates a provider with explicit tuning.
    pub fn with_config(cfg: EurostatConfig) -> Result<Self, ProviderInitError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(cfg.timeout)
            .build()
            .context(ClientBuildSnafu)?;

        let host = reqwest::Url::parse(&cfg.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| cfg.base_url.clone());
        let limiter = limiter_for_host(&host, cfg.min_interval);

        Ok(Self {
            client,
            cfg,
            limiter,
        })
    }

    /// Issues one GET for one page, applying the shared rate limit and
    /// retrying transient failures with exponential backoff.
    async fn fetch_bytes(
        &self,
        dataset_id: &str,
        params: &IndexMap<String, String>,
    ) -> Result<Vec<u8>, SourceError> {
        let url = format!("{}{}", self.cfg.base_url, dataset_id);
        let pairs: Vec<(&str, &str)> = params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let rendered = render_query(params);

        let mut attempt: u32 = 0;
        loop {
            if let Some(limiter) = &self.limiter {
                limiter.until_ready().await;
            }

            match self.client.get(&url).query(&pairs).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let bytes = resp.bytes().await.context(TransportSnafu {
                            query: rendered.clone(),
                        })?;
                        return Ok(bytes.to_vec());
                    }
                    let code = status.as_u16();
                    let transient = code == 429 || status.is_server_error();
                    if !transient || attempt >= self.cfg.max_retries {
                        return StatusSnafu {
                            status: code,
                            query: rendered,
                        }
                        .fail();
                    }
                    tracing::warn!(
                        dataset_id,
                        status = code,
                        attempt = attempt + 1,
                        "transient upstream status, backing off"
                    );
                }
                Err(source) => {
                    // Builder errors (malformed URL) cannot heal on retry.
                    let transient = !source.is_builder();
                    if !transient || attempt >= self.cfg.max_retries {
                        return Err(source).context(TransportSnafu { query: rendered });
                    }
                    tracing::warn!(
                        dataset_id,
                        error = %source,
                        attempt = attempt + 1,
                        "request failed, backing off"
                    );
                }
            }

            let delay = self.cfg.retry_backoff * 2u32.saturating_pow(attempt);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl StatProvider for EurostatProvider {
    fn pages<'a>(&'a self, request: FetchRequest) -> Box<dyn PageStream + 'a> {
        Box::new(EurostatPager {
            page: request.start_page,
            provider: self,
            request,
            done: false,
        })
    }

    fn source_type(&self) -> &'static str {
        "api"
    }
}

struct EurostatPager<'a> {
    provider: &'a EurostatProvider,
    request: FetchRequest,
    page: u32,
    done: bool,
}

#[async_trait]
impl PageStream for EurostatPager<'_> {
    async fn next_page(&mut self) -> Result<Option<RawPage>, SourceError> {
        if self.done {
            return Ok(None);
        }

        let dataset_id = self.request.descriptor.id.clone();
        let params = construct_params(&self.request, self.page);
        let body = self.provider.fetch_bytes(&dataset_id, &params).await?;

        let parsed = parse_page(&body).map_err(|e| {
            DecodeSnafu {
                dataset_id: dataset_id.clone(),
                page: self.page,
                message: e.to_string(),
            }
            .build()
        })?;

        // Empty dataset is the second end-of-data signal next to a missing
        // continuation token.
        if is_empty_dataset(&parsed.dataset) {
            self.done = true;
            return Ok(None);
        }
        if parsed.next_page_token.is_none() {
            self.done = true;
        }

        let raw = RawPage::new(dataset_id, self.page, params, body);
        self.page += 1;
        Ok(Some(raw))
    }
}
