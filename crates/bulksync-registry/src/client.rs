//! HTTP client for the registry bulk listing endpoint.

use std::time::Duration;

use async_trait::async_trait;
use bulksync_core::ApplicationRecord;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::batch::{BulkToken, FetchBatch};
use crate::error::{FetchError, RegistryError};
use crate::fetcher::RegistryFetcher;

/// Connection settings for the registry bulk API.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub batch_size: u32,
    pub fetch_timeout: Duration,
    /// Disables TLS certificate verification.
    pub skip_cert_verify: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            password: String::new(),
            batch_size: 500,
            fetch_timeout: Duration::from_secs(30),
            skip_cert_verify: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    apps: Vec<ApplicationRecord>,
    #[serde(default)]
    token: Option<Value>,
}

/// Fetches pages from `GET <base>/internal/bulk/apps`.
#[derive(Debug, Clone)]
pub struct CcBulkFetcher {
    http: reqwest::Client,
    bulk_url: Url,
    username: String,
    password: String,
    batch_size: u32,
    fetch_timeout: Duration,
}

impl CcBulkFetcher {
    pub fn new(config: RegistryConfig) -> Result<Self, RegistryError> {
        let bulk_url = bulk_url(&config.base_url)?;

        if config.skip_cert_verify {
            warn!(url = %bulk_url, "TLS certificate verification disabled for registry");
        }

        let http = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .danger_accept_invalid_certs(config.skip_cert_verify)
            .build()?;

        Ok(Self {
            http,
            bulk_url,
            username: config.username,
            password: config.password,
            batch_size: config.batch_size.max(1),
            fetch_timeout: config.fetch_timeout,
        })
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    fn transport_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.fetch_timeout)
        } else if err.is_decode() {
            FetchError::Malformed(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl RegistryFetcher for CcBulkFetcher {
    async fn fetch_batch(&self, token: &BulkToken) -> Result<FetchBatch, FetchError> {
        let token_param =
            serde_json::to_string(&token.0).map_err(|e| FetchError::Malformed(e.to_string()))?;

        let response = self
            .http
            .get(self.bulk_url.clone())
            .basic_auth(&self.username, Some(&self.password))
            .query(&[
                ("batch_size", self.batch_size.to_string()),
                ("token", token_param),
            ])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(FetchError::from_status(
                status,
                String::from_utf8_lossy(&body).into_owned(),
            ));
        }

        let page: BulkResponse =
            serde_json::from_slice(&body).map_err(|e| FetchError::Malformed(e.to_string()))?;

        let last_page = page.apps.len() < self.batch_size as usize;
        let next = match page.token {
            Some(token) if !last_page && !token.is_null() => Some(BulkToken(token)),
            _ => None,
        };

        debug!(apps = page.apps.len(), last = next.is_none(), "fetched registry page");

        Ok(FetchBatch {
            records: page.apps,
            next,
        })
    }

    fn name(&self) -> &'static str {
        "cc-bulk"
    }
}

fn bulk_url(base_url: &str) -> Result<Url, RegistryError> {
    let mut url =
        Url::parse(base_url).map_err(|e| RegistryError::invalid_base_url(base_url, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(RegistryError::invalid_base_url(
            base_url,
            "scheme must be http or https",
        ));
    }
    url.path_segments_mut()
        .map_err(|()| RegistryError::invalid_base_url(base_url, "not a base URL"))?
        .pop_if_empty()
        .extend(["internal", "bulk", "apps"]);
    Ok(url)
}
