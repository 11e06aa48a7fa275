//! `DesiredStateStore` over the etcd v2 keys API.
//!
//! Records live under `/v1/desired/<process_guid>` with the JSON recipe as the
//! value. Compare-and-set uses etcd's `prevExist` and `prevIndex` preconditions
//! and the node `modifiedIndex` as the record version.

use async_trait::async_trait;
use bulksync_core::{ProcessGuid, Recipe};
use bulksync_storage::{DesiredStateRecord, DesiredStateStore, StoreError, StoreVersion};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::EtcdConfig;
use crate::error::{ETCD_KEY_NOT_FOUND, EtcdApiError, EtcdError};

/// Key prefix for desired-state records.
pub const DESIRED_STATE_ROOT: &str = "/v1/desired";

const KEYS_PREFIX: [&str; 4] = ["v2", "keys", "v1", "desired"];

#[derive(Debug, Deserialize)]
struct KeysResponse {
    node: Node,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Node {
    key: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    dir: bool,
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    modified_index: u64,
}

/// etcd-backed desired-state store.
///
/// Requests go to the first cluster member that accepts a connection; members
/// that refuse or time out are skipped for that request.
#[derive(Debug, Clone)]
pub struct EtcdStore {
    http: reqwest::Client,
    members: Vec<Url>,
}

impl EtcdStore {
    /// Builds a store without contacting the cluster.
    pub fn new(config: &EtcdConfig) -> Result<Self, EtcdError> {
        if config.cluster.is_empty() {
            return Err(EtcdError::EmptyCluster);
        }

        let members = config
            .cluster
            .iter()
            .map(|address| parse_member(address))
            .collect::<Result<Vec<_>, _>>()?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self { http, members })
    }

    /// Builds a store and checks that at least one member answers.
    pub async fn connect(config: &EtcdConfig) -> Result<Self, StoreError> {
        let store = Self::new(config)?;
        store.probe().await?;
        Ok(store)
    }

    /// Checks cluster reachability via `GET /version`.
    pub async fn probe(&self) -> Result<(), StoreError> {
        let response = self
            .send(|member| self.http.get(version_url(member)))
            .await?;

        if response.status().is_success() {
            debug!(url = %response.url(), "etcd cluster reachable");
            Ok(())
        } else {
            Err(StoreError::unavailable(format!(
                "etcd version probe returned HTTP {}",
                response.status()
            )))
        }
    }

    /// Cluster members in the order they are tried.
    pub fn members(&self) -> &[Url] {
        &self.members
    }

    /// Sends a request to each member in turn until one accepts a connection.
    async fn send(
        &self,
        build: impl Fn(&Url) -> RequestBuilder,
    ) -> Result<Response, StoreError> {
        let mut last_error = None;
        for member in &self.members {
            match build(member).send().await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_connect() || e.is_timeout() => {
                    warn!(member = %member, error = %e, "etcd member unreachable");
                    last_error = Some(e);
                }
                Err(e) => return Err(StoreError::unavailable(e.to_string())),
            }
        }

        Err(StoreError::unavailable(match last_error {
            Some(e) => format!("no etcd member reachable: {e}"),
            None => "no etcd members configured".to_string(),
        }))
    }
}

#[async_trait]
impl DesiredStateStore for EtcdStore {
    async fn list(&self) -> Result<Vec<DesiredStateRecord>, StoreError> {
        let response = self
            .send(|member| {
                self.http
                    .get(member_url(member, &[]))
                    .query(&[("recursive", "true")])
            })
            .await?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                let api_error = read_api_error(response).await?;
                if api_error.error_code == ETCD_KEY_NOT_FOUND {
                    return Ok(Vec::new());
                }
                return Err(api_error.into_store_error(DESIRED_STATE_ROOT, None));
            }
            _ => return Err(error_from_response(response, DESIRED_STATE_ROOT, None).await),
        }

        let body: KeysResponse = response
            .json()
            .await
            .map_err(|e| StoreError::malformed(DESIRED_STATE_ROOT, e.to_string()))?;

        let mut leaves = Vec::new();
        collect_leaves(body.node, &mut leaves);

        let mut records = Vec::with_capacity(leaves.len());
        for node in leaves {
            let value = node.value.unwrap_or_default();
            match Recipe::from_slice(value.as_bytes()) {
                Ok(recipe) if key_for(&recipe.process_guid) == node.key => {
                    records.push(DesiredStateRecord::new(
                        recipe,
                        StoreVersion(node.modified_index),
                    ));
                }
                Ok(recipe) => {
                    warn!(
                        key = %node.key,
                        process_guid = %recipe.process_guid,
                        "desired state key does not match its recipe, skipping"
                    );
                }
                Err(e) => {
                    warn!(key = %node.key, error = %e, "undecodable desired state record, skipping");
                }
            }
        }

        Ok(records)
    }

    async fn upsert(
        &self,
        recipe: &Recipe,
        expected: Option<StoreVersion>,
    ) -> Result<StoreVersion, StoreError> {
        let guid = &recipe.process_guid;
        let key = key_for(guid);
        let value = recipe
            .to_canonical_bytes()
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or_else(|| StoreError::internal(format!("failed to encode recipe for {key}")))?;

        let response = self
            .send(|member| {
                let request = self
                    .http
                    .put(member_url(member, &[guid.as_str()]))
                    .form(&[("value", value.as_str())]);
                match expected {
                    None => request.query(&[("prevExist", "false")]),
                    Some(version) => request.query(&[("prevIndex", version.0.to_string())]),
                }
            })
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, &key, expected.map(|v| v.0)).await);
        }

        let body: KeysResponse = response
            .json()
            .await
            .map_err(|e| StoreError::malformed(key.as_str(), e.to_string()))?;
        Ok(StoreVersion(body.node.modified_index))
    }

    async fn delete(
        &self,
        process_guid: &ProcessGuid,
        expected: Option<StoreVersion>,
    ) -> Result<(), StoreError> {
        let key = key_for(process_guid);
        let response = self
            .send(|member| {
                let request = self
                    .http
                    .delete(member_url(member, &[process_guid.as_str()]));
                match expected {
                    None => request,
                    Some(version) => request.query(&[("prevIndex", version.0.to_string())]),
                }
            })
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                let api_error = read_api_error(response).await?;
                if api_error.error_code == ETCD_KEY_NOT_FOUND {
                    Ok(())
                } else {
                    Err(api_error.into_store_error(&key, expected.map(|v| v.0)))
                }
            }
            _ => Err(error_from_response(response, &key, expected.map(|v| v.0)).await),
        }
    }

    fn backend_name(&self) -> &'static str {
        "etcd"
    }
}

fn parse_member(address: &str) -> Result<Url, EtcdError> {
    let url = Url::parse(address).map_err(|e| EtcdError::invalid_address(address, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(EtcdError::invalid_address(address, "scheme must be http or https"));
    }
    if url.cannot_be_a_base() {
        return Err(EtcdError::invalid_address(address, "not a base URL"));
    }
    Ok(url)
}

/// Builds `<member>/v2/keys/v1/desired[/<segments>]`.
fn member_url(member: &Url, segments: &[&str]) -> Url {
    let mut url = member.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(KEYS_PREFIX).extend(segments);
    }
    url
}

/// Builds `<member>/version`.
fn version_url(member: &Url) -> Url {
    let mut url = member.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().push("version");
    }
    url
}

fn key_for(guid: &ProcessGuid) -> String {
    format!("{DESIRED_STATE_ROOT}/{guid}")
}

fn collect_leaves(node: Node, out: &mut Vec<Node>) {
    if node.dir {
        for child in node.nodes {
            collect_leaves(child, out);
        }
    } else {
        out.push(node);
    }
}

async fn read_api_error(response: Response) -> Result<EtcdApiError, StoreError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| StoreError::unavailable(e.to_string()))?;
    serde_json::from_str(&body)
        .map_err(|_| StoreError::internal(format!("etcd returned HTTP {status}: {body}")))
}

async fn error_from_response(response: Response, key: &str, expected: Option<u64>) -> StoreError {
    let status = response.status();
    if status.is_server_error() {
        return StoreError::unavailable(format!("etcd returned HTTP {status}"));
    }
    match read_api_error(response).await {
        Ok(api_error) => api_error.into_store_error(key, expected),
        Err(e) => e,
    }
}
