use crate::store::{PatternStore, StoreError};
use crate::workers_ai::{join_api_messages, ApiMessage};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct KeyEntry {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListKeysResponse {
    #[serde(default)]
    result: Vec<KeyEntry>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
}

/// Cloudflare Workers KV namespace accessed through the REST API.
///
/// KV enumerates keys in lexicographic order, which becomes the snapshot's
/// precedence order.
pub struct WorkersKvStore {
    client: Client,
    base_url: String,
    account_id: String,
    namespace_id: String,
    api_token: String,
}

impl WorkersKvStore {
    pub fn new(account_id: &str, namespace_id: &str, api_token: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: crate::workers_ai::DEFAULT_BASE_URL.to_string(),
            account_id: account_id.to_string(),
            namespace_id: namespace_id.to_string(),
            api_token: api_token.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn namespace_url(&self, tail: &[&str]) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| StoreError::Config(format!("bad base url: {e}")))?;
        {
            let mut segs = url
                .path_segments_mut()
                .map_err(|_| StoreError::Config(format!("base url cannot have a path: {}", self.base_url)))?;
            segs.pop_if_empty();
            segs.extend(["accounts", self.account_id.as_str(), "storage", "kv", "namespaces", self.namespace_id.as_str()]);
            segs.extend(tail);
        }
        Ok(url)
    }
}

#[async_trait]
impl PatternStore for WorkersKvStore {
    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut url = self.namespace_url(&["keys"])?;
            if let Some(c) = cursor.as_deref() {
                url.query_pairs_mut().append_pair("cursor", c);
            }
            let resp = self.client.get(url).bearer_auth(&self.api_token).send().await?;
            let status = resp.status();
            if !status.is_success() {
                let message = resp.text().await.unwrap_or_default();
                return Err(StoreError::Status { status: status.as_u16(), message });
            }
            let page: ListKeysResponse = resp.json().await?;
            if !page.success {
                return Err(StoreError::Http(join_api_messages(&page.errors)));
            }
            keys.extend(page.result.into_iter().map(|k| k.name));
            cursor = page.result_info.and_then(|i| i.cursor).filter(|c| !c.is_empty());
            if cursor.is_none() { break; }
        }
        debug!(keys = keys.len(), "listed kv namespace");
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let url = self.namespace_url(&["values", key])?;
        let resp = self.client.get(url).bearer_auth(&self.api_token).send().await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(resp.text().await?)),
            s => {
                let message = resp.text().await.unwrap_or_default();
                Err(StoreError::Status { status: s.as_u16(), message })
            }
        }
    }
}
