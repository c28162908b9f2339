//! Pinecone-backed vector index implementation.
//!
//! Talks to the serverless REST API: collection lifecycle goes through the
//! control plane, record operations go to the per-collection data-plane
//! host. Hosts are cached after the first describe call.

use super::{IndexStatus, QueryMatch, VectorIndex, VectorRecord};
use crate::error::{BlikkError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, instrument};

/// Pinned wire API version.
const API_VERSION: &str = "2025-01";

/// Timeout for individual store calls.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Pinecone vector index client.
pub struct PineconeIndex {
    http: reqwest::Client,
    control_url: String,
    api_key: String,
    cloud: String,
    region: String,
    /// Data-plane host per collection, filled in lazily from describe calls.
    hosts: RwLock<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    name: String,
    host: Option<String>,
    #[serde(default)]
    status: DescribedStatus,
}

#[derive(Debug, Default, Deserialize)]
struct DescribedStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Debug, Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexDescription>,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
struct UpsertResponse {
    #[serde(rename = "upsertedCount", default)]
    upserted_count: usize,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct FetchResponse {
    #[serde(default)]
    vectors: HashMap<String, VectorRecord>,
}

#[derive(Debug, Deserialize)]
struct IndexStats {
    #[serde(default)]
    namespaces: HashMap<String, serde_json::Value>,
}

impl PineconeIndex {
    /// Create a new client against the given control-plane URL.
    pub fn new(control_url: &str, api_key: String) -> Result<Self> {
        url::Url::parse(control_url)
            .map_err(|e| BlikkError::Config(format!("Invalid control URL '{}': {}", control_url, e)))?;

        if api_key.is_empty() {
            return Err(BlikkError::Config(
                "Missing vector store API key (set PINECONE_API_KEY)".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            control_url: control_url.trim_end_matches('/').to_string(),
            api_key,
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            hosts: RwLock::new(HashMap::new()),
        })
    }

    /// Set the serverless cloud and region used when creating collections.
    pub fn with_spec(mut self, cloud: &str, region: &str) -> Self {
        self.cloud = cloud.to_string();
        self.region = region.to_string();
        self
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(BlikkError::VectorStore(format!("{}: {}", status, body)))
    }

    /// Resolve the data-plane base URL for a collection.
    async fn data_url(&self, index: &str) -> Result<String> {
        if let Some(host) = self.hosts.read().unwrap().get(index) {
            return Ok(host.clone());
        }

        let status = self.describe_index(index).await?;
        let host = status.host.ok_or_else(|| {
            BlikkError::VectorStore(format!("Collection '{}' has no host yet", index))
        })?;

        let base = if host.starts_with("http") {
            host
        } else {
            format!("https://{}", host)
        };
        self.hosts
            .write()
            .unwrap()
            .insert(index.to_string(), base.clone());
        Ok(base)
    }

    fn forget_host(&self, index: &str) {
        self.hosts.write().unwrap().remove(index);
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    #[instrument(skip(self))]
    async fn create_index(&self, name: &str, dimension: usize, metric: &str) -> Result<()> {
        let body = json!({
            "name": name,
            "dimension": dimension,
            "metric": metric,
            "spec": {
                "serverless": {
                    "cloud": self.cloud,
                    "region": self.region,
                }
            }
        });

        let response = self
            .request(reqwest::Method::POST, format!("{}/indexes", self.control_url))
            .json(&body)
            .send()
            .await?;

        // Someone else created it first; provisioning polls readiness anyway.
        if response.status() == reqwest::StatusCode::CONFLICT {
            debug!("Collection '{}' already exists", name);
            return Ok(());
        }

        Self::check(response).await?;
        Ok(())
    }

    async fn describe_index(&self, name: &str) -> Result<IndexStatus> {
        let response = self
            .request(
                reqwest::Method::GET,
                format!("{}/indexes/{}", self.control_url, name),
            )
            .send()
            .await?;
        let description: IndexDescription = Self::check(response).await?.json().await?;

        Ok(IndexStatus {
            ready: description.status.ready,
            host: description.host,
        })
    }

    async fn list_indexes(&self) -> Result<Vec<String>> {
        let response = self
            .request(reqwest::Method::GET, format!("{}/indexes", self.control_url))
            .send()
            .await?;
        let list: IndexList = Self::check(response).await?.json().await?;

        Ok(list.indexes.into_iter().map(|i| i.name).collect())
    }

    #[instrument(skip(self))]
    async fn delete_index(&self, name: &str) -> Result<()> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                format!("{}/indexes/{}", self.control_url, name),
            )
            .send()
            .await?;
        Self::check(response).await?;
        self.forget_host(name);
        Ok(())
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn upsert(
        &self,
        index: &str,
        namespace: &str,
        records: &[VectorRecord],
    ) -> Result<usize> {
        let base = self.data_url(index).await?;
        let body = UpsertRequest {
            vectors: records,
            namespace,
        };

        let response = self
            .request(reqwest::Method::POST, format!("{}/vectors/upsert", base))
            .json(&body)
            .send()
            .await?;
        let upserted: UpsertResponse = Self::check(response).await?.json().await?;

        debug!("Upserted {} vectors into {}/{}", upserted.upserted_count, index, namespace);
        Ok(upserted.upserted_count)
    }

    async fn query(
        &self,
        index: &str,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>> {
        let base = self.data_url(index).await?;
        let body = json!({
            "vector": vector,
            "topK": top_k,
            "namespace": namespace,
            "includeMetadata": true,
            "includeValues": false,
        });

        let response = self
            .request(reqwest::Method::POST, format!("{}/query", base))
            .json(&body)
            .send()
            .await?;
        let parsed: QueryResponse = Self::check(response).await?.json().await?;

        Ok(parsed.matches)
    }

    async fn fetch(
        &self,
        index: &str,
        namespace: &str,
        ids: &[String],
    ) -> Result<Vec<VectorRecord>> {
        let base = self.data_url(index).await?;
        let mut params: Vec<(&str, &str)> =
            ids.iter().map(|id| ("ids", id.as_str())).collect();
        params.push(("namespace", namespace));

        let response = self
            .request(reqwest::Method::GET, format!("{}/vectors/fetch", base))
            .query(&params)
            .send()
            .await?;
        let parsed: FetchResponse = Self::check(response).await?.json().await?;

        // Preserve the caller's id order.
        Ok(ids
            .iter()
            .filter_map(|id| parsed.vectors.get(id).cloned())
            .collect())
    }

    async fn list_namespaces(&self, index: &str) -> Result<Vec<String>> {
        let base = self.data_url(index).await?;
        let response = self
            .request(reqwest::Method::POST, format!("{}/describe_index_stats", base))
            .json(&json!({}))
            .send()
            .await?;
        let stats: IndexStats = Self::check(response).await?.json().await?;

        let mut names: Vec<String> = stats.namespaces.into_keys().collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_config() {
        assert!(PineconeIndex::new("not a url", "key".to_string()).is_err());
        assert!(PineconeIndex::new("https://api.pinecone.io", String::new()).is_err());
    }

    #[test]
    fn test_parses_index_list() {
        let raw = r#"{"indexes":[{"name":"a","host":"a.svc.pinecone.io","status":{"ready":true}},{"name":"b"}]}"#;
        let list: IndexList = serde_json::from_str(raw).unwrap();
        assert_eq!(list.indexes.len(), 2);
        assert!(list.indexes[0].status.ready);
        assert!(!list.indexes[1].status.ready);
    }

    #[test]
    fn test_parses_query_response() {
        let raw = r#"{"matches":[{"id":"video-1::3","score":0.92,"metadata":{"timestamp":1.5}}]}"#;
        let parsed: QueryResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.matches.len(), 1);
        assert_eq!(parsed.matches[0].timestamp(), Some(1.5));
    }
}
