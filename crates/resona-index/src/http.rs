//! HTTP transport speaking the index service's REST protocol.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::{IndexError, IndexResult};
use crate::transport::{IndexTransport, PointRecord, ScoredPoint, TransportFactory};

/// Per-request timeout. Matches the bounded download timeout used
/// elsewhere in the pipeline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Wire types (private -- the REST API nests results under "result")
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CollectionsResponse {
    result: CollectionsResult,
}

#[derive(Debug, Deserialize)]
struct CollectionsResult {
    #[serde(default)]
    collections: Vec<CollectionDescription>,
}

#[derive(Debug, Deserialize)]
struct CollectionDescription {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPointWire>,
}

#[derive(Debug, Deserialize)]
struct ScoredPointWire {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct RetrieveResponse {
    #[serde(default)]
    result: Vec<RecordWire>,
}

#[derive(Debug, Deserialize)]
struct RecordWire {
    id: Value,
    #[serde(default)]
    vector: Option<Vec<f32>>,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

/// Point ids come back as either strings or integers.
fn id_to_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// A single connection handle over the service's REST API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> IndexResult<Self> {
        let http = Client::builder()
            .user_agent("resona/0.1.0 (https://github.com/oxur/resona)")
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(IndexError::from)?;
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self { http, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Map a non-success status to the error taxonomy, consuming the
    /// response body for the message.
    async fn check(response: reqwest::Response) -> IndexResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_else(|_| String::new());
        if status.is_server_error() {
            Err(IndexError::Unavailable {
                status: status.as_u16(),
                message,
            })
        } else {
            Err(IndexError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl IndexTransport for HttpTransport {
    async fn ping(&self) -> IndexResult<()> {
        let response = self.http.get(self.url("/collections")).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn list_collections(&self) -> IndexResult<Vec<String>> {
        let response = self.http.get(self.url("/collections")).send().await?;
        let parsed: CollectionsResponse = Self::check(response).await?.json().await?;
        Ok(parsed
            .result
            .collections
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    async fn create_collection(&self, name: &str, dim: usize) -> IndexResult<()> {
        let body = json!({
            "vectors": { "size": dim, "distance": "Cosine" }
        });
        let response = self
            .http
            .put(self.url(&format!("/collections/{name}")))
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> IndexResult<()> {
        let response = self
            .http
            .delete(self.url(&format!("/collections/{name}")))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn upsert(&self, collection: &str, point: PointRecord) -> IndexResult<()> {
        let body = json!({
            "points": [{
                "id": point.id,
                "vector": point.vector,
                "payload": point.payload,
            }]
        });
        let response = self
            .http
            .put(self.url(&format!("/collections/{collection}/points?wait=true")))
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: Vec<f32>,
        limit: usize,
        min_score: f32,
    ) -> IndexResult<Vec<ScoredPoint>> {
        let body = json!({
            "vector": query,
            "limit": limit,
            "score_threshold": min_score,
            "with_payload": true,
        });
        let response = self
            .http
            .post(self.url(&format!("/collections/{collection}/points/search")))
            .json(&body)
            .send()
            .await?;
        let parsed: SearchResponse = Self::check(response).await?.json().await?;
        Ok(parsed
            .result
            .into_iter()
            .map(|hit| ScoredPoint {
                id: id_to_string(&hit.id),
                score: hit.score,
                payload: hit.payload.unwrap_or_default(),
            })
            .collect())
    }

    async fn retrieve(
        &self,
        collection: &str,
        ids: Vec<String>,
        with_vectors: bool,
    ) -> IndexResult<Vec<PointRecord>> {
        let body = json!({
            "ids": ids,
            "with_payload": true,
            "with_vector": with_vectors,
        });
        let response = self
            .http
            .post(self.url(&format!("/collections/{collection}/points")))
            .json(&body)
            .send()
            .await?;
        let parsed: RetrieveResponse = Self::check(response).await?.json().await?;
        Ok(parsed
            .result
            .into_iter()
            .map(|record| PointRecord {
                id: id_to_string(&record.id),
                vector: record.vector,
                payload: record.payload.unwrap_or_default(),
            })
            .collect())
    }

    async fn delete_points(&self, collection: &str, ids: Vec<String>) -> IndexResult<()> {
        let body = json!({ "points": ids });
        let response = self
            .http
            .post(self.url(&format!(
                "/collections/{collection}/points/delete?wait=true"
            )))
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

/// Creates [`HttpTransport`] handles for a fixed service URL.
#[derive(Debug, Clone)]
pub struct HttpTransportFactory {
    base_url: String,
}

impl HttpTransportFactory {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl TransportFactory for HttpTransportFactory {
    async fn connect(&self) -> IndexResult<Arc<dyn IndexTransport>> {
        Ok(Arc::new(HttpTransport::new(self.base_url.clone())?))
    }
}
