//! Transport seam between the client facade and the wire protocol.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::IndexResult;

/// A point stored in (or retrieved from) a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    pub id: String,
    #[serde(default)]
    pub vector: Option<Vec<f32>>,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

/// One nearest-neighbor hit, with similarity score and payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

/// One live connection handle to the index service.
///
/// Implementations perform single network calls with no retry of their
/// own; resilience lives in [`VectorIndex`].
///
/// [`VectorIndex`]: crate::client::VectorIndex
#[async_trait]
pub trait IndexTransport: Send + Sync {
    /// Lightweight liveness round-trip.
    async fn ping(&self) -> IndexResult<()>;

    async fn list_collections(&self) -> IndexResult<Vec<String>>;

    async fn create_collection(&self, name: &str, dim: usize) -> IndexResult<()>;

    async fn delete_collection(&self, name: &str) -> IndexResult<()>;

    async fn upsert(&self, collection: &str, point: PointRecord) -> IndexResult<()>;

    async fn search(
        &self,
        collection: &str,
        query: Vec<f32>,
        limit: usize,
        min_score: f32,
    ) -> IndexResult<Vec<ScoredPoint>>;

    /// Fetch points by id. `with_vectors` controls whether vector
    /// payloads are transferred; existence checks omit them.
    async fn retrieve(
        &self,
        collection: &str,
        ids: Vec<String>,
        with_vectors: bool,
    ) -> IndexResult<Vec<PointRecord>>;

    async fn delete_points(&self, collection: &str, ids: Vec<String>) -> IndexResult<()>;
}

/// Produces fresh connection handles.
///
/// The client calls this once at startup and again whenever a
/// connection-class failure forces handle recreation.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn connect(&self) -> IndexResult<Arc<dyn IndexTransport>>;
}
