//! The [`VectorIndex`] facade: collection lifecycle, upsert, search,
//! retrieval, and deletion, with uniform retry and connection
//! recreation around every network call.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio::time::sleep;

use resona_core::{EmbeddingRecord, VECTOR_DIM};

use crate::error::{IndexError, IndexResult};
use crate::retry::RetryPolicy;
use crate::transport::{IndexTransport, PointRecord, TransportFactory};

/// Client configuration: collection identity and retry schedule.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Name of the collection holding track embeddings.
    pub collection: String,
    /// Vector width the collection is created with. Every stored
    /// vector must match it exactly.
    pub vector_dim: usize,
    /// Drop and recreate the collection on connect. Destructive.
    pub recreate: bool,
    pub retry: RetryPolicy,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            collection: "track_embeddings".to_string(),
            vector_dim: VECTOR_DIM,
            recreate: false,
            retry: RetryPolicy::default(),
        }
    }
}

/// One similarity-search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarTrack {
    pub track_id: String,
    pub score: f32,
    pub metadata: Map<String, Value>,
}

/// Fault-tolerant facade over the remote vector index.
///
/// Owns the only live connection handle; callers never see it. On a
/// connection-class failure the handle is discarded and a fresh one is
/// established before the next attempt, serialized behind a mutex so
/// concurrent callers never race on recreation.
pub struct VectorIndex {
    config: IndexConfig,
    factory: Box<dyn TransportFactory>,
    transport: Mutex<Arc<dyn IndexTransport>>,
}

impl fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorIndex")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    /// Connect to the index service and ensure the collection exists.
    ///
    /// Both the initial connect (handle creation plus liveness ping)
    /// and the check-then-act collection setup are retried under the
    /// configured policy. A functioning index is a hard prerequisite
    /// for the pipeline, so exhaustion here is fatal.
    pub async fn connect(
        factory: Box<dyn TransportFactory>,
        config: IndexConfig,
    ) -> IndexResult<Self> {
        let transport = connect_with_retry(factory.as_ref(), &config.retry).await?;
        let index = Self {
            config,
            factory,
            transport: Mutex::new(transport),
        };
        index.ensure_collection().await?;
        Ok(index)
    }

    pub fn collection_name(&self) -> &str {
        &self.config.collection
    }

    /// Create the collection if absent; when `recreate` is set, drop
    /// it first. Retried as a unit: a transient failure mid-sequence
    /// restarts from listing, never assuming partial application.
    async fn ensure_collection(&self) -> IndexResult<()> {
        let name = self.config.collection.clone();
        let dim = self.config.vector_dim;
        let recreate = self.config.recreate;

        self.run_with_retry("ensure_collection", move |transport| {
            let name = name.clone();
            async move {
                let existing = transport.list_collections().await?;
                let mut exists = existing.contains(&name);

                if recreate && exists {
                    log::info!("Recreating collection {name}: dropping existing vectors");
                    transport.delete_collection(&name).await?;
                    exists = false;
                }

                if exists {
                    log::debug!("Collection {name} already exists");
                } else {
                    transport.create_collection(&name, dim).await?;
                    log::info!("Created collection {name} (dim={dim}, metric=cosine)");
                }
                Ok(())
            }
        })
        .await
    }

    /// Store one embedding. Returns `Ok(false)` when retries are
    /// exhausted so a single track's failure never aborts a batch;
    /// a wrong-length vector is a hard local error.
    pub async fn store_embedding(&self, record: EmbeddingRecord) -> IndexResult<bool> {
        if record.vector.len() != self.config.vector_dim {
            return Err(IndexError::InvalidVector {
                expected: self.config.vector_dim,
                actual: record.vector.len(),
            });
        }

        let collection = self.config.collection.clone();
        let point = PointRecord {
            id: record.track_id.clone(),
            vector: Some(record.vector),
            payload: record.metadata,
        };

        let outcome = self
            .run_with_retry("store_embedding", move |transport| {
                let collection = collection.clone();
                let point = point.clone();
                async move { transport.upsert(&collection, point).await }
            })
            .await;

        match outcome {
            Ok(()) => {
                log::info!("Stored embedding for track {}", record.track_id);
                Ok(true)
            }
            Err(e) => {
                log::error!("Failed to store embedding for track {}: {e}", record.track_id);
                Ok(false)
            }
        }
    }

    /// Nearest-neighbor search, best-effort: exhaustion yields an
    /// empty result set rather than an error.
    pub async fn similar_tracks(
        &self,
        query: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Vec<SimilarTrack> {
        let collection = self.config.collection.clone();
        let query = query.to_vec();

        let outcome = self
            .run_with_retry("similar_tracks", move |transport| {
                let collection = collection.clone();
                let query = query.clone();
                async move { transport.search(&collection, query, limit, min_score).await }
            })
            .await;

        match outcome {
            Ok(mut hits) => {
                // The service returns hits ordered, but re-applying the
                // contract locally keeps it independent of transport
                // behavior.
                hits.sort_by(|a, b| b.score.total_cmp(&a.score));
                hits.retain(|hit| hit.score >= min_score);
                hits.truncate(limit);
                let results: Vec<SimilarTrack> = hits
                    .into_iter()
                    .map(|hit| SimilarTrack {
                        track_id: hit.id,
                        score: hit.score,
                        metadata: hit.payload,
                    })
                    .collect();
                log::debug!("Found {} similar tracks", results.len());
                results
            }
            Err(e) => {
                log::error!("Similarity search failed: {e}");
                Vec::new()
            }
        }
    }

    /// Fetch a stored vector. `None` on not-found or exhaustion.
    pub async fn get_embedding(&self, track_id: &str) -> Option<Vec<f32>> {
        let collection = self.config.collection.clone();
        let id = track_id.to_string();

        let outcome = self
            .run_with_retry("get_embedding", move |transport| {
                let collection = collection.clone();
                let ids = vec![id.clone()];
                async move { transport.retrieve(&collection, ids, true).await }
            })
            .await;

        match outcome {
            Ok(points) => points.into_iter().next().and_then(|p| p.vector),
            Err(e) => {
                log::error!("Failed to retrieve embedding for track {track_id}: {e}");
                None
            }
        }
    }

    /// Existence check; skips vector payload transfer. `false` on
    /// failure after retries.
    pub async fn has_embedding(&self, track_id: &str) -> bool {
        let collection = self.config.collection.clone();
        let id = track_id.to_string();

        let outcome = self
            .run_with_retry("has_embedding", move |transport| {
                let collection = collection.clone();
                let ids = vec![id.clone()];
                async move { transport.retrieve(&collection, ids, false).await }
            })
            .await;

        match outcome {
            Ok(points) => !points.is_empty(),
            Err(e) => {
                log::error!("Failed to check embedding for track {track_id}: {e}");
                false
            }
        }
    }

    /// Delete a stored embedding. `false` on failure after retries.
    pub async fn delete_embedding(&self, track_id: &str) -> bool {
        let collection = self.config.collection.clone();
        let id = track_id.to_string();

        let outcome = self
            .run_with_retry("delete_embedding", move |transport| {
                let collection = collection.clone();
                let ids = vec![id.clone()];
                async move { transport.delete_points(&collection, ids).await }
            })
            .await;

        match outcome {
            Ok(()) => {
                log::info!("Deleted embedding for track {track_id}");
                true
            }
            Err(e) => {
                log::error!("Failed to delete embedding for track {track_id}: {e}");
                false
            }
        }
    }

    /// Discard the current handle and establish a fresh one. Holding
    /// the lock across the reconnect serializes recreation: no caller
    /// uses the dead handle once replacement has begun.
    async fn reconnect(&self) -> IndexResult<()> {
        let mut guard = self.transport.lock().await;
        let fresh = connect_with_retry(self.factory.as_ref(), &self.config.retry).await?;
        *guard = fresh;
        Ok(())
    }

    /// Uniform retry wrapper: up to `max_attempts` tries, exponential
    /// delay between them, transient failures only. Connection-class
    /// failures recreate the handle before the next attempt.
    async fn run_with_retry<T, F, Fut>(&self, operation: &'static str, mut call: F) -> IndexResult<T>
    where
        F: FnMut(Arc<dyn IndexTransport>) -> Fut,
        Fut: Future<Output = IndexResult<T>>,
    {
        let max = self.config.retry.max_attempts;
        let mut last_err: Option<IndexError> = None;

        for attempt in 1..=max {
            if attempt > 1 {
                let delay = self.config.retry.delay_before(attempt - 1);
                log::warn!(
                    "{operation} retrying in {:.1}s (attempt {attempt}/{max})",
                    delay.as_secs_f64()
                );
                sleep(delay).await;
            }

            let transport = Arc::clone(&*self.transport.lock().await);
            match call(transport).await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    log::warn!("{operation} failed (attempt {attempt}/{max}): {e}");
                    if e.is_connection() && attempt < max {
                        self.reconnect().await?;
                    }
                    last_err = Some(e);
                }
            }
        }

        Err(IndexError::RetriesExhausted {
            operation,
            attempts: max,
            source: Box::new(last_err.unwrap_or_else(|| IndexError::Connection {
                message: "no attempts were made".to_string(),
            })),
        })
    }
}

/// Establish a handle and verify liveness, retrying under the policy.
async fn connect_with_retry(
    factory: &dyn TransportFactory,
    retry: &RetryPolicy,
) -> IndexResult<Arc<dyn IndexTransport>> {
    let mut last_err: Option<IndexError> = None;

    for attempt in 1..=retry.max_attempts {
        if attempt > 1 {
            let delay = retry.delay_before(attempt - 1);
            log::warn!(
                "Failed to connect to index (attempt {}/{}), retrying in {:.1}s",
                attempt - 1,
                retry.max_attempts,
                delay.as_secs_f64()
            );
            sleep(delay).await;
        }

        match factory.connect().await {
            Ok(transport) => match transport.ping().await {
                Ok(()) => {
                    log::info!("Connected to vector index");
                    return Ok(transport);
                }
                Err(e) => last_err = Some(e),
            },
            Err(e) => last_err = Some(e),
        }
    }

    log::error!(
        "Failed to connect to vector index after {} attempts",
        retry.max_attempts
    );
    Err(IndexError::RetriesExhausted {
        operation: "connect",
        attempts: retry.max_attempts,
        source: Box::new(last_err.unwrap_or_else(|| IndexError::Connection {
            message: "no attempts were made".to_string(),
        })),
    })
}
