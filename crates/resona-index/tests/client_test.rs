//! Behavioral tests for [`VectorIndex`] over an in-memory transport.
//!
//! Time-sensitive retry tests run with the tokio clock paused, so the
//! backoff delays are observed exactly without real sleeping.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use resona_core::EmbeddingRecord;
use resona_index::{
    IndexConfig, IndexError, IndexResult, IndexTransport, PointRecord, RetryPolicy, ScoredPoint,
    TransportFactory, VectorIndex,
};

#[derive(Clone, Copy, Debug)]
enum FailureKind {
    Unavailable,
    Connection,
}

fn make_error(kind: FailureKind) -> IndexError {
    match kind {
        FailureKind::Unavailable => IndexError::Unavailable {
            status: 503,
            message: "service down".to_string(),
        },
        FailureKind::Connection => IndexError::Connection {
            message: "connection reset".to_string(),
        },
    }
}

#[derive(Default)]
struct MockState {
    collections: Mutex<Vec<String>>,
    points: Mutex<HashMap<String, PointRecord>>,
    canned_hits: Mutex<Vec<ScoredPoint>>,
    connect_calls: AtomicUsize,
    create_calls: AtomicUsize,
    delete_collection_calls: AtomicUsize,
    upsert_calls: AtomicUsize,
    search_calls: AtomicUsize,
    last_retrieve_with_vectors: Mutex<Option<bool>>,
    connect_failures: Mutex<VecDeque<FailureKind>>,
    upsert_failures: Mutex<VecDeque<FailureKind>>,
    search_failures: Mutex<VecDeque<FailureKind>>,
}

impl MockState {
    fn with_collection(name: &str) -> Arc<Self> {
        let state = Arc::new(Self::default());
        state.collections.lock().unwrap().push(name.to_string());
        state
    }

    fn queue_upsert_failures(&self, kinds: &[FailureKind]) {
        self.upsert_failures.lock().unwrap().extend(kinds);
    }

    fn queue_search_failures(&self, kinds: &[FailureKind]) {
        self.search_failures.lock().unwrap().extend(kinds);
    }

    fn queue_connect_failures(&self, kinds: &[FailureKind]) {
        self.connect_failures.lock().unwrap().extend(kinds);
    }
}

struct MockTransport {
    state: Arc<MockState>,
}

#[async_trait]
impl IndexTransport for MockTransport {
    async fn ping(&self) -> IndexResult<()> {
        Ok(())
    }

    async fn list_collections(&self) -> IndexResult<Vec<String>> {
        Ok(self.state.collections.lock().unwrap().clone())
    }

    async fn create_collection(&self, name: &str, _dim: usize) -> IndexResult<()> {
        self.state.create_calls.fetch_add(1, Ordering::SeqCst);
        self.state
            .collections
            .lock()
            .unwrap()
            .push(name.to_string());
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> IndexResult<()> {
        self.state
            .delete_collection_calls
            .fetch_add(1, Ordering::SeqCst);
        self.state.collections.lock().unwrap().retain(|c| c != name);
        Ok(())
    }

    async fn upsert(&self, _collection: &str, point: PointRecord) -> IndexResult<()> {
        self.state.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(kind) = self.state.upsert_failures.lock().unwrap().pop_front() {
            return Err(make_error(kind));
        }
        self.state
            .points
            .lock()
            .unwrap()
            .insert(point.id.clone(), point);
        Ok(())
    }

    async fn search(
        &self,
        _collection: &str,
        _query: Vec<f32>,
        _limit: usize,
        _min_score: f32,
    ) -> IndexResult<Vec<ScoredPoint>> {
        self.state.search_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(kind) = self.state.search_failures.lock().unwrap().pop_front() {
            return Err(make_error(kind));
        }
        Ok(self.state.canned_hits.lock().unwrap().clone())
    }

    async fn retrieve(
        &self,
        _collection: &str,
        ids: Vec<String>,
        with_vectors: bool,
    ) -> IndexResult<Vec<PointRecord>> {
        *self.state.last_retrieve_with_vectors.lock().unwrap() = Some(with_vectors);
        let points = self.state.points.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| points.get(id))
            .map(|p| PointRecord {
                id: p.id.clone(),
                vector: if with_vectors { p.vector.clone() } else { None },
                payload: p.payload.clone(),
            })
            .collect())
    }

    async fn delete_points(&self, _collection: &str, ids: Vec<String>) -> IndexResult<()> {
        let mut points = self.state.points.lock().unwrap();
        for id in ids {
            points.remove(&id);
        }
        Ok(())
    }
}

struct MockFactory {
    state: Arc<MockState>,
}

#[async_trait]
impl TransportFactory for MockFactory {
    async fn connect(&self) -> IndexResult<Arc<dyn IndexTransport>> {
        self.state.connect_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(kind) = self.state.connect_failures.lock().unwrap().pop_front() {
            return Err(make_error(kind));
        }
        Ok(Arc::new(MockTransport {
            state: Arc::clone(&self.state),
        }))
    }
}

fn test_config(dim: usize) -> IndexConfig {
    IndexConfig {
        collection: "tracks".to_string(),
        vector_dim: dim,
        recreate: false,
        retry: RetryPolicy::new(3, Duration::from_millis(100)),
    }
}

async fn connect(state: &Arc<MockState>, config: IndexConfig) -> VectorIndex {
    VectorIndex::connect(
        Box::new(MockFactory {
            state: Arc::clone(state),
        }),
        config,
    )
    .await
    .expect("connect should succeed")
}

#[tokio::test]
async fn ensure_collection_creates_once() {
    let state = Arc::new(MockState::default());

    let first = connect(&state, test_config(8)).await;
    assert_eq!(first.collection_name(), "tracks");
    assert_eq!(state.create_calls.load(Ordering::SeqCst), 1);

    // Second connect without the recreate flag is a no-op ensure.
    let _second = connect(&state, test_config(8)).await;
    assert_eq!(state.create_calls.load(Ordering::SeqCst), 1);
    assert_eq!(state.delete_collection_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn recreate_drops_existing_collection() {
    let state = MockState::with_collection("tracks");

    let mut config = test_config(8);
    config.recreate = true;
    let _index = connect(&state, config).await;

    assert_eq!(state.delete_collection_calls.load(Ordering::SeqCst), 1);
    assert_eq!(state.create_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn store_rejects_wrong_length_locally() {
    let state = Arc::new(MockState::default());
    let index = connect(&state, test_config(1024)).await;

    let record = EmbeddingRecord::new("t1", vec![0.5; 16]);
    let err = index.store_embedding(record).await.unwrap_err();
    assert!(matches!(
        err,
        IndexError::InvalidVector {
            expected: 1024,
            actual: 16
        }
    ));
    // The mismatch never reaches the transport.
    assert_eq!(state.upsert_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn store_exhausts_three_attempts_with_backoff() {
    let state = Arc::new(MockState::default());
    let index = connect(&state, test_config(8)).await;

    state.queue_upsert_failures(&[
        FailureKind::Unavailable,
        FailureKind::Unavailable,
        FailureKind::Unavailable,
    ]);

    let start = Instant::now();
    let stored = index
        .store_embedding(EmbeddingRecord::new("t1", vec![0.5; 8]))
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert!(!stored);
    assert_eq!(state.upsert_calls.load(Ordering::SeqCst), 3);
    // Delays of base and 2*base precede attempts 2 and 3.
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_millis(400));
}

#[tokio::test(start_paused = true)]
async fn store_success_on_second_attempt_incurs_one_delay() {
    let state = Arc::new(MockState::default());
    let index = connect(&state, test_config(8)).await;

    state.queue_upsert_failures(&[FailureKind::Unavailable]);

    let start = Instant::now();
    let stored = index
        .store_embedding(EmbeddingRecord::new("t1", vec![0.5; 8]))
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert!(stored);
    assert_eq!(state.upsert_calls.load(Ordering::SeqCst), 2);
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn connection_failure_recreates_handle() {
    let state = Arc::new(MockState::default());
    let index = connect(&state, test_config(8)).await;
    assert_eq!(state.connect_calls.load(Ordering::SeqCst), 1);

    state.queue_upsert_failures(&[FailureKind::Connection]);

    let stored = index
        .store_embedding(EmbeddingRecord::new("t1", vec![0.5; 8]))
        .await
        .unwrap();

    assert!(stored);
    // The reset handle was replaced before the successful retry.
    assert_eq!(state.connect_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn search_yields_empty_after_exhaustion() {
    let state = Arc::new(MockState::default());
    let index = connect(&state, test_config(8)).await;

    state.queue_search_failures(&[
        FailureKind::Unavailable,
        FailureKind::Unavailable,
        FailureKind::Unavailable,
    ]);

    let hits = index.similar_tracks(&[0.5; 8], 10, 0.7).await;
    assert!(hits.is_empty());
    assert_eq!(state.search_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn search_sorts_filters_and_truncates() {
    let state = Arc::new(MockState::default());
    let index = connect(&state, test_config(8)).await;

    *state.canned_hits.lock().unwrap() = vec![
        ScoredPoint {
            id: "low".to_string(),
            score: 0.2,
            payload: serde_json::Map::new(),
        },
        ScoredPoint {
            id: "best".to_string(),
            score: 0.95,
            payload: serde_json::Map::new(),
        },
        ScoredPoint {
            id: "good".to_string(),
            score: 0.8,
            payload: serde_json::Map::new(),
        },
        ScoredPoint {
            id: "ok".to_string(),
            score: 0.75,
            payload: serde_json::Map::new(),
        },
    ];

    let hits = index.similar_tracks(&[0.5; 8], 2, 0.7).await;
    let ids: Vec<&str> = hits.iter().map(|h| h.track_id.as_str()).collect();
    assert_eq!(ids, vec!["best", "good"]);
    assert!(hits[0].score >= hits[1].score);
}

#[tokio::test]
async fn existence_check_skips_vector_transfer() {
    let state = Arc::new(MockState::default());
    let index = connect(&state, test_config(8)).await;

    index
        .store_embedding(EmbeddingRecord::new("t1", vec![0.5; 8]))
        .await
        .unwrap();

    assert!(index.has_embedding("t1").await);
    assert_eq!(
        *state.last_retrieve_with_vectors.lock().unwrap(),
        Some(false)
    );
    assert!(!index.has_embedding("missing").await);
}

#[tokio::test]
async fn get_and_delete_roundtrip() {
    let state = Arc::new(MockState::default());
    let index = connect(&state, test_config(4)).await;

    index
        .store_embedding(EmbeddingRecord::new("t1", vec![1.0, 2.0, 3.0, 4.0]))
        .await
        .unwrap();

    assert_eq!(
        index.get_embedding("t1").await,
        Some(vec![1.0, 2.0, 3.0, 4.0])
    );
    assert!(index.delete_embedding("t1").await);
    assert_eq!(index.get_embedding("t1").await, None);
}

#[tokio::test(start_paused = true)]
async fn connect_is_fatal_after_exhaustion() {
    let state = Arc::new(MockState::default());
    state.queue_connect_failures(&[
        FailureKind::Connection,
        FailureKind::Connection,
        FailureKind::Connection,
    ]);

    let result = VectorIndex::connect(
        Box::new(MockFactory {
            state: Arc::clone(&state),
        }),
        test_config(8),
    )
    .await;

    assert!(matches!(
        result.unwrap_err(),
        IndexError::RetriesExhausted {
            operation: "connect",
            attempts: 3,
            ..
        }
    ));
    assert_eq!(state.connect_calls.load(Ordering::SeqCst), 3);
}
