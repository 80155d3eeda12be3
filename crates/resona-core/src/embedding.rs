//! Embedding records persisted to the vector index.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::VECTOR_DIM;

/// One stored embedding: a track id, a fixed-width vector, and
/// open-ended scalar metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub track_id: String,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl EmbeddingRecord {
    pub fn new(track_id: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            track_id: track_id.into(),
            vector,
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Whether the vector matches the index's configured dimensionality.
    pub fn has_expected_dim(&self) -> bool {
        self.vector.len() == VECTOR_DIM
    }
}
