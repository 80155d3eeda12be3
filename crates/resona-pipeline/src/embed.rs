//! Embedding model boundary and hidden-state reduction.
//!
//! The neural model itself is an external capability behind
//! [`EmbeddingModel`]; this module owns only the pure reduction that
//! turns its per-layer, per-time-step output into one fixed-length
//! vector per track.

use std::time::Duration;

use async_trait::async_trait;
use ndarray::{Array2, Axis};
use reqwest::Client;
use serde::Deserialize;

use crate::error::{PipelineError, PipelineResult};

/// Layer-stacked hidden states for one clip: each layer is a
/// (time steps x feature width) matrix.
#[derive(Debug, Clone)]
pub struct HiddenStates {
    layers: Vec<Array2<f32>>,
}

impl HiddenStates {
    pub fn new(layers: Vec<Array2<f32>>) -> PipelineResult<Self> {
        if layers.is_empty() {
            return Err(PipelineError::InvalidInput(
                "hidden state stack has no layers".to_string(),
            ));
        }
        let width = layers[0].ncols();
        if layers.iter().any(|l| l.ncols() != width) {
            return Err(PipelineError::InvalidInput(
                "hidden state layers disagree on feature width".to_string(),
            ));
        }
        Ok(Self { layers })
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn feature_width(&self) -> usize {
        self.layers[0].ncols()
    }

    fn layer(&self, select: LayerSelect) -> PipelineResult<&Array2<f32>> {
        let idx = match select {
            LayerSelect::Last => self.layers.len() - 1,
            LayerSelect::Index(i) => i,
        };
        self.layers.get(idx).ok_or_else(|| {
            PipelineError::InvalidInput(format!(
                "layer {idx} out of range (stack has {} layers)",
                self.layers.len()
            ))
        })
    }
}

/// Which layer's hidden states to reduce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LayerSelect {
    /// The final layer (default).
    #[default]
    Last,
    Index(usize),
}

/// How to collapse the time axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReducePolicy {
    /// Elementwise average across time (default).
    #[default]
    Mean,
    /// Elementwise maximum across time.
    Max,
    /// No reduction: the caller receives the full per-time-step
    /// sequence.
    None,
}

/// Outcome of a reduction.
#[derive(Debug, Clone, PartialEq)]
pub enum Reduced {
    /// One vector of the model's feature width.
    Vector(Vec<f32>),
    /// The selected layer unreduced (time steps x feature width).
    Sequence(Array2<f32>),
}

impl Reduced {
    /// The pooled vector, if the policy produced one.
    pub fn into_vector(self) -> Option<Vec<f32>> {
        match self {
            Self::Vector(v) => Some(v),
            Self::Sequence(_) => None,
        }
    }
}

/// Reduce one clip's hidden states to a fixed-length vector (or the
/// raw sequence under [`ReducePolicy::None`]).
///
/// Pure computation: identical input tensors always give identical
/// output.
pub fn reduce(
    hidden: &HiddenStates,
    layer: LayerSelect,
    policy: ReducePolicy,
) -> PipelineResult<Reduced> {
    let matrix = hidden.layer(layer)?;
    if matrix.nrows() == 0 {
        return Err(PipelineError::InvalidInput(
            "selected layer has no time steps".to_string(),
        ));
    }

    match policy {
        ReducePolicy::Mean => {
            let pooled = matrix.mean_axis(Axis(0)).ok_or_else(|| {
                PipelineError::InvalidInput("cannot average an empty time axis".to_string())
            })?;
            Ok(Reduced::Vector(pooled.to_vec()))
        }
        ReducePolicy::Max => {
            let pooled = matrix.fold_axis(Axis(0), f32::NEG_INFINITY, |acc, x| acc.max(*x));
            Ok(Reduced::Vector(pooled.to_vec()))
        }
        ReducePolicy::None => Ok(Reduced::Sequence(matrix.clone())),
    }
}

/// External embedding model capability.
///
/// Input is normalized mono audio at the fixed sample rate; output is
/// the full stack of per-layer hidden states. Implementations are
/// constructed once at process start and shared read-only across
/// concurrent jobs.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed(&self, samples: &[f32], sample_rate: u32) -> PipelineResult<HiddenStates>;
}

/// Hidden states as serialized by the inference service: one
/// `(time x width)` nested array per layer.
#[derive(Debug, Deserialize)]
struct WireHiddenStates {
    layers: Vec<Vec<Vec<f32>>>,
}

/// Client for an HTTP inference service hosting the embedding model.
///
/// POSTs the normalized samples as JSON and reconstructs the layer
/// stack from the response.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingModel {
    http: Client,
    endpoint: String,
}

impl HttpEmbeddingModel {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> PipelineResult<Self> {
        let http = Client::builder()
            .user_agent("resona/0.1.0 (https://github.com/oxur/resona)")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl EmbeddingModel for HttpEmbeddingModel {
    async fn embed(&self, samples: &[f32], sample_rate: u32) -> PipelineResult<HiddenStates> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&serde_json::json!({
                "samples": samples,
                "sample_rate": sample_rate,
            }))
            .send()
            .await
            .map_err(|e| PipelineError::Model(e.to_string()))?
            .error_for_status()
            .map_err(|e| PipelineError::Model(e.to_string()))?;

        let wire: WireHiddenStates = response
            .json()
            .await
            .map_err(|e| PipelineError::Model(format!("invalid model response: {e}")))?;

        let layers = wire
            .layers
            .into_iter()
            .map(|layer| {
                let rows = layer.len();
                let cols = layer.first().map_or(0, Vec::len);
                let flat: Vec<f32> = layer.into_iter().flatten().collect();
                Array2::from_shape_vec((rows, cols), flat)
                    .map_err(|e| PipelineError::Model(format!("ragged layer matrix: {e}")))
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        HiddenStates::new(layers)
    }
}
