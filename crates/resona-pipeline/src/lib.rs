//! Processing pipeline for resona.
//!
//! Drives a user's saved tracks through preview fetch, audio
//! normalization, embedding extraction and reduction, and vector index
//! storage as one staged job with partial-failure isolation.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod artifact;
pub mod audio;
pub mod config;
pub mod convert;
pub mod embed;
pub mod error;
pub mod fetch;
pub mod job;
pub mod runner;

pub use artifact::TrackEmbedding;
pub use config::Config;
pub use embed::{
    EmbeddingModel, HiddenStates, HttpEmbeddingModel, LayerSelect, Reduced, ReducePolicy,
};
pub use error::{PipelineError, PipelineResult};
pub use fetch::{FetchSummary, HttpPreviewResolver, NullResolver, PreviewFetcher, PreviewResolver};
pub use job::{JobId, JobResult, JobStage, JobStatus};
pub use runner::JobRunner;
