//! Pipeline error types.

use thiserror::Error;

/// Errors that can occur while running the processing pipeline.
///
/// Structural errors terminate a job; per-track failures are handled
/// at the call site (logged and skipped) and never surface here.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The submitted track list was empty.
    #[error("no tracks provided for processing")]
    NoTracks,

    /// Every submitted record was rejected during normalization.
    #[error("no valid tracks found to process")]
    NoValidTracks,

    /// The fetch stage reported total failure.
    #[error("failed to download previews: {0}")]
    FetchFailed(String),

    /// The preview resolver could not be reached or returned garbage.
    #[error("preview resolver error: {0}")]
    Resolver(String),

    /// An audio file could not be decoded or written.
    #[error("audio error for {path}: {message}")]
    Audio { path: String, message: String },

    /// The embedding model failed for a clip.
    #[error("embedding model error: {0}")]
    Model(String),

    /// A reduction input violated its shape contract.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An error propagated from the vector index client.
    #[error("vector index error: {0}")]
    Index(#[from] resona_index::IndexError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn audio(path: &std::path::Path, message: impl std::fmt::Display) -> Self {
        Self::Audio {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }
}

/// Convenience alias for pipeline results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
