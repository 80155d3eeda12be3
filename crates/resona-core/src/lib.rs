//! Core domain model for resona.
//!
//! This crate defines the canonical track descriptor, the closed set of
//! historical track payload shapes it is normalized from, and the
//! embedding record persisted to the vector index.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod embedding;
pub mod track;

pub use embedding::EmbeddingRecord;
pub use track::{RawTrack, TrackDescriptor};

/// Width of a single track embedding, fixed by the model's hidden size.
pub const VECTOR_DIM: usize = 1024;

/// Sample rate the embedding model expects, in Hz.
pub const SAMPLE_RATE_HZ: u32 = 24_000;

/// Normalized clips are truncated to this many seconds to bound
/// embedding cost.
pub const CLIP_SECONDS: u32 = 15;
