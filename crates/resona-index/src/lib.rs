//! Fault-tolerant client for the external vector index service.
//!
//! [`VectorIndex`] wraps every network operation in a bounded
//! exponential-backoff retry policy and transparently replaces the
//! underlying connection handle when a connection-class failure occurs.
//! The wire protocol lives behind the [`IndexTransport`] seam so tests
//! can substitute an in-memory transport.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod client;
pub mod error;
pub mod http;
pub mod retry;
pub mod transport;

pub use client::{IndexConfig, SimilarTrack, VectorIndex};
pub use error::{IndexError, IndexResult};
pub use http::{HttpTransport, HttpTransportFactory};
pub use retry::RetryPolicy;
pub use transport::{IndexTransport, PointRecord, ScoredPoint, TransportFactory};
