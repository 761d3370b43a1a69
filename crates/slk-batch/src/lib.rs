//! SLK Batch - Georeferencing Many Road Ranges in One Request
//!
//! Rows of a spreadsheet each describe a stretch of road by road number, SLK range,
//! carriageway and offset. This crate packs every row into a compact binary request,
//! posts it to the georeferencing service, and turns the JSON reply back into one
//! geometry per row.
//!
//! # Architecture
//!
//! - **[`LinearReferenceQuery`]**: One row, normalised into an [`EncodedQuery`] for the wire
//! - **[`codec`]**: Binary request records and JSON response decoding
//! - **[`Transport`]**: The HTTP seam; [`HttpTransport`] is the reqwest implementation
//! - **[`BatchClient`]**: Single-flight fetches. Starting a request cancels the previous
//!   one, and request ids taken from a [`Clock`] reject responses that arrive late
//! - **[`FetchState`]**: What a caller should display after each fetch
//! - **[`join_rows`]**: Pairs results back up with rows and explains the ones that failed

pub mod codec;
mod client;
mod collection;
mod config;
mod query;
mod rows;
mod state;
mod transport;

// Public API exports
pub use client::{BatchClient, Clock, SystemClock};
pub use codec::EncodeError;
pub use collection::GeoFeatureCollection;
pub use config::ClientConfig;
pub use query::{Carriageway, EncodedQuery, LinearReferenceQuery};
pub use rows::{MappedRow, NonMappableReason, NonMappableRow, RowJoin, join_rows};
pub use state::FetchState;
pub use transport::{
    BoxError, HttpTransport, Transport, TransportError, TransportRequest, TransportResponse,
};

/// How a caller should react to a [`BatchError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Superseded or cancelled; a newer request will report instead
    Transient,
    /// Should be shown to the user
    Terminal,
}

/// Error types for batch requests
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Could not encode query {index}: {source}")]
    BinaryEncoding {
        index: usize,
        #[source]
        source: EncodeError,
    },

    #[error("Request failed: {0}")]
    Fetch(#[source] BoxError),

    #[error("Request was aborted")]
    Aborted,

    #[error("Server responded {status} {reason}")]
    Response { status: u16, reason: String },

    #[error("Could not parse response: {0}")]
    JsonDeserialize(#[from] serde_json::Error),

    #[error("Request {request_id} is older than request {latest}")]
    OutdatedBeforeFetch { request_id: u64, latest: u64 },

    #[error("Response to request {request_id} arrived after request {latest} started")]
    OutdatedAfterFetch { request_id: u64, latest: u64 },

    #[error("Sent request id {sent} but the response echoed {received:?}")]
    RequestIdMismatch { sent: u64, received: String },
}

impl BatchError {
    pub fn severity(&self) -> Severity {
        match self {
            BatchError::Aborted | BatchError::OutdatedAfterFetch { .. } => Severity::Transient,
            BatchError::BinaryEncoding { .. }
            | BatchError::Fetch(_)
            | BatchError::Response { .. }
            | BatchError::JsonDeserialize(_)
            | BatchError::OutdatedBeforeFetch { .. }
            | BatchError::RequestIdMismatch { .. } => Severity::Terminal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.severity() == Severity::Transient
    }
}

pub type Result<T> = std::result::Result<T, BatchError>;
