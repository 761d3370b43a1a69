//! Display state of the latest fetch

use crate::{BatchError, Result};
use std::fmt;

/// What a caller should show for its most recent fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FetchState {
    #[default]
    Idle,
    Pending,
    /// Nothing to send yet, e.g. a required column is not mapped
    MissingInput { reason: String },
    Success,
    Failed { reason: String },
}

impl FetchState {
    /// State after a fetch resolves
    ///
    /// Aborted fetches were superseded, so the newer request is still pending. Late
    /// results keep whatever `previous` was showing. A request id mismatch is reported
    /// as a server error without exposing the ids.
    pub fn resolve<T>(previous: &FetchState, result: &Result<T>) -> FetchState {
        match result {
            Ok(_) => FetchState::Success,
            Err(BatchError::Aborted) => FetchState::Pending,
            Err(BatchError::OutdatedAfterFetch { request_id, latest }) => {
                tracing::debug!(request_id, latest, "Ignoring late response");
                previous.clone()
            }
            Err(err @ BatchError::RequestIdMismatch { .. }) => {
                tracing::error!(error = %err, "Server returned a response for another request");
                FetchState::Failed {
                    reason: "Server Error".to_string(),
                }
            }
            Err(err) => FetchState::Failed {
                reason: err.to_string(),
            },
        }
    }

    pub fn missing_input(reason: impl Into<String>) -> Self {
        FetchState::MissingInput {
            reason: reason.into(),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, FetchState::Pending)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FetchState::Failed { .. })
    }
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchState::Idle => f.write_str("Idle"),
            FetchState::Pending => f.write_str("Pending"),
            FetchState::MissingInput { reason } => write!(f, "Missing input: {reason}"),
            FetchState::Success => f.write_str("Success"),
            FetchState::Failed { reason } => write!(f, "Failed: {reason}"),
        }
    }
}
