//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Batch endpoint of the public georeferencing service
pub const DEFAULT_ENDPOINT: &str = "https://linref.thehappycheese.com/batch/";

/// Header carrying the request id to the server and back
pub const DEFAULT_REQUEST_ID_HEADER: &str = "x-request-id";

/// Settings for [`crate::HttpTransport`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoint: String,
    pub request_id_header: String,
    /// Whole-request timeout; `None` waits until cancelled
    pub timeout_secs: Option<u64>,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_id_header: DEFAULT_REQUEST_ID_HEADER.to_string(),
            timeout_secs: None,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
