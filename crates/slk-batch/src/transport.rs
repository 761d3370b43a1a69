//! The HTTP seam between [`crate::BatchClient`] and the network

use crate::config::ClientConfig;
use reqwest::header::{CONTENT_TYPE, HeaderName, HeaderValue, USER_AGENT};
use std::future::Future;
use tokio_util::sync::CancellationToken;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An encoded batch, tagged with its request id
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub request_id: u64,
    pub body: Vec<u8>,
}

/// What came back, before any interpretation
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    pub status: u16,
    pub reason: String,
    /// The request id header, if the server echoed one
    pub request_id: Option<String>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn ok(request_id: Option<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            reason: "OK".to_string(),
            request_id,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Network(BoxError),
}

/// Posts one encoded batch
///
/// Implementations should return [`TransportError::Cancelled`] promptly once `cancel`
/// fires. The client treats a cancelled request as aborted whatever is returned.
pub trait Transport: Send + Sync {
    fn post(
        &self,
        request: TransportRequest,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

/// [`Transport`] over reqwest
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    request_id_header: HeaderName,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, BoxError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.as_str());
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: config.endpoint.clone(),
            request_id_header: HeaderName::try_from(config.request_id_header.as_str())?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn exchange(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, reqwest::Error> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(&self.request_id_header, HeaderValue::from(request.request_id))
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(request.body)
            .send()
            .await?;

        let status = response.status();
        let request_id = response
            .headers()
            .get(&self.request_id_header)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await?;

        Ok(TransportResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            request_id,
            body: body.to_vec(),
        })
    }
}

impl Transport for HttpTransport {
    async fn post(
        &self,
        request: TransportRequest,
        cancel: CancellationToken,
    ) -> Result<TransportResponse, TransportError> {
        tracing::trace!(
            request_id = request.request_id,
            endpoint = %self.endpoint,
            bytes = request.body.len(),
            "POST batch"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            result = self.exchange(request) => {
                result.map_err(|e| TransportError::Network(Box::new(e)))
            }
        }
    }
}
