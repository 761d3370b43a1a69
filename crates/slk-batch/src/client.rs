//! Single-flight batch client with request-id staleness checks

use crate::codec;
use crate::collection::GeoFeatureCollection;
use crate::config::ClientConfig;
use crate::query::LinearReferenceQuery;
use crate::transport::{BoxError, HttpTransport, Transport, TransportError, TransportRequest};
use crate::{BatchError, Result};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;

/// Source of request ids
///
/// Ids are millisecond timestamps, so a later request always carries an id at least as
/// large as an earlier one unless the clock steps backwards.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall clock in milliseconds since the Unix epoch
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }
}

struct InFlight {
    sequence: u64,
    request_id: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct ClientState {
    latest_request_id: u64,
    next_sequence: u64,
    in_flight: Option<InFlight>,
}

/// Posts batches one at a time, newest wins
///
/// Starting a fetch cancels whichever fetch is still in flight, and a response is only
/// delivered if it belongs to the newest request. State is per instance, so separate
/// clients never interfere.
pub struct BatchClient<T = HttpTransport, C = SystemClock> {
    transport: T,
    clock: C,
    state: Mutex<ClientState>,
}

impl BatchClient<HttpTransport, SystemClock> {
    pub fn from_config(config: &ClientConfig) -> std::result::Result<Self, BoxError> {
        Ok(Self::new(HttpTransport::new(config)?, SystemClock))
    }
}

impl<T: Transport, C: Clock> BatchClient<T, C> {
    pub fn new(transport: T, clock: C) -> Self {
        Self {
            transport,
            clock,
            state: Mutex::new(ClientState::default()),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Id of the most recently started request, 0 before the first
    pub fn latest_request_id(&self) -> u64 {
        self.lock_state().latest_request_id
    }

    pub fn in_flight_request_id(&self) -> Option<u64> {
        self.lock_state().in_flight.as_ref().map(|f| f.request_id)
    }

    /// Cancel the in-flight request, if any; its fetch resolves to [`BatchError::Aborted`]
    pub fn cancel_in_flight(&self) {
        if let Some(in_flight) = self.lock_state().in_flight.take() {
            tracing::debug!(request_id = in_flight.request_id, "Cancelling in-flight request");
            in_flight.cancel.cancel();
        }
    }

    /// Georeference `queries`, returning one geometry slot per query
    ///
    /// An empty batch resolves immediately without touching the network.
    pub async fn fetch(
        &self,
        queries: &[LinearReferenceQuery],
        offset_multiplier: f64,
    ) -> Result<GeoFeatureCollection> {
        if queries.is_empty() {
            tracing::debug!("Empty batch, nothing to fetch");
            return Ok(GeoFeatureCollection::empty());
        }

        let body = codec::encode_batch(queries, offset_multiplier)?;
        let request_id = self.clock.now_ms();
        let collection = self
            .exchange(request_id, body, queries.len())
            .await
            .inspect_err(|err| tracing::debug!(request_id, error = %err, "Batch request failed"))?;

        if collection.len() != queries.len() {
            tracing::warn!(
                request_id,
                sent = queries.len(),
                received = collection.len(),
                "Response length does not match request length"
            );
        }
        tracing::debug!(
            request_id,
            resolved = collection.resolved_count(),
            "Batch request complete"
        );
        Ok(collection)
    }

    async fn exchange(
        &self,
        request_id: u64,
        body: Vec<u8>,
        query_count: usize,
    ) -> Result<GeoFeatureCollection> {
        let (sequence, cancel) = self.begin(request_id)?;

        tracing::debug!(
            request_id,
            queries = query_count,
            bytes = body.len(),
            "Sending batch request"
        );
        let outcome = self
            .transport
            .post(TransportRequest { request_id, body }, cancel.clone())
            .await;
        self.finish(sequence);

        if cancel.is_cancelled() {
            return Err(BatchError::Aborted);
        }

        let response = match outcome {
            Ok(response) => response,
            Err(TransportError::Cancelled) => return Err(BatchError::Aborted),
            Err(TransportError::Network(source)) => return Err(BatchError::Fetch(source)),
        };

        if !response.is_success() {
            return Err(BatchError::Response {
                status: response.status,
                reason: response.reason,
            });
        }

        verify_echo(request_id, response.request_id.as_deref(), self.latest_request_id())?;

        tracing::debug!(request_id, bytes = response.body.len(), "Decoding batch response");
        codec::decode(&response.body)
    }

    fn lock_state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new request, cancelling the one it supersedes
    fn begin(&self, request_id: u64) -> Result<(u64, CancellationToken)> {
        let mut state = self.lock_state();
        if request_id < state.latest_request_id {
            return Err(BatchError::OutdatedBeforeFetch {
                request_id,
                latest: state.latest_request_id,
            });
        }
        state.latest_request_id = request_id;

        if let Some(previous) = state.in_flight.take() {
            tracing::debug!(
                request_id = previous.request_id,
                superseded_by = request_id,
                "Cancelling superseded request"
            );
            previous.cancel.cancel();
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        let cancel = CancellationToken::new();
        state.in_flight = Some(InFlight {
            sequence,
            request_id,
            cancel: cancel.clone(),
        });
        Ok((sequence, cancel))
    }

    fn finish(&self, sequence: u64) {
        let mut state = self.lock_state();
        if state.in_flight.as_ref().is_some_and(|f| f.sequence == sequence) {
            state.in_flight = None;
        }
    }
}

/// Check the request id the server echoed back
///
/// A missing header is accepted. A header that names a different request means the
/// server or a proxy mixed responses up. A matching header from a request that is no
/// longer the newest means the result arrived too late to show.
fn verify_echo(sent: u64, echoed: Option<&str>, latest: u64) -> Result<()> {
    let Some(echoed) = echoed else {
        return Ok(());
    };

    if echoed.trim().parse::<u64>().ok() != Some(sent) {
        tracing::error!(sent, received = echoed, "Response echoed the wrong request id");
        return Err(BatchError::RequestIdMismatch {
            sent,
            received: echoed.to_string(),
        });
    }
    if sent < latest {
        return Err(BatchError::OutdatedAfterFetch {
            request_id: sent,
            latest,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Carriageway;
    use crate::transport::TransportResponse;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::sync::Semaphore;

    #[derive(Default)]
    struct ManualClock(AtomicU64);

    impl ManualClock {
        fn at(ms: u64) -> Arc<Self> {
            Arc::new(Self(AtomicU64::new(ms)))
        }

        fn set(&self, ms: u64) {
            self.0.store(ms, Ordering::SeqCst);
        }
    }

    impl Clock for Arc<ManualClock> {
        fn now_ms(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    type Outcome = std::result::Result<TransportResponse, TransportError>;
    type Responder = Box<dyn Fn(&TransportRequest) -> Outcome + Send + Sync>;

    /// Answers immediately with whatever the responder returns
    struct FakeTransport {
        responder: Responder,
        requests: Mutex<Vec<TransportRequest>>,
    }

    impl FakeTransport {
        fn new(
            responder: impl Fn(&TransportRequest) -> Outcome + Send + Sync + 'static,
        ) -> Self {
            Self {
                responder: Box::new(responder),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Echoes the request id and returns `json`
        fn echoing(json: &'static str) -> Self {
            Self::new(move |request| {
                Ok(TransportResponse::ok(
                    Some(request.request_id.to_string()),
                    json.as_bytes(),
                ))
            })
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl Transport for FakeTransport {
        async fn post(
            &self,
            request: TransportRequest,
            _cancel: CancellationToken,
        ) -> Outcome {
            let response = (self.responder)(&request);
            self.requests.lock().unwrap().push(request);
            response
        }
    }

    /// Holds every request until released, optionally ignoring cancellation
    struct GatedTransport {
        gate: Semaphore,
        honour_cancel: bool,
        seen: Mutex<Vec<u64>>,
    }

    impl GatedTransport {
        fn new(honour_cancel: bool) -> Self {
            Self {
                gate: Semaphore::new(0),
                honour_cancel,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<u64> {
            self.seen.lock().unwrap().clone()
        }

        fn release_all(&self) {
            self.gate.add_permits(16);
        }
    }

    impl Transport for GatedTransport {
        async fn post(
            &self,
            request: TransportRequest,
            cancel: CancellationToken,
        ) -> Outcome {
            self.seen.lock().unwrap().push(request.request_id);
            let response =
                TransportResponse::ok(Some(request.request_id.to_string()), b"[null]".to_vec());

            if self.honour_cancel {
                tokio::select! {
                    _ = cancel.cancelled() => Err(TransportError::Cancelled),
                    permit = self.gate.acquire() => {
                        drop(permit);
                        Ok(response)
                    }
                }
            } else {
                let _permit = self.gate.acquire().await;
                Ok(response)
            }
        }
    }

    fn queries() -> Vec<LinearReferenceQuery> {
        vec![LinearReferenceQuery::new("H001", 1.0, 2.0).with_carriageway(Carriageway::L)]
    }

    async fn wait_for_requests(transport: &GatedTransport, count: usize) {
        while transport.seen().len() < count {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_empty_batch_skips_network() {
        let client = BatchClient::new(FakeTransport::echoing("[]"), ManualClock::at(10));
        let collection = client.fetch(&[], 1.0).await.unwrap();
        assert!(collection.is_empty());
        assert_eq!(client.transport().request_count(), 0);
        assert_eq!(client.latest_request_id(), 0);
    }

    #[tokio::test]
    async fn test_successful_fetch() {
        let client = BatchClient::new(
            FakeTransport::echoing("[[[[0.0, 0.0], [3.0, 4.0]]]]"),
            ManualClock::at(42),
        );
        let collection = client.fetch(&queries(), 1.0).await.unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.get(0).unwrap().0[0].0.len(), 2);
        assert_eq!(client.latest_request_id(), 42);
        assert_eq!(client.in_flight_request_id(), None);
    }

    #[tokio::test]
    async fn test_request_carries_id_and_normalised_body() {
        let client = BatchClient::new(FakeTransport::echoing("[null, null]"), ManualClock::at(7));
        let batch = vec![
            LinearReferenceQuery::new("H001", 2.0, 1.0).with_offset(4.0),
            LinearReferenceQuery::new("M010", 5.0, 6.0).with_carriageway(Carriageway::RS),
        ];
        client.fetch(&batch, 0.5).await.unwrap();

        let requests = client.transport().requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].request_id, 7);

        let decoded = codec::decode_request(&requests[0].body).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].slk_min, 1.0);
        assert_eq!(decoded[0].slk_max, 2.0);
        assert_eq!(decoded[0].offset, 2.0);
        assert_eq!(decoded[1].carriageway, Carriageway::RS);
    }

    #[tokio::test]
    async fn test_missing_echo_is_accepted() {
        let transport = FakeTransport::new(|_| Ok(TransportResponse::ok(None, b"[null]".to_vec())));
        let client = BatchClient::new(transport, ManualClock::at(1));
        assert_eq!(client.fetch(&queries(), 1.0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_error_status() {
        let transport = FakeTransport::new(|_| {
            Ok(TransportResponse {
                status: 503,
                reason: "Service Unavailable".to_string(),
                request_id: None,
                body: Vec::new(),
            })
        });
        let client = BatchClient::new(transport, ManualClock::at(1));
        let err = client.fetch(&queries(), 1.0).await.unwrap_err();
        assert!(matches!(err, BatchError::Response { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_network_failure() {
        let transport = FakeTransport::new(|_| {
            Err(TransportError::Network(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "refused",
            ))))
        });
        let client = BatchClient::new(transport, ManualClock::at(1));
        let err = client.fetch(&queries(), 1.0).await.unwrap_err();
        assert!(matches!(err, BatchError::Fetch(_)));
        assert!(err.to_string().contains("refused"));
    }

    #[tokio::test]
    async fn test_echoed_id_mismatch() {
        let transport = FakeTransport::new(|_| {
            Ok(TransportResponse::ok(Some("999".to_string()), b"[null]".to_vec()))
        });
        let client = BatchClient::new(transport, ManualClock::at(5));
        let err = client.fetch(&queries(), 1.0).await.unwrap_err();
        assert!(matches!(
            err,
            BatchError::RequestIdMismatch { sent: 5, ref received } if received == "999"
        ));
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let client = BatchClient::new(FakeTransport::echoing("not json"), ManualClock::at(1));
        let err = client.fetch(&queries(), 1.0).await.unwrap_err();
        assert!(matches!(err, BatchError::JsonDeserialize(_)));
    }

    #[tokio::test]
    async fn test_length_mismatch_is_not_an_error() {
        let transport = FakeTransport::echoing("[null, null, null]");
        let client = BatchClient::new(transport, ManualClock::at(1));
        assert_eq!(client.fetch(&queries(), 1.0).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_encoding_failure_skips_network() {
        let client = BatchClient::new(FakeTransport::echoing("[]"), ManualClock::at(1));
        let batch = vec![LinearReferenceQuery::new("x".repeat(300), 0.0, 1.0)];
        let err = client.fetch(&batch, 1.0).await.unwrap_err();
        assert!(matches!(err, BatchError::BinaryEncoding { index: 0, .. }));
        assert_eq!(client.transport().request_count(), 0);
    }

    #[tokio::test]
    async fn test_clock_going_backwards_is_outdated_before_fetch() {
        let clock = ManualClock::at(200);
        let client = BatchClient::new(FakeTransport::echoing("[null]"), clock.clone());
        client.fetch(&queries(), 1.0).await.unwrap();

        clock.set(150);
        let err = client.fetch(&queries(), 1.0).await.unwrap_err();
        assert!(matches!(
            err,
            BatchError::OutdatedBeforeFetch { request_id: 150, latest: 200 }
        ));
        assert_eq!(client.transport().request_count(), 1);
        assert_eq!(client.latest_request_id(), 200);
    }

    #[tokio::test]
    async fn test_superseded_request_is_aborted_even_if_transport_completes() {
        let clock = ManualClock::at(100);
        let client = Arc::new(BatchClient::new(GatedTransport::new(false), clock.clone()));

        let first = tokio::spawn({
            let client = client.clone();
            async move { client.fetch(&queries(), 1.0).await }
        });
        wait_for_requests(client.transport(), 1).await;
        assert_eq!(client.in_flight_request_id(), Some(100));

        clock.set(105);
        let second = tokio::spawn({
            let client = client.clone();
            async move { client.fetch(&queries(), 1.0).await }
        });
        wait_for_requests(client.transport(), 2).await;
        client.transport().release_all();

        let first = first.await.unwrap();
        let second = second.await.unwrap();
        assert!(matches!(first, Err(BatchError::Aborted)));
        assert_eq!(second.unwrap().len(), 1);
        assert_eq!(client.transport().seen(), vec![100, 105]);
        assert_eq!(client.latest_request_id(), 105);
        assert_eq!(client.in_flight_request_id(), None);
    }

    #[tokio::test]
    async fn test_superseded_request_is_cancelled_in_transport() {
        let clock = ManualClock::at(100);
        let client = Arc::new(BatchClient::new(GatedTransport::new(true), clock.clone()));

        let first = tokio::spawn({
            let client = client.clone();
            async move { client.fetch(&queries(), 1.0).await }
        });
        wait_for_requests(client.transport(), 1).await;

        clock.set(105);
        let second = tokio::spawn({
            let client = client.clone();
            async move { client.fetch(&queries(), 1.0).await }
        });

        // The first request gives up without any permits being released
        let first = first.await.unwrap();
        assert!(matches!(first, Err(BatchError::Aborted)));

        client.transport().release_all();
        assert!(second.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_cancel_in_flight() {
        let client = Arc::new(BatchClient::new(GatedTransport::new(true), ManualClock::at(3)));
        let pending = tokio::spawn({
            let client = client.clone();
            async move { client.fetch(&queries(), 1.0).await }
        });
        wait_for_requests(client.transport(), 1).await;

        client.cancel_in_flight();
        assert_eq!(client.in_flight_request_id(), None);
        assert!(matches!(pending.await.unwrap(), Err(BatchError::Aborted)));
    }

    #[test]
    fn test_verify_echo() {
        assert!(verify_echo(10, None, 10).is_ok());
        assert!(verify_echo(10, Some("10"), 10).is_ok());
        assert!(verify_echo(10, Some(" 10 "), 10).is_ok());
        assert!(matches!(
            verify_echo(10, Some("11"), 10),
            Err(BatchError::RequestIdMismatch { sent: 10, .. })
        ));
        assert!(matches!(
            verify_echo(10, Some("ten"), 10),
            Err(BatchError::RequestIdMismatch { .. })
        ));
        assert!(matches!(
            verify_echo(10, Some("10"), 12),
            Err(BatchError::OutdatedAfterFetch { request_id: 10, latest: 12 })
        ));
    }

    #[test]
    fn test_instances_are_independent() {
        let a = BatchClient::new(FakeTransport::echoing("[]"), ManualClock::at(0));
        let b = BatchClient::new(FakeTransport::echoing("[]"), ManualClock::at(0));
        let _ = a.begin(500).unwrap();
        assert_eq!(a.latest_request_id(), 500);
        assert_eq!(b.latest_request_id(), 0);
        assert!(b.begin(1).is_ok());
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[tokio::test]
    async fn test_failures_are_logged_with_request_id() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let transport = FakeTransport::new(|_| {
            Ok(TransportResponse {
                status: 500,
                reason: "Internal Server Error".to_string(),
                request_id: None,
                body: Vec::new(),
            })
        });
        let client = BatchClient::new(transport, ManualClock::at(31));
        client.fetch(&queries(), 1.0).await.unwrap_err();

        let client = BatchClient::new(FakeTransport::echoing("{"), ManualClock::at(32));
        client.fetch(&queries(), 1.0).await.unwrap_err();

        let failures: Vec<String> = logs
            .contents()
            .lines()
            .filter(|line| line.contains("Batch request failed"))
            .map(str::to_string)
            .collect();
        assert_eq!(failures.len(), 2, "{failures:?}");
        assert!(failures[0].contains("request_id=31"));
        assert!(failures[0].contains("500"));
        assert!(failures[1].contains("request_id=32"));
    }
}
