//! Forwarding with a per-attempt deadline and bounded retry.

use std::sync::Arc;
use std::time::Duration;

use crate::envelope::InnerRequest;
use crate::error::{GatewayError, Result};
use crate::gateway::transport::{Transport, UpstreamResponse};
use crate::observability::metrics;
use crate::resilience::{with_deadline, RetryPolicy};

/// Sends authenticated inner requests to their destination.
#[derive(Clone)]
pub struct Forwarder {
    transport: Arc<dyn Transport>,
    timeout: Duration,
    policy: RetryPolicy,
}

impl Forwarder {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration, policy: RetryPolicy) -> Self {
        Self {
            transport,
            timeout,
            policy,
        }
    }

    /// Forward `request`, retrying temporary failures per the policy.
    ///
    /// Permanent failures and exhausted retries both surface as
    /// [`GatewayError::BadGateway`].
    pub async fn forward(&self, request: &InnerRequest) -> Result<UpstreamResponse> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match with_deadline(self.timeout, self.transport.send(request)).await {
                Ok(response) => {
                    tracing::debug!(
                        uri = %request.uri,
                        attempt,
                        status = %response.status,
                        "Upstream responded"
                    );
                    return Ok(response);
                }
                Err(e) if self.policy.should_retry(attempt, &e) => {
                    tracing::info!(
                        uri = %request.uri,
                        attempt,
                        delay = ?self.policy.backoff(),
                        error = %e,
                        "Retrying after temporary upstream failure"
                    );
                    metrics::record_retry();
                    tokio::time::sleep(self.policy.backoff()).await;
                }
                Err(e) => {
                    tracing::warn!(
                        uri = %request.uri,
                        attempt,
                        temporary = e.is_temporary(),
                        error = %e,
                        "Upstream request failed"
                    );
                    return Err(GatewayError::BadGateway(e.to_string()));
                }
            }
        }
    }

    /// The transport this forwarder sends through.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("timeout", &self.timeout)
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::gateway::transport::TransportError;
    use axum::http::StatusCode;
    use bytes::Bytes;
    use futures_util::future::BoxFuture;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Transport that replays a fixed script of outcomes and counts calls.
    pub(crate) struct ScriptedTransport {
        script: Mutex<VecDeque<std::result::Result<UpstreamResponse, TransportError>>>,
        pub(crate) calls: Mutex<Vec<InnerRequest>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(
            script: Vec<std::result::Result<UpstreamResponse, TransportError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl Transport for ScriptedTransport {
        fn send<'a>(
            &'a self,
            request: &'a InnerRequest,
        ) -> BoxFuture<'a, std::result::Result<UpstreamResponse, TransportError>> {
            self.calls.lock().unwrap().push(request.clone());
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::permanent("script exhausted")));
            Box::pin(async move { next })
        }
    }

    pub(crate) fn ok_response(body: &'static str) -> UpstreamResponse {
        UpstreamResponse {
            status: StatusCode::OK,
            header_bytes: Bytes::from_static(b"HTTP/1.1 200 OK\r\n\r\n"),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    fn forwarder(transport: Arc<ScriptedTransport>) -> Forwarder {
        Forwarder::new(
            transport,
            Duration::from_secs(1),
            RetryPolicy::new(2, Duration::from_millis(5)),
        )
    }

    fn request() -> InnerRequest {
        InnerRequest::new("GET", "http://example.com/")
    }

    #[tokio::test]
    async fn first_success_is_returned() {
        let transport = ScriptedTransport::new(vec![Ok(ok_response("first"))]);
        let response = forwarder(transport.clone()).forward(&request()).await.unwrap();
        assert_eq!(&response.body[..], b"first");
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn temporary_then_success_returns_second_result() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::temporary("connection reset")),
            Ok(ok_response("second")),
        ]);
        let response = forwarder(transport.clone()).forward(&request()).await.unwrap();
        assert_eq!(&response.body[..], b"second");
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn two_temporary_failures_are_a_bad_gateway() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::temporary("reset")),
            Err(TransportError::temporary("reset again")),
            Ok(ok_response("never reached")),
        ]);
        let err = forwarder(transport.clone()).forward(&request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::BadGateway(ref m) if m == "reset again"));
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::permanent("connection refused")),
            Ok(ok_response("never reached")),
        ]);
        let err = forwarder(transport.clone()).forward(&request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::BadGateway(_)));
        assert_eq!(transport.call_count(), 1);
    }

    struct StallingTransport;

    impl Transport for StallingTransport {
        fn send<'a>(
            &'a self,
            _request: &'a InnerRequest,
        ) -> BoxFuture<'a, std::result::Result<UpstreamResponse, TransportError>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(ok_response("too late"))
            })
        }
    }

    #[tokio::test]
    async fn deadline_applies_to_every_attempt() {
        let forwarder = Forwarder::new(
            Arc::new(StallingTransport),
            Duration::from_millis(20),
            RetryPolicy::new(2, Duration::from_millis(1)),
        );
        let started = std::time::Instant::now();
        let err = forwarder.forward(&request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::BadGateway(ref m) if m.contains("timed out")));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
