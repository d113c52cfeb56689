//! Gateway request pipeline.
//!
//! # Data Flow
//! ```text
//! outer body
//!     → envelope::Frame::decode
//!         ├─ no frame → fallback.rs (subdomain probe / redirect)
//!         └─ frame    → envelope parse + content decode
//!                     → params.rs (control parameters, password)
//!                     → forwarder.rs (deadline + retry over transport.rs)
//!                     → relay.rs (200 + raw upstream head + body)
//! ```
//!
//! # Design Decisions
//! - Each stage fails with a `GatewayError`; the HTTP layer turns it into a
//!   status and message
//! - The inner request is released on a spawned task after the relay body
//!   is built; that cleanup is best effort and nothing waits on it

pub mod fallback;
pub mod forwarder;
pub mod params;
pub mod relay;
pub mod transport;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::Uri;
use axum::response::Response;
use bytes::Bytes;

use crate::config::GatewayConfig;
use crate::envelope::{decode_content, Frame, InnerRequest};
use crate::error::{GatewayError, Result};
use crate::pool::ScratchPools;
use crate::resilience::RetryPolicy;

pub use fallback::Fallback;
pub use forwarder::Forwarder;
pub use params::{Authenticator, ControlParameters};
pub use relay::relay;
pub use transport::{HttpTransport, Transport, TransportError, UpstreamResponse};

/// Everything needed to serve one outer request, shared by all of them.
#[derive(Debug)]
pub struct Gateway {
    pools: ScratchPools,
    authenticator: Authenticator,
    forwarder: Forwarder,
    fallback: Option<Fallback>,
    control_prefix: String,
    max_header_block: usize,
    max_body: usize,
}

impl Gateway {
    pub fn new(config: &GatewayConfig, transport: Arc<dyn Transport>) -> Self {
        let timeout = Duration::from_secs(config.timeouts.forward_secs);
        let fallback = config.fallback.enabled.then(|| {
            Fallback::new(transport.clone(), timeout, config.fallback.probe_label.clone())
        });
        Self {
            pools: ScratchPools::new(config.pool.max_idle),
            authenticator: Authenticator::new(config.auth.password.clone()),
            forwarder: Forwarder::new(transport, timeout, RetryPolicy::from_config(&config.retries)),
            fallback,
            control_prefix: config.envelope.control_prefix.clone(),
            max_header_block: config.envelope.max_header_block,
            max_body: config.limits.max_body_size,
        }
    }

    /// Run one outer request through the pipeline.
    pub async fn handle(&self, remote: SocketAddr, host: &str, uri: &Uri, body: Bytes) -> Result<Response> {
        let Some(frame) = Frame::decode(&body)? else {
            return match &self.fallback {
                Some(fallback) => fallback.handle(host, uri).await,
                None => Err(GatewayError::FallbackDisabled),
            };
        };

        let mut inner = frame.into_request(&self.pools, self.max_header_block)?;
        decode_content(&mut inner, self.max_body)?;

        tracing::info!(
            remote = %remote,
            method = %inner.method,
            uri = %inner.uri,
            "Tunneled request"
        );

        let params = ControlParameters::extract(&mut inner, &self.control_prefix);
        self.authenticator.verify(&params)?;
        if !params.is_empty() {
            tracing::debug!(params = ?params.names().collect::<Vec<_>>(), "Control parameters");
        }

        let upstream = self.forwarder.forward(&inner).await?;
        let response = relay(upstream);
        release(inner);
        Ok(response)
    }

    /// Decode an outer body into the request that would be forwarded,
    /// without sending it. `Ok(None)` when the body has no frame.
    pub fn open(&self, body: &Bytes) -> Result<Option<(InnerRequest, ControlParameters)>> {
        let Some(frame) = Frame::decode(body)? else {
            return Ok(None);
        };
        let mut inner = frame.into_request(&self.pools, self.max_header_block)?;
        decode_content(&mut inner, self.max_body)?;
        let params = ControlParameters::extract(&mut inner, &self.control_prefix);
        Ok(Some((inner, params)))
    }

    pub fn pools(&self) -> &ScratchPools {
        &self.pools
    }
}

/// Hand the spent inner request to a background task for release.
fn release(inner: InnerRequest) {
    tokio::spawn(async move {
        let released = inner.body.len();
        drop(inner);
        tracing::trace!(released, "Inner request released");
    });
}
