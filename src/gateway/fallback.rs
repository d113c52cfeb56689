//! No-frame fallback.
//!
//! # Responsibilities
//! - Derive a destination domain from the outer host's subdomain structure
//! - Fetch the outer path directly from a probe host under that domain
//! - Redirect to `www.<domain>` when the direct fetch fails
//!
//! # Design Decisions
//! - Hosts with one or two labels have nothing to route on and are rejected
//! - The probe host gets a per-request numeric suffix so wildcard DNS
//!   entries resolve to a fresh name each time
//! - A failed direct fetch is recovered locally, never surfaced as an error

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode, Uri};
use axum::response::Response;

use crate::envelope::InnerRequest;
use crate::error::{GatewayError, Result};
use crate::gateway::transport::Transport;
use crate::observability::metrics;
use crate::resilience::with_deadline;

/// Degraded direct-fetch path for outer requests without an envelope.
#[derive(Clone)]
pub struct Fallback {
    transport: Arc<dyn Transport>,
    timeout: Duration,
    probe_label: String,
}

impl Fallback {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration, probe_label: impl Into<String>) -> Self {
        Self {
            transport,
            timeout,
            probe_label: probe_label.into(),
        }
    }

    /// Serve an outer request that carried no envelope.
    pub async fn handle(&self, host: &str, uri: &Uri) -> Result<Response> {
        let domain = destination_domain(host)?;
        let scheme = uri.scheme_str().unwrap_or("http");
        let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");

        let probe_host = format!("{}-{}.{}", self.probe_label, probe_suffix(), domain);
        let mut probe = InnerRequest::new("GET", format!("{}://{}{}", scheme, probe_host, path));
        probe.headers.set("Host", probe_host.as_str());

        match with_deadline(self.timeout, self.transport.send(&probe)).await {
            Ok(upstream) => {
                tracing::debug!(probe = %probe.uri, status = %upstream.status, "Fallback fetch succeeded");
                metrics::record_fallback("fetched");
                let mut response = Response::new(Body::from(upstream.body));
                *response.status_mut() = upstream.status;
                Ok(response)
            }
            Err(e) => {
                let location = format!("{}://www.{}{}", scheme, domain, path);
                tracing::info!(
                    probe = %probe.uri,
                    location = %location,
                    error = %e,
                    "Fallback fetch failed, redirecting"
                );
                metrics::record_fallback("redirected");
                Ok(permanent_redirect(&location))
            }
        }
    }
}

impl std::fmt::Debug for Fallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fallback")
            .field("timeout", &self.timeout)
            .field("probe_label", &self.probe_label)
            .finish()
    }
}

/// Everything after the first label of `host`, port removed.
///
/// Fails with [`GatewayError::UnroutableHost`] when the host has fewer than
/// three labels.
pub fn destination_domain(host: &str) -> Result<String> {
    let name = strip_port(host);
    let labels: Vec<&str> = name.split('.').collect();
    if labels.len() <= 2 || name.starts_with('[') || labels.iter().any(|l| l.is_empty()) {
        return Err(GatewayError::UnroutableHost(host.to_string()));
    }
    Ok(labels[1..].join("."))
}

fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

fn probe_suffix() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default()
}

fn permanent_redirect(location: &str) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::MOVED_PERMANENTLY;
    if let Ok(value) = HeaderValue::from_str(location) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    response
}
