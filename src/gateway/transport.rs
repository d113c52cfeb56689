//! Outbound transport seam.
//!
//! # Responsibilities
//! - Issue one inner request to its destination and buffer the response
//! - Render the upstream status line and headers as raw bytes
//! - Classify failures as temporary (retryable) or permanent
//!
//! # Design Decisions
//! - Redirects are never followed; the caller sees them through the relay
//! - Hop-by-hop headers and `Content-Length` are rebuilt by the client from
//!   the buffered body instead of being copied
//! - Per-attempt deadlines live in the forwarder, not here

use std::error::Error as StdError;
use std::io::ErrorKind;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Version};
use bytes::{BufMut, Bytes, BytesMut};
use futures_util::future::BoxFuture;
use hyper::ext::ReasonPhrase;
use thiserror::Error;

use crate::envelope::headers::eq_ignore_case;
use crate::envelope::InnerRequest;

/// Headers that describe a single connection and are never copied upstream.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "te",
    "trailer",
    "content-length",
];

/// Whether a failed attempt may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Temporary,
    Permanent,
}

/// A failed forwarding attempt.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    kind: FailureKind,
    message: String,
}

impl TransportError {
    pub fn temporary(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Temporary,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Permanent,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn is_temporary(&self) -> bool {
        self.kind == FailureKind::Temporary
    }
}

/// A fully buffered upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    /// Status line plus header lines, terminated by an empty line.
    pub header_bytes: Bytes,
    pub body: Bytes,
}

/// Sends inner requests to their destinations.
pub trait Transport: Send + Sync {
    fn send<'a>(&'a self, request: &'a InnerRequest) -> BoxFuture<'a, Result<UpstreamResponse, TransportError>>;
}

/// Production transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    max_body: usize,
}

impl HttpTransport {
    pub fn new(max_body: usize) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()?;
        Ok(Self { client, max_body })
    }

    async fn execute(&self, request: &InnerRequest) -> Result<UpstreamResponse, TransportError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| TransportError::permanent(format!("invalid method {:?}: {}", request.method, e)))?;
        let url = reqwest::Url::parse(&request.uri)
            .map_err(|e| TransportError::permanent(format!("invalid uri {:?}: {}", request.uri, e)))?;

        let response = self
            .client
            .request(method, url)
            .headers(outbound_headers(request))
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| classify(&e))?;

        let status = response.status();
        let version = response.version();
        let reason = response.extensions().get::<ReasonPhrase>().cloned();
        let headers = response.headers().clone();
        let body = self.read_body(response).await?;

        let reason = reason.as_ref().map(ReasonPhrase::as_bytes);
        Ok(UpstreamResponse {
            status,
            header_bytes: render_head(version, status, reason, &headers, body.len()),
            body,
        })
    }

    async fn read_body(&self, mut response: reqwest::Response) -> Result<Bytes, TransportError> {
        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| classify(&e))? {
            if body.len() + chunk.len() > self.max_body {
                return Err(TransportError::permanent(format!(
                    "upstream body exceeds {} bytes",
                    self.max_body
                )));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }
}

impl Transport for HttpTransport {
    fn send<'a>(&'a self, request: &'a InnerRequest) -> BoxFuture<'a, Result<UpstreamResponse, TransportError>> {
        Box::pin(self.execute(request))
    }
}

/// Convert the inner header list into a header map for the client.
fn outbound_headers(request: &InnerRequest) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(request.headers.len());
    for (name, value) in request.headers.iter() {
        if HOP_BY_HOP.iter().any(|h| eq_ignore_case(h, name)) {
            continue;
        }
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                map.append(name, value);
            }
            _ => tracing::debug!(header = %name, "Dropping header that is not valid HTTP"),
        }
    }
    map
}

/// Render `HTTP/x.y <code> <reason>` and the header lines as raw bytes.
///
/// `reason` is the phrase the upstream actually sent when it differs from
/// the canonical one. Header names are written in canonical `Title-Case`.
/// The body has already been read in full, so `Transfer-Encoding` is dropped
/// and `Content-Length` is rewritten to the buffered length.
pub fn render_head(
    version: Version,
    status: StatusCode,
    reason: Option<&[u8]>,
    headers: &HeaderMap,
    body_len: usize,
) -> Bytes {
    let mut head = BytesMut::with_capacity(64 + headers.len() * 32);
    head.put_slice(version_token(version).as_bytes());
    head.put_u8(b' ');
    head.put_slice(status.as_str().as_bytes());
    head.put_u8(b' ');
    head.put_slice(reason.unwrap_or(status.canonical_reason().unwrap_or("").as_bytes()));
    head.put_slice(b"\r\n");
    for (name, value) in headers {
        if *name == header::TRANSFER_ENCODING || *name == header::CONTENT_LENGTH {
            continue;
        }
        head.put_slice(canonical_name(name.as_str()).as_bytes());
        head.put_slice(b": ");
        head.put_slice(value.as_bytes());
        head.put_slice(b"\r\n");
    }
    head.put_slice(format!("Content-Length: {}\r\n\r\n", body_len).as_bytes());
    head.freeze()
}

/// `content-type` → `Content-Type`.
fn canonical_name(name: &str) -> String {
    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper { c.to_ascii_uppercase() } else { c.to_ascii_lowercase() };
            upper = c == '-';
            out
        })
        .collect()
}

fn version_token(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/1.1",
    }
}

/// Map a client error onto the retry classification.
fn classify(err: &reqwest::Error) -> TransportError {
    let message = describe(err);
    if err.is_timeout() || has_transient_cause(err) {
        TransportError::temporary(message)
    } else {
        TransportError::permanent(message)
    }
}

fn has_transient_cause(err: &(dyn StdError + 'static)) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                ErrorKind::TimedOut
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
                    | ErrorKind::Interrupted
                    | ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        if let Some(hyper_err) = cause.downcast_ref::<hyper::Error>() {
            if hyper_err.is_incomplete_message() || hyper_err.is_timeout() {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

/// Error message including the cause chain, which `reqwest` keeps out of `Display`.
fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
