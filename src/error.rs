//! Error types for the gateway request pipeline.
//!
//! Every variant is scoped to a single outer request and maps to one outer
//! HTTP status. Nothing here is fatal to the serving process.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Prefix carried by every error body so callers can tell gateway failures
/// apart from relayed upstream content.
pub const ERROR_PREFIX: &str = "urlfetch-gateway";

/// Errors surfaced to the caller of the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The outer request body could not be read off the connection.
    #[error("failed to read request body: {0}")]
    BodyRead(String),

    /// The length prefix claims more header bytes than the body holds.
    #[error("malformed frame: header length {declared} exceeds {available} available bytes")]
    MalformedFrame { declared: usize, available: usize },

    /// The inflated header block grew past the configured cap.
    #[error("header block exceeds {limit} bytes")]
    HeaderBlockTooLarge { limit: usize },

    /// The header block holds bytes that are not UTF-8. They are rejected
    /// rather than rewritten so nothing reaches the destination altered.
    #[error("header block is not valid UTF-8 at byte {offset}")]
    InvalidHeaderBytes { offset: usize },

    /// The first header-block line did not have exactly three tokens.
    #[error("invalid request line: {0:?}")]
    MalformedRequestLine(String),

    /// The request URI could not be parsed as an absolute URL.
    #[error("invalid request uri: {0:?}")]
    InvalidRequestUri(String),

    #[error("unsupported Content-Encoding: {0:?}")]
    UnsupportedEncoding(String),

    /// The payload claimed an encoding but did not decode cleanly.
    #[error("content decode failed: {0}")]
    ContentDecode(String),

    #[error("payload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// Missing or wrong `password` control parameter.
    #[error("wrong password")]
    Forbidden,

    /// Forwarding failed permanently or ran out of attempts.
    #[error("bad gateway: {0}")]
    BadGateway(String),

    /// No-frame request whose host has no subdomain to route on.
    #[error("no routable subdomain in host {0:?}")]
    UnroutableHost(String),

    #[error("request carries no envelope and the fallback path is disabled")]
    FallbackDisabled,
}

impl GatewayError {
    /// The outer HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::BodyRead(_)
            | GatewayError::MalformedFrame { .. }
            | GatewayError::HeaderBlockTooLarge { .. }
            | GatewayError::InvalidHeaderBytes { .. }
            | GatewayError::MalformedRequestLine(_)
            | GatewayError::InvalidRequestUri(_)
            | GatewayError::UnsupportedEncoding(_)
            | GatewayError::ContentDecode(_)
            | GatewayError::UnroutableHost(_)
            | GatewayError::FallbackDisabled => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Forbidden => StatusCode::FORBIDDEN,
            GatewayError::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = format!("{}: {}", ERROR_PREFIX, self);
        (self.status(), body).into_response()
    }
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
