//! Response relay.
//!
//! The outer status is always `200 OK`, whatever the destination answered.
//! The outer status only says the gateway itself worked; the tunneled status
//! travels inside the relayed header bytes. Callers that look at the outer
//! status to detect upstream failures will not see them.

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::{BufMut, BytesMut};

use crate::gateway::transport::UpstreamResponse;

/// Outer response body = raw upstream header bytes followed by body bytes.
pub fn relay(upstream: UpstreamResponse) -> Response {
    let mut body = BytesMut::with_capacity(upstream.header_bytes.len() + upstream.body.len());
    body.put_slice(&upstream.header_bytes);
    body.put_slice(&upstream.body);

    let mut response = Response::new(Body::from(body.freeze()));
    *response.status_mut() = StatusCode::OK;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    response
}
