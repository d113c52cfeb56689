//! Inner payload content decoding.
//!
//! Reverses the compression declared by the inner `Content-Encoding` header
//! before the request is forwarded. Only `deflate` (raw RFC 1951 stream) and
//! `gzip` are understood. A gzip body may hold several concatenated members;
//! all of them are decoded.

use std::io::Read;

use bytes::Bytes;
use flate2::read::{DeflateDecoder, MultiGzDecoder};

use crate::envelope::request::InnerRequest;
use crate::error::{GatewayError, Result};

/// Decode the body in place when a `Content-Encoding` header is present.
///
/// On success the body holds the decoded bytes, `Content-Length` matches
/// them and `Content-Encoding` is gone. Requests without the header are left
/// untouched.
pub fn decode_content(request: &mut InnerRequest, max_body: usize) -> Result<()> {
    let Some(encoding) = request.headers.get("Content-Encoding") else {
        return Ok(());
    };
    let encoding = encoding.trim();
    if encoding.is_empty() {
        return Ok(());
    }

    let decoded = if encoding.eq_ignore_ascii_case("deflate") {
        read_limited(DeflateDecoder::new(&request.body[..]), max_body)?
    } else if encoding.eq_ignore_ascii_case("gzip") {
        read_limited(MultiGzDecoder::new(&request.body[..]), max_body)?
    } else {
        return Err(GatewayError::UnsupportedEncoding(encoding.to_string()));
    };

    tracing::debug!(
        encoding = %encoding,
        encoded_len = request.body.len(),
        decoded_len = decoded.len(),
        "Decoded inner payload"
    );

    request.headers.set("Content-Length", decoded.len().to_string());
    request.headers.remove("Content-Encoding");
    request.body = Bytes::from(decoded);
    Ok(())
}

fn read_limited(reader: impl Read, max_body: usize) -> Result<Vec<u8>> {
    let mut decoded = Vec::new();
    reader
        .take(max_body as u64 + 1)
        .read_to_end(&mut decoded)
        .map_err(|e| GatewayError::ContentDecode(e.to_string()))?;
    if decoded.len() > max_body {
        return Err(GatewayError::PayloadTooLarge { limit: max_body });
    }
    Ok(decoded)
}
