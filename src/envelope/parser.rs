//! Header block parsing.
//!
//! # Format
//! ```text
//! <METHOD> <REQUEST-URI> <VERSION>\r\n
//! <Key>: <Value>\r\n
//! ...
//! ```
//!
//! # Design Decisions
//! - The request line splits on single spaces and must give exactly 3 tokens
//! - Header lines without a colon are skipped, not rejected
//! - A stream that ended early keeps every complete line read before the end
//! - Bytes that are not UTF-8 fail the block; values are never rewritten
//! - `Host` is seeded from the URI authority exactly as written

use url::{Position, Url};

use crate::envelope::headers::eq_ignore_case;
use crate::envelope::request::InnerRequest;
use crate::error::{GatewayError, Result};

/// Parse an inflated header block into an inner request with an empty body.
///
/// `complete` tells whether the block reached its end cleanly. When it did
/// not, a trailing line without a terminator is treated as cut off and
/// dropped.
pub fn parse_header_block(block: &[u8], complete: bool) -> Result<InnerRequest> {
    // A cut-off trailing line is dropped anyway, so only its bytes are exempt.
    let block = if complete {
        block
    } else {
        block
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(&block[..0], |end| &block[..=end])
    };
    let text = std::str::from_utf8(block)
        .map_err(|e| GatewayError::InvalidHeaderBytes { offset: e.valid_up_to() })?;
    let mut lines = split_lines(text, complete);

    let request_line = lines.next().unwrap_or_default();
    let mut request = parse_request_line(request_line)?;

    for line in lines {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() {
            continue;
        }
        if eq_ignore_case(key, "Host") {
            request.headers.set(key, value);
        } else {
            request.headers.append(key, value);
        }
    }

    Ok(request)
}

/// Parse `<METHOD> <REQUEST-URI> <VERSION>` and seed the `Host` header from
/// the URI authority.
pub fn parse_request_line(line: &str) -> Result<InnerRequest> {
    let parts: Vec<&str> = line.split(' ').collect();
    let [method, uri, version] = parts[..] else {
        return Err(GatewayError::MalformedRequestLine(line.to_string()));
    };
    if !is_token(method) {
        return Err(GatewayError::MalformedRequestLine(line.to_string()));
    }

    let url = Url::parse(uri).map_err(|_| GatewayError::InvalidRequestUri(uri.to_string()))?;
    if !url.has_host() {
        return Err(GatewayError::InvalidRequestUri(uri.to_string()));
    }

    let mut request = InnerRequest::new(method, uri);
    request.version = version.to_string();
    let host = raw_authority(uri).unwrap_or(&url[Position::BeforeHost..Position::AfterPort]);
    request.headers.set("Host", host);
    Ok(request)
}

/// `host[:port]` as it appears in `uri`, user info removed. `Url` would
/// normalize case and drop a default port.
fn raw_authority(uri: &str) -> Option<&str> {
    let (_, rest) = uri.split_once("://")?;
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    (!host.is_empty()).then_some(host)
}

fn split_lines(text: &str, complete: bool) -> impl Iterator<Item = &str> {
    let mut pieces: Vec<&str> = text.split('\n').collect();
    // The piece after the last '\n' is either empty or an unterminated line.
    if let Some(last) = pieces.pop() {
        if complete && !last.is_empty() {
            pieces.push(last);
        }
    }
    pieces.into_iter().map(|line| line.strip_suffix('\r').unwrap_or(line))
}

/// RFC 9110 token characters.
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}
