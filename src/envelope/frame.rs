//! Length-prefixed envelope framing.
//!
//! ```text
//! +----------------+---------------------------------+-------------+
//! | u16 BE length  | raw-deflated header block       | payload ... |
//! +----------------+---------------------------------+-------------+
//! ```

use std::io::Write;

use bytes::{BufMut, Bytes, BytesMut};
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::envelope::parser::parse_header_block;
use crate::envelope::request::InnerRequest;
use crate::error::{GatewayError, Result};
use crate::pool::scratch::Inflated;
use crate::pool::ScratchPools;

/// Size of the big-endian header length prefix.
pub const LENGTH_PREFIX: usize = 2;

/// An envelope split out of an outer request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header_len: u16,
    /// Header block as it sits on the wire, still compressed.
    pub header_block: Bytes,
    /// Everything after the header block, untouched.
    pub payload: Bytes,
}

impl Frame {
    /// Split an outer body into a frame.
    ///
    /// `Ok(None)` means the body is too short to carry a length prefix; the
    /// caller takes the no-frame path.
    pub fn decode(body: &Bytes) -> Result<Option<Frame>> {
        if body.len() < LENGTH_PREFIX {
            return Ok(None);
        }
        let header_len = u16::from_be_bytes([body[0], body[1]]);
        let rest = body.slice(LENGTH_PREFIX..);
        let declared = header_len as usize;
        if declared > rest.len() {
            return Err(GatewayError::MalformedFrame {
                declared,
                available: rest.len(),
            });
        }
        Ok(Some(Frame {
            header_len,
            header_block: rest.slice(..declared),
            payload: rest.slice(declared..),
        }))
    }

    /// Inflate and parse the header block, then attach the payload as body.
    ///
    /// Scratch objects come from `pools` and go back on every path out.
    pub fn into_request(self, pools: &ScratchPools, max_header_block: usize) -> Result<InnerRequest> {
        let mut inflater = pools.inflaters.acquire();
        let mut text = pools.buffers.acquire();

        let outcome = inflater
            .inflate(&self.header_block, &mut text, max_header_block)
            .map_err(|limit| GatewayError::HeaderBlockTooLarge { limit })?;
        if outcome == Inflated::Truncated {
            tracing::debug!(
                header_len = self.header_len,
                inflated = text.len(),
                "Header block ended early, keeping parsed lines"
            );
        }

        let mut request = parse_header_block(&text, outcome == Inflated::Complete)?;
        request.body = self.payload;
        Ok(request)
    }

    /// Build the wire form of an inner request.
    pub fn encode(request: &InnerRequest) -> std::io::Result<Bytes> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(request.header_block().as_bytes())?;
        let compressed = encoder.finish()?;

        let header_len = u16::try_from(compressed.len()).map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("compressed header block is {} bytes, limit is {}", compressed.len(), u16::MAX),
            )
        })?;

        let mut out = BytesMut::with_capacity(LENGTH_PREFIX + compressed.len() + request.body.len());
        out.put_u16(header_len);
        out.put_slice(&compressed);
        out.put_slice(&request.body);
        Ok(out.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pools() -> ScratchPools {
        ScratchPools::new(4)
    }

    #[test]
    fn short_body_has_no_frame() {
        assert_eq!(Frame::decode(&Bytes::new()).unwrap(), None);
        assert_eq!(Frame::decode(&Bytes::from_static(b"x")).unwrap(), None);
    }

    #[test]
    fn splits_header_block_and_payload() {
        let body = Bytes::from_static(&[0, 3, b'a', b'b', b'c', b'p', b'q']);
        let frame = Frame::decode(&body).unwrap().unwrap();
        assert_eq!(frame.header_len, 3);
        assert_eq!(&frame.header_block[..], b"abc");
        assert_eq!(&frame.payload[..], b"pq");
    }

    #[test]
    fn oversized_length_is_rejected() {
        let body = Bytes::from_static(&[0, 10, b'a']);
        let err = Frame::decode(&body).unwrap_err();
        assert!(matches!(err, GatewayError::MalformedFrame { declared: 10, available: 1 }));
    }

    #[test]
    fn round_trip_preserves_structured_request() {
        let mut original = InnerRequest::new("PUT", "http://api.example.com:8080/items/7?x=1");
        original.headers.append("Host", "api.example.com:8080");
        original.headers.append("Accept", "application/json");
        original.headers.append("Cookie", "a=1");
        original.headers.append("Cookie", "b=2");
        original.body = Bytes::from_static(b"{\"name\":\"seven\"}");

        let wire = Frame::encode(&original).unwrap();
        let frame = Frame::decode(&wire).unwrap().unwrap();
        let decoded = frame.into_request(&pools(), 64 * 1024).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn scratch_objects_return_after_failure() {
        let pools = pools();
        let mut bad = InnerRequest::new("GET", "http://example.com/");
        bad.method = "GET /two-tokens".into();
        bad.uri = "extra".into();
        let wire = Frame::encode(&bad).unwrap();
        let frame = Frame::decode(&wire).unwrap().unwrap();

        assert!(frame.into_request(&pools, 1024).is_err());
        assert_eq!(pools.inflaters.idle_count(), 1);
        assert_eq!(pools.buffers.idle_count(), 1);
        assert!(pools.buffers.acquire().is_empty());
    }

    #[test]
    fn header_block_cap_applies() {
        let mut req = InnerRequest::new("GET", "http://example.com/");
        req.headers.append("X-Padding", "p".repeat(4096));
        let wire = Frame::encode(&req).unwrap();
        let frame = Frame::decode(&wire).unwrap().unwrap();
        let err = frame.into_request(&pools(), 512).unwrap_err();
        assert!(matches!(err, GatewayError::HeaderBlockTooLarge { limit: 512 }));
    }
}
