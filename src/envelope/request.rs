//! The reconstructed inner request.

use bytes::Bytes;

use crate::envelope::headers::HeaderList;

/// Protocol token written on request lines produced by the encoder.
pub const DEFAULT_VERSION: &str = "HTTP/1.1";

/// An HTTP request rebuilt from an envelope, headed for its real destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerRequest {
    /// Request method token, e.g. `GET`.
    pub method: String,
    /// Absolute request URI as written on the request line.
    pub uri: String,
    /// Protocol token from the request line. Informational only.
    pub version: String,
    pub headers: HeaderList,
    pub body: Bytes,
}

impl InnerRequest {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            version: DEFAULT_VERSION.to_string(),
            headers: HeaderList::new(),
            body: Bytes::new(),
        }
    }

    /// Destination authority taken from the `Host` header.
    pub fn host(&self) -> Option<&str> {
        self.headers.get("Host")
    }

    /// Render the uncompressed header block: request line, then one
    /// `Key: Value` line per header.
    pub fn header_block(&self) -> String {
        let mut block = format!("{} {} {}\r\n", self.method, self.uri, self.version);
        for (name, value) in self.headers.iter() {
            block.push_str(name);
            block.push_str(": ");
            block.push_str(value);
            block.push_str("\r\n");
        }
        block
    }
}
