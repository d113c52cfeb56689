//! Envelope decoding subsystem.
//!
//! # Data Flow
//! ```text
//! outer body bytes
//!     → frame.rs (u16 length prefix, split header block / payload)
//!     → pool (inflate header block with pooled scratch objects)
//!     → parser.rs (request line + header lines → InnerRequest)
//!     → content.rs (undo inner Content-Encoding)
//! ```
//!
//! # Design Decisions
//! - A body shorter than the length prefix is not an error; it selects the
//!   no-frame fallback path
//! - The payload is never copied while splitting; `Bytes` slices share the
//!   outer body
//! - Header name matching goes through `headers.rs` helpers only

pub mod content;
pub mod frame;
pub mod headers;
pub mod parser;
pub mod request;

pub use content::decode_content;
pub use frame::Frame;
pub use headers::HeaderList;
pub use parser::parse_header_block;
pub use request::InnerRequest;
