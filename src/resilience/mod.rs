//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Inner request to destination:
//!     → timeouts.rs (per-attempt deadline)
//!     → On failure: retries.rs (temporary? attempts left? fixed backoff)
//! ```
//!
//! # Design Decisions
//! - Every outbound attempt has a deadline; an expired deadline is temporary
//! - Only failures the transport marks temporary are retried
//! - Backoff sleeps on the request's own task, never on a shared worker

pub mod retries;
pub mod timeouts;

pub use retries::RetryPolicy;
pub use timeouts::with_deadline;
