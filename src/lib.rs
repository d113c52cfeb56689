//! URL-fetch tunneling gateway library.
//!
//! Clients wrap a complete HTTP request in a compressed envelope and POST it
//! here; the gateway unwraps it, checks the shared password, fetches the
//! destination, and relays the raw response back. The outer status is
//! always 200 once a fetch succeeds; the destination's own status travels
//! inside the relayed bytes.

pub mod config;
pub mod envelope;
pub mod error;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pool;
pub mod resilience;

pub use config::schema::GatewayConfig;
pub use error::GatewayError;
pub use gateway::Gateway;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
