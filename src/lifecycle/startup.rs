//! Startup orchestration.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::gateway::HttpTransport;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;

/// Bring the gateway up with `config` and serve until a shutdown signal.
pub async fn run(config: GatewayConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    let transport = Arc::new(HttpTransport::new(config.limits.max_body_size)?);
    let server = HttpServer::new(config.clone(), transport);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        forward_timeout_secs = config.timeouts.forward_secs,
        max_attempts = config.retries.max_attempts,
        authentication = !config.auth.password.is_empty(),
        fallback = config.fallback.enabled,
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(signals::shutdown_on_signal(shutdown));

    server.run(listener, server_shutdown).await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
