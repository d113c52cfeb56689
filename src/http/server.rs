//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the gateway handler on every path
//! - Wire up middleware (request ID, tracing, request deadline)
//! - Bind server to listener and shut down gracefully
//! - Buffer the outer body and hand it to the gateway pipeline
//! - Map pipeline errors to outer status codes

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use http_body_util::LengthLimitError;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GatewayConfig;
use crate::envelope::frame::LENGTH_PREFIX;
use crate::error::GatewayError;
use crate::gateway::{Gateway, Transport};
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::lifecycle::shutdown;
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub max_body: usize,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Create a new HTTP server sending inner requests through `transport`.
    pub fn new(config: GatewayConfig, transport: Arc<dyn Transport>) -> Self {
        let state = AppState {
            gateway: Arc::new(Gateway::new(&config, transport)),
            max_body: config.limits.max_body_size,
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let middleware = ServiceBuilder::new()
            .layer(set_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    request_id = %request_id(request),
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }))
            .layer(propagate_request_id_layer())
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state)
            .layer(middleware)
    }

    /// Run the server on `listener` until `shutdown_rx` fires.
    pub async fn run(self, listener: TcpListener, shutdown_rx: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(shutdown_rx))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Gateway handler: every method, every path.
async fn gateway_handler(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();

    let host = parts
        .headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| parts.uri.host())
        .unwrap_or_default()
        .to_string();

    let body = match axum::body::to_bytes(body, state.max_body).await {
        Ok(body) => body,
        Err(e) => {
            let source = e.into_inner();
            let err = if source.is::<LengthLimitError>() {
                GatewayError::PayloadTooLarge { limit: state.max_body }
            } else {
                GatewayError::BodyRead(source.to_string())
            };
            tracing::warn!(remote = %remote, error = %err, "Rejecting outer body");
            metrics::record_request("envelope", err.status().as_u16(), start);
            return err.into_response();
        }
    };

    let kind = if body.len() < LENGTH_PREFIX {
        "fallback"
    } else {
        "envelope"
    };

    let response = match state.gateway.handle(remote, &host, &parts.uri, body).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(remote = %remote, host = %host, status = %e.status(), error = %e, "Request failed");
            e.into_response()
        }
    };

    metrics::record_request(kind, response.status().as_u16(), start);
    response
}
