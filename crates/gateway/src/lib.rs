//! HTTP gateway for switchyard.
//!
//! Exposes the turn endpoint plus a small management surface:
//!
//! - `POST /api/agent/chat`: Run one turn
//! - `GET  /health`: Liveness
//! - `GET  /`: Service info and endpoint list
//! - `GET  /config`: Non-secret runtime configuration
//! - `GET  /memory/stats`: Session memory statistics
//! - `POST /memory/clear/{session_id}`: Forget one session
//! - `GET  /circuit-breakers`: Breaker state per capability
//! - `GET  /metrics`: Prometheus text exposition
//!
//! Built on Axum.

pub mod api;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use switchyard_config::AppConfig;
use switchyard_dispatch::Dispatcher;
use switchyard_providers::{LocalInvoker, build_classifier, build_context_source, build_invoker};
use switchyard_telemetry::Metrics;

/// Request bodies above this size are rejected with 413.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: AppConfig,
    pub dispatcher: Arc<Dispatcher>,
    pub metrics: Arc<Metrics>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl GatewayState {
    pub fn new(config: AppConfig, dispatcher: Arc<Dispatcher>, metrics: Arc<Metrics>) -> Self {
        Self {
            config,
            dispatcher,
            metrics,
            started_at: chrono::Utc::now(),
        }
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the full router with CORS, body limit and trace logging applied.
pub fn build_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.server.cors_allowed_origins);
    api::routes(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// `*` anywhere in the list allows every origin. Unparseable origins are skipped.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|o| o.trim() == "*") {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.trim().parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}

/// Wire collaborators from configuration into a ready-to-serve state.
///
/// `local` is only consulted when the delegation mode is `local`.
pub fn build_state(
    config: AppConfig,
    local: LocalInvoker,
) -> Result<SharedState, switchyard_telemetry::TelemetryError> {
    let metrics = Arc::new(Metrics::new()?);
    let dispatcher = Dispatcher::new(
        &config,
        build_classifier(&config),
        build_invoker(&config, local),
        build_context_source(&config),
    )
    .with_telemetry(metrics.clone());

    Ok(Arc::new(GatewayState::new(
        config,
        Arc::new(dispatcher),
        metrics,
    )))
}

/// Start the gateway HTTP server and run until Ctrl-C.
pub async fn start(
    config: AppConfig,
    local: LocalInvoker,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = build_state(config, local)?;

    info!(
        addr = %addr,
        classifier = state.dispatcher.classifier_name(),
        model = %state.config.classifier.model,
        invoker = state.dispatcher.invoker_kind().as_str(),
        "Gateway starting"
    );

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
