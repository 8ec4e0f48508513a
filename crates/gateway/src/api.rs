//! Route table and handlers.

use axum::{
    Router,
    extract::rejection::JsonRejection,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use switchyard_core::{Capability, DispatchError, TurnRequest, TurnResponse};

use crate::SharedState;

const SERVICE_NAME: &str = "switchyard";

const ENDPOINTS: &[&str] = &[
    "POST /api/agent/chat",
    "GET /health",
    "GET /config",
    "GET /memory/stats",
    "POST /memory/clear/{session_id}",
    "GET /circuit-breakers",
    "GET /metrics",
];

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/agent/chat", post(chat_handler))
        .route("/config", get(config_handler))
        .route("/memory/stats", get(memory_stats_handler))
        .route("/memory/clear/{session_id}", post(clear_memory_handler))
        .route("/circuit-breakers", get(breakers_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// HTTP status for a failed turn. Timeouts of any kind are 504.
fn status_for(error: &DispatchError) -> StatusCode {
    if error.is_client_error() {
        return StatusCode::BAD_REQUEST;
    }
    match error {
        DispatchError::Classifier(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
        DispatchError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<TurnRequest>, JsonRejection>,
) -> Response {
    let started = Instant::now();

    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Malformed turn request");
            state.metrics.record_failure(started.elapsed());
            return error_response(rejection.status(), rejection.body_text());
        }
    };

    info!(
        session_id = request.session_id,
        tenant_id = request.tenant_config.tenant_id,
        bot_name = %request.tenant_config.bot_name,
        "POST /api/agent/chat"
    );

    match state.dispatcher.handle_turn(request).await {
        Ok(response) => Json(response).into_response(),
        Err(DispatchError::Timeout { session_id, .. }) => (
            StatusCode::GATEWAY_TIMEOUT,
            Json(TurnResponse::timed_out(session_id)),
        )
            .into_response(),
        Err(e) => error_response(status_for(&e), e.to_string()),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    uptime_secs: i64,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: (chrono::Utc::now() - state.started_at).num_seconds(),
    })
}

#[derive(Serialize)]
struct RootResponse {
    service: &'static str,
    version: &'static str,
    endpoints: &'static [&'static str],
}

async fn root_handler() -> Json<RootResponse> {
    Json(RootResponse {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        endpoints: ENDPOINTS,
    })
}

#[derive(Serialize)]
struct CapabilityView {
    url: String,
    enabled: bool,
}

#[derive(Serialize)]
struct ConfigResponse {
    classifier: &'static str,
    classifier_model: String,
    classifier_configured: bool,
    invoker: &'static str,
    capabilities: std::collections::BTreeMap<Capability, CapabilityView>,
    context_endpoint: String,
    turn_timeout_secs: u64,
}

/// Runtime view without secrets: whether a key is set, never the key.
async fn config_handler(State(state): State<SharedState>) -> Json<ConfigResponse> {
    let config = &state.config;
    let endpoints = &config.delegation.capabilities;
    let capabilities = [
        (Capability::Sales, &endpoints.sales),
        (Capability::Appointment, &endpoints.appointment),
        (Capability::Booking, &endpoints.booking),
    ]
    .into_iter()
    .map(|(capability, endpoint)| {
        (
            capability,
            CapabilityView {
                url: endpoint.url.clone(),
                enabled: endpoint.is_usable(),
            },
        )
    })
    .collect();

    Json(ConfigResponse {
        classifier: "openai",
        classifier_model: config.classifier.model.clone(),
        classifier_configured: config.has_api_key(),
        invoker: config.delegation.mode.as_str(),
        capabilities,
        context_endpoint: config.context.endpoint.clone(),
        turn_timeout_secs: config.turn_timeout_secs,
    })
}

async fn memory_stats_handler(State(state): State<SharedState>) -> Response {
    Json(state.dispatcher.sessions().stats()).into_response()
}

#[derive(Serialize)]
struct ClearResponse {
    message: String,
    cleared: bool,
}

async fn clear_memory_handler(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Response {
    let Ok(session_id) = session_id.trim().parse::<u64>() else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "session_id must be a non-negative integer",
        );
    };

    let cleared = state.dispatcher.sessions().clear(session_id).await;
    info!(session_id, cleared, "Session memory cleared");
    Json(ClearResponse {
        message: format!("Memory cleared for session_id: {session_id}"),
        cleared,
    })
    .into_response()
}

async fn breakers_handler(State(state): State<SharedState>) -> Response {
    Json(state.dispatcher.breakers().snapshot()).into_response()
}

async fn metrics_handler(State(state): State<SharedState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (
            [(header::CONTENT_TYPE, state.metrics.content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use switchyard_config::AppConfig;
    use switchyard_core::{
        CapabilityOutput, CapabilityRequest, Classifier, ClassifierError, ClassifierRequest,
        ContextError, ContextSource, Decision, InvokeError, TenantId,
    };
    use switchyard_dispatch::Dispatcher;
    use switchyard_providers::{CapabilityHandler, LocalInvoker};
    use switchyard_telemetry::Metrics;
    use tower::ServiceExt;

    use crate::GatewayState;

    /// Routes by keyword so one instance can serve every test request.
    struct KeywordClassifier;

    #[async_trait]
    impl Classifier for KeywordClassifier {
        fn name(&self) -> &str {
            "keyword"
        }

        async fn classify(&self, request: ClassifierRequest) -> Result<Decision, ClassifierError> {
            let message = request.message.to_lowercase();
            if message.contains("crash") {
                return Err(ClassifierError::Authentication("invalid key".into()));
            }
            if message.contains("slow") {
                tokio::time::sleep(Duration::from_secs(600)).await;
            }
            if message.contains("book") {
                return Ok(Decision::delegate(Capability::Booking, "Checking rooms..."));
            }
            Ok(Decision::respond("Hello! How can I help?"))
        }
    }

    struct NoContext;

    #[async_trait]
    impl ContextSource for NoContext {
        async fn fetch(&self, _tenant_id: TenantId) -> Result<String, ContextError> {
            Ok(String::new())
        }
    }

    struct RoomDesk;

    #[async_trait]
    impl CapabilityHandler for RoomDesk {
        async fn handle(&self, request: CapabilityRequest) -> Result<CapabilityOutput, InvokeError> {
            Ok(CapabilityOutput::PlainText(format!(
                "Room 7 is yours, session {}.",
                request.session_id
            )))
        }
    }

    fn test_state_with(config: AppConfig) -> SharedState {
        let metrics = Arc::new(Metrics::new().unwrap());
        let invoker = LocalInvoker::new().register(Capability::Booking, Arc::new(RoomDesk));
        let dispatcher = Dispatcher::new(
            &config,
            Arc::new(KeywordClassifier),
            Arc::new(invoker),
            Arc::new(NoContext),
        )
        .with_telemetry(metrics.clone());
        Arc::new(GatewayState::new(config, Arc::new(dispatcher), metrics))
    }

    fn test_state() -> SharedState {
        test_state_with(AppConfig::default())
    }

    fn chat_request(message: &str, session_id: i64, tenant_id: i64) -> Request<Body> {
        let body = serde_json::json!({
            "message": message,
            "session_id": session_id,
            "tenant_config": {
                "tenant_id": tenant_id,
                "bot_name": "Ana",
                "role": "receptionist",
                "type": "hotel",
                "primary_goal": "fill rooms",
                "modality": "reservas"
            }
        });
        Request::builder()
            .method("POST")
            .uri("/api/agent/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn chat_responds_directly() {
        let app = routes(test_state());

        let response = app.oneshot(chat_request("hi there", 1, 5)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["action"], "respond");
        assert_eq!(json["reply"], "Hello! How can I help?");
        assert_eq!(json["session_id"], 1);
        assert!(json["delegated_capability"].is_null());
    }

    #[tokio::test]
    async fn chat_delegates_to_capability() {
        let state = test_state();
        let app = routes(state.clone());

        let response = app.oneshot(chat_request("book a room", 22, 5)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["action"], "delegate");
        assert_eq!(json["delegated_capability"], "booking");
        assert_eq!(json["reply"], "Room 7 is yours, session 22.");
        assert_eq!(state.dispatcher.sessions().stats().session_count, 1);
    }

    #[tokio::test]
    async fn invalid_input_is_400() {
        let app = routes(test_state());

        let response = app.clone().oneshot(chat_request("   ", 1, 5)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].as_str().unwrap().contains("message"));

        let response = app.clone().oneshot(chat_request("hi", -1, 5)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.oneshot(chat_request("hi", 1, 0)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_json_is_rejected_with_error_body() {
        let app = routes(test_state());
        let req = Request::builder()
            .method("POST")
            .uri("/api/agent/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert!(response.status().is_client_error());
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn classifier_failure_is_502() {
        let app = routes(test_state());
        let response = app.oneshot(chat_request("crash please", 1, 5)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(
            body_json(response).await["error"]
                .as_str()
                .unwrap()
                .contains("Authentication")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn turn_timeout_is_504_with_turn_body() {
        let mut config = AppConfig::default();
        config.turn_timeout_secs = 30;
        let app = routes(test_state_with(config));

        let response = app.oneshot(chat_request("slow question", 4, 5)).await.unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

        let json = body_json(response).await;
        assert_eq!(json["action"], "timeout");
        assert_eq!(json["session_id"], 4);
        assert_eq!(json["reply"], TurnResponse::TIMEOUT_REPLY);
    }

    #[tokio::test(start_paused = true)]
    async fn classifier_timeout_is_504() {
        let mut config = AppConfig::default();
        config.classifier.timeout_secs = 5;
        let app = routes(test_state_with(config));

        let response = app.oneshot(chat_request("slow question", 4, 5)).await.unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn memory_stats_and_clear() {
        let state = test_state();
        let app = routes(state.clone());

        app.clone().oneshot(chat_request("hi", 31, 5)).await.unwrap();

        let req = Request::builder()
            .uri("/memory/stats")
            .body(Body::empty())
            .unwrap();
        let json = body_json(app.clone().oneshot(req).await.unwrap()).await;
        assert_eq!(json["session_count"], 1);
        assert_eq!(json["sessions"]["31"], 1);

        let req = Request::builder()
            .method("POST")
            .uri("/memory/clear/31")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["cleared"], true);
        assert_eq!(state.dispatcher.sessions().stats().session_count, 0);

        let req = Request::builder()
            .method("POST")
            .uri("/memory/clear/abc")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn config_hides_secrets() {
        let mut config = AppConfig::default();
        config.classifier.api_key = Some("sk-very-secret".into());
        let app = routes(test_state_with(config));

        let req = Request::builder().uri("/config").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert!(!text.contains("sk-very-secret"));
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["classifier_configured"], true);
        assert_eq!(json["invoker"], "remote");
        assert!(json["capabilities"]["booking"]["url"].is_string());
    }

    #[tokio::test]
    async fn breakers_listed_after_delegation() {
        let app = routes(test_state());
        app.clone().oneshot(chat_request("book now", 2, 5)).await.unwrap();

        let req = Request::builder()
            .uri("/circuit-breakers")
            .body(Body::empty())
            .unwrap();
        let json = body_json(app.oneshot(req).await.unwrap()).await;
        assert_eq!(json["booking"]["state"], "closed");
        assert_eq!(json["booking"]["failure_count"], 0);
    }

    #[tokio::test]
    async fn metrics_are_exposed_as_text() {
        let app = routes(test_state());
        app.clone().oneshot(chat_request("hi", 1, 5)).await.unwrap();

        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("switchyard_requests_by_action_total{action=\"respond\"} 1"));
    }

    #[tokio::test]
    async fn root_lists_endpoints() {
        let app = routes(test_state());
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let json = body_json(app.oneshot(req).await.unwrap()).await;
        assert_eq!(json["service"], "switchyard");
        assert!(
            json["endpoints"]
                .as_array()
                .unwrap()
                .iter()
                .any(|e| e == "POST /api/agent/chat")
        );
    }
}
