//! HTTP gateway for the story pipeline.
//!
//! Two routes under `/api`: `POST /api/story` runs the pipeline and
//! `GET /api/health` reports liveness. Every request gets a uuid request
//! id, echoed back as `X-Request-Id` and threaded through all pipeline
//! telemetry. Rate limiting and the input length bound run before the
//! pipeline; authentication is an upstream concern.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::pipeline::{PipelineOutcome, StoryPipeline, StoryRequest};
use crate::rate_limit::{RateDecision, RateLimiter};

/// Shared state for all gateway handlers.
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration.
    pub config: Arc<Config>,
    /// The story pipeline.
    pub pipeline: Arc<StoryPipeline>,
    /// Per-client request limiter.
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Creates gateway state from a config and a pipeline.
    #[must_use]
    pub fn new(config: Config, pipeline: StoryPipeline) -> Self {
        let limiter = RateLimiter::new(
            config.rate_limit_window(),
            config.rate_limit_max_requests,
        );
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            limiter: Arc::new(limiter),
        }
    }
}

/// Request id assigned by the gateway, available as an extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

// ============================================================================
// Wire Types
// ============================================================================

/// Body of `POST /api/story`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryRequestBody {
    /// The story request text.
    pub user_input: String,
    /// Optional feedback applied to the first generation attempt.
    #[serde(default)]
    pub feedback: Option<String>,
}

/// Successful response of `POST /api/story`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryResponseBody {
    /// The accepted story text.
    pub story: String,
    /// The gateway-assigned request id.
    pub request_id: String,
}

/// Error response body for declines, limits, and internal failures.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// User-facing error message.
    pub error: String,
    /// The gateway-assigned request id.
    pub request_id: String,
}

/// Response of `GET /api/health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the service is up.
    pub status: String,
}

// ============================================================================
// Router
// ============================================================================

/// Builds the gateway router with all middleware attached.
#[must_use]
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let api = Router::new()
        .route("/story", post(handle_story))
        .route("/health", get(handle_health));

    Router::new()
        .nest("/api", api)
        .layer(middleware::from_fn(request_context))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Assigns a request id, echoes it back, and logs one line per request.
async fn request_context(mut request: Request, next: Next) -> Response {
    let request_id = RequestId(Uuid::new_v4().simple().to_string());
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    request.extensions_mut().insert(request_id.clone());

    let started_at = Instant::now();
    let mut response = next.run(request).await;
    let latency_ms = started_at.elapsed().as_millis();

    if let Ok(value) = HeaderValue::from_str(&request_id.0) {
        response.headers_mut().insert("x-request-id", value);
    }

    info!(
        request_id = %request_id.0,
        method = %method,
        path,
        status = response.status().as_u16(),
        latency_ms,
        "http_request"
    );
    response
}

// ============================================================================
// Handlers
// ============================================================================

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn handle_story(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Json(body): Json<StoryRequestBody>,
) -> Response {
    let client_key = connect_info.map_or_else(
        || "unknown".to_string(),
        |ConnectInfo(addr)| addr.ip().to_string(),
    );

    if state.limiter.check(&client_key, Instant::now()) == RateDecision::Limited {
        warn!(request_id = %request_id.0, client = %client_key, "rate_limited");
        return error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded.",
            &request_id,
        );
    }

    if body.user_input.chars().count() > state.config.max_input_chars {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Story request is too long. Please shorten your request.",
            &request_id,
        );
    }

    let mut story_request = StoryRequest::new(body.user_input);
    story_request.feedback = body.feedback;

    match state.pipeline.run(&story_request, &request_id.0).await {
        PipelineOutcome::Accepted(story) => (
            StatusCode::OK,
            Json(StoryResponseBody {
                story: story.text,
                request_id: request_id.0,
            }),
        )
            .into_response(),
        PipelineOutcome::Declined { message, .. } => {
            error_response(StatusCode::BAD_REQUEST, &message, &request_id)
        }
    }
}

fn error_response(status: StatusCode, message: &str, request_id: &RequestId) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
            request_id: request_id.0.clone(),
        }),
    )
        .into_response()
}
