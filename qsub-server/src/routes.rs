//! HTTP routes of qsub-server

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use qsub::pbs::snapshot::{ClusterSnapshot, SnapshotStore};
use qsub::qsub::{QsubConfigResponse, QsubPreviewResponse, QsubService};
use qsub::{SubmissionRequest, UserContext, UserRole};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

/// Header carrying the authenticated user name, set by the fronting proxy
pub const USER_HEADER: &str = "x-remote-user";

/// Header carrying the user role (`admin` or `user`)
pub const ROLE_HEADER: &str = "x-remote-role";

const ANONYMOUS_USER: &str = "anonymous";

/// Application state shared across handlers
pub struct AppState {
    pub service: QsubService,
    pub store: SnapshotStore,
    /// False until a snapshot has been loaded when one is configured
    pub snapshot_ready: AtomicBool,
}

impl AppState {
    pub fn new(service: QsubService, store: SnapshotStore, snapshot_ready: bool) -> Self {
        Self {
            service,
            store,
            snapshot_ready: AtomicBool::new(snapshot_ready),
        }
    }

    fn snapshot(&self) -> Result<Arc<ClusterSnapshot>, ApiError> {
        if !self.snapshot_ready.load(Ordering::Acquire) {
            return Err(ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "Cluster snapshot has not been loaded yet",
            ));
        }
        Ok(self.store.current())
    }
}

/// Error returned to clients as `{"error": "..."}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!("Request failed with {}: {}", self.status, self.message);
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: &'static str,
    snapshot_ready: bool,
    nodes: usize,
    queues: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    collected_at: Option<String>,
}

/// Caller identity from the proxy headers; missing identity is an anonymous user
pub fn user_from_headers(headers: &HeaderMap) -> UserContext {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    let username = header(USER_HEADER).unwrap_or(ANONYMOUS_USER);
    let role = match header(ROLE_HEADER) {
        Some(role) if role.eq_ignore_ascii_case("admin") => UserRole::Admin,
        _ => UserRole::User,
    };
    UserContext::new(username, role)
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/qsub/config", get(config_handler))
        .route("/qsub/preview", post(preview_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let snapshot = state.store.current();
    Json(HealthResponse {
        status: "ok",
        snapshot_ready: state.snapshot_ready.load(Ordering::Acquire),
        nodes: snapshot.nodes().len(),
        queues: snapshot.queues().len(),
        collected_at: snapshot.collected_at.map(|t| t.to_rfc3339()),
    })
}

async fn config_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<QsubConfigResponse>, ApiError> {
    let user = user_from_headers(&headers);
    let snapshot = state.snapshot()?;
    debug!("Building qsub config for {}", user.username);
    Ok(Json(state.service.config(&snapshot, &user)))
}

async fn preview_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<SubmissionRequest>,
) -> Result<Json<QsubPreviewResponse>, ApiError> {
    let user = user_from_headers(&headers);
    let snapshot = state.snapshot()?;
    Ok(Json(state.service.preview(&request, &snapshot, &user)))
}
