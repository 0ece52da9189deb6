use axum::{
    Router,
    extract::{ConnectInfo, Path, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{Next, from_fn},
    response::{Json, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use spoc_flow::{DialogEngine, SessionStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::models::{ChatRequest, ChatResponse, SessionSnapshot};

type ApiResult<T> = Result<Json<T>, ApiError>;
type ApiError = (StatusCode, Json<Value>);

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub engine: DialogEngine,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/chat", post(chat))
        .route("/session/{id}", get(get_session))
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(mut request: Request, next: Next) -> Response {
    let correlation_id = Uuid::new_v4().to_string();

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "SPoC Chatbot",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Collects SPoC analysis settings step by step and runs the analysis",
        "endpoints": {
            "POST /chat": "Send one chat message; the session is tied to the caller address",
            "GET /session/{id}": "Inspect a session",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn chat(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<ChatResponse> {
    // One session per caller address; callers behind the same address share it.
    let session_id = addr.ip().to_string();

    info!(
        session_id = %session_id,
        content_length = request.message.len(),
        "Processing chat message"
    );

    match state.engine.handle(&session_id, &request.message).await {
        Ok(turn) => {
            info!(session_id = %session_id, state = ?turn.state, "Chat turn completed");
            Ok(Json(ChatResponse {
                response: turn.response,
            }))
        }
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Failed to handle chat message");
            Err(internal_error("Failed to handle message", &e.to_string()))
        }
    }
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionSnapshot> {
    match state.engine.store().get(&session_id).await {
        Ok(Some(handle)) => {
            let session = handle.lock().await;
            Ok(Json(SessionSnapshot::new(
                &session,
                state.engine.schema().len(),
            )))
        }
        Ok(None) => Err(not_found_error("Session not found", &session_id)),
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Failed to load session");
            Err(internal_error("Failed to load session", &e.to_string()))
        }
    }
}

/// Periodically drops sessions idle for longer than `ttl`.
pub fn spawn_session_sweeper(
    store: Arc<dyn SessionStore>,
    ttl: Duration,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick fires immediately; nothing can be idle yet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.evict_idle(ttl).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, remaining = store.len(), "Evicted idle sessions"),
                Err(e) => warn!(error = %e, "Session sweep failed"),
            }
        }
    })
}
