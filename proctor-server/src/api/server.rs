//! Router assembly

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::api::{proctoring, results, sessions, sse, ws};
use crate::state::AppContext;

/// Build the full application router
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Session lifecycle
        .route("/api/v1/sessions/start", post(sessions::start_session))
        .route(
            "/api/v1/sessions/:session_id/answers",
            post(sessions::submit_answer),
        )
        .route(
            "/api/v1/sessions/:session_id/finish",
            post(sessions::finish_session),
        )
        // Proctoring channels
        .route("/api/v1/proctoring/frame", post(proctoring::process_frame))
        .route("/api/v1/proctoring/audio", post(proctoring::process_audio))
        .route("/api/v1/proctoring/raf", post(proctoring::process_raf))
        .route(
            "/api/v1/proctoring/violation",
            post(proctoring::process_violation),
        )
        // Reads
        .route(
            "/api/v1/sessions/:session_id/integrity",
            get(proctoring::get_integrity),
        )
        .route(
            "/api/v1/sessions/:session_id/result",
            get(results::get_session_result),
        )
        // Real-time
        .route("/api/v1/proctoring/events", get(sse::event_stream))
        .route("/ws/sessions/:session_id", get(ws::session_channel))
        .with_state(ctx)
        // Browser clients post camera frames from another origin
        .layer(CorsLayer::permissive())
}

/// Health check endpoint
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "proctor-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
