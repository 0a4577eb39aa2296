//! Status Routes
//!
//! Routes:
//! - GET /health - Basic health check
//! - GET /health/ready - Readiness check (database reachable)
//! - GET /health/live - Liveness check with uptime

use std::sync::OnceLock;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;
use serde_json::json;

use crate::AppState;

static STARTUP_TIME: OnceLock<Instant> = OnceLock::new();

/// Initialize startup time. Call this once at server start.
pub fn init_startup_time() {
    let _ = STARTUP_TIME.get_or_init(Instant::now);
}

fn uptime_seconds() -> u64 {
    STARTUP_TIME.get().map(|start| start.elapsed().as_secs()).unwrap_or(0)
}

/// Build status routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness_check))
        .route("/health/live", get(liveness_check))
}

/// GET /health
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /health/ready
///
/// Returns 503 when the database does not answer.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "tools": state.tools.names() })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable", "message": e.to_string() })),
            )
        }
    }
}

/// GET /health/live
async fn liveness_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": uptime_seconds(),
        "timestamp": Utc::now(),
    }))
}
