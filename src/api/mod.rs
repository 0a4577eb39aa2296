//! API Routes for Forge
//!
//! Route structure:
//! - /health, /health/ready, /health/live - Health checks
//! - /apps/:app_id/chat/stream - Streamed generation turn
//! - /apps/:app_id/history - Turn log

mod chat;
pub mod status;

use axum::Router;

use crate::AppState;

/// Build the complete API router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(status::routes())
        .nest("/apps", chat::routes())
}
