//! Chat Routes
//!
//! Routes:
//! - GET /apps/:app_id/chat/stream - Run one turn, streamed as SSE
//! - GET /apps/:app_id/history - Newest-first turn log
//! - DELETE /apps/:app_id/history - Clear the turn log and the app's fragments
//! - POST /apps/:app_id/index - Rebuild the app's fragments from disk

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use forge_models::{ChatHistory, CodeGenType};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio_stream::wrappers::ReceiverStream;

use crate::db;
use crate::services::{DeliveryEvent, TurnRequest};
use crate::{AppState, Error, Result};

/// Default page size for history listing
const DEFAULT_HISTORY_LIMIT: i64 = 20;

/// Upper bound for a history page
const MAX_HISTORY_LIMIT: i64 = 100;

/// Build chat routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/:app_id/chat/stream", get(chat_stream))
        .route("/:app_id/history", get(list_history).delete(clear_history))
        .route("/:app_id/index", post(reindex_project))
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatStreamQuery {
    pub message: String,
    #[serde(default)]
    pub codegen_type: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Stream wire records instead of rendered text
    #[serde(default)]
    pub raw: bool,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Run one generation turn.
///
/// GET /apps/:app_id/chat/stream?message=..&codegen_type=..&user_id=..
///
/// Input errors are returned as plain JSON errors before the stream opens.
/// Once streaming, chunks arrive as `{"d": ".."}` data events, followed by
/// either a `done` event or a `business-error` event.
async fn chat_stream(
    State(state): State<AppState>,
    Path(app_id): Path<i64>,
    Query(query): Query<ChatStreamQuery>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let codegen_type = match query.codegen_type.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(raw) => Some(
            CodeGenType::from_str(raw)
                .ok_or_else(|| Error::InvalidInput(format!("Unknown code generation type: {}", raw)))?,
        ),
        None => None,
    };

    let turn = state
        .facade
        .generate(TurnRequest {
            app_id,
            user_id: query.user_id.unwrap_or(0),
            message: query.message,
            codegen_type,
            raw: query.raw,
        })
        .await?;

    tracing::debug!(app_id, codegen_type = turn.codegen_type.as_str(), "Streaming turn");

    let stream = ReceiverStream::new(turn.events).map(|event| Ok::<_, Infallible>(to_sse_event(event)));

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}

fn to_sse_event(event: DeliveryEvent) -> Event {
    match event {
        DeliveryEvent::Chunk(chunk) => Event::default().data(json!({ "d": chunk }).to_string()),
        DeliveryEvent::Completed => Event::default().event("done").data(""),
        DeliveryEvent::Failed(message) => Event::default()
            .event("business-error")
            .data(json!({ "error": true, "message": message }).to_string()),
    }
}

/// List recent turns.
///
/// GET /apps/:app_id/history?limit=..
async fn list_history(
    State(state): State<AppState>,
    Path(app_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ChatHistory>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let rows = db::list_recent_messages(&state.db, app_id, limit).await?;
    Ok(Json(rows))
}

/// Clear an app's history.
///
/// DELETE /apps/:app_id/history
async fn clear_history(State(state): State<AppState>, Path(app_id): Path<i64>) -> Result<Json<serde_json::Value>> {
    let deleted = state.facade.clear_history(app_id).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

/// Rebuild an app's index from its files.
///
/// POST /apps/:app_id/index
async fn reindex_project(State(state): State<AppState>, Path(app_id): Path<i64>) -> Result<Json<serde_json::Value>> {
    let files = state.facade.reindex_project(app_id).await?;
    Ok(Json(json!({ "files": files })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_query_defaults() {
        let query: HistoryQuery = serde_json::from_str("{}").unwrap();
        assert!(query.limit.is_none());
    }

    #[test]
    fn test_stream_query_optional_fields() {
        let query: ChatStreamQuery = serde_json::from_value(json!({ "message": "hi" })).unwrap();
        assert_eq!(query.message, "hi");
        assert!(query.codegen_type.is_none());
        assert!(!query.raw);
    }
}
