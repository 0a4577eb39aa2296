//! Chat history queries.
//!
//! The turn log is append-only: rows are inserted and bulk-deleted per app,
//! never updated.

use forge_models::{ChatHistory, MessageType, ToolCallRecord};

use super::DbPool;
use crate::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// Input for appending one message.
#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub app_id: i64,
    pub message: String,
    pub message_type: MessageType,
    pub tool_calls: Vec<ToolCallRecord>,
    pub user_id: i64,
}

impl NewChatMessage {
    pub fn user(app_id: i64, user_id: i64, message: impl Into<String>) -> Self {
        Self {
            app_id,
            message: message.into(),
            message_type: MessageType::User,
            tool_calls: Vec::new(),
            user_id,
        }
    }

    pub fn ai(app_id: i64, user_id: i64, message: impl Into<String>) -> Self {
        Self {
            app_id,
            message: message.into(),
            message_type: MessageType::Ai,
            tool_calls: Vec::new(),
            user_id,
        }
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCallRecord>) -> Self {
        self.tool_calls = tool_calls;
        self
    }
}

// ============================================================================
// Queries
// ============================================================================

/// Append one message. Tool calls are stored as a JSON array, or NULL when
/// there are none.
pub async fn insert_chat_message(pool: &DbPool, input: NewChatMessage) -> Result<ChatHistory> {
    let tool_calls = if input.tool_calls.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&input.tool_calls)?)
    };

    sqlx::query_as::<_, ChatHistory>(
        r#"
        INSERT INTO chat_history (app_id, message, message_type, tool_calls, user_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(input.app_id)
    .bind(&input.message)
    .bind(input.message_type.as_str())
    .bind(tool_calls)
    .bind(input.user_id)
    .bind(forge_models::now())
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

/// Newest-first rows for an app.
pub async fn list_recent_messages(pool: &DbPool, app_id: i64, limit: i64) -> Result<Vec<ChatHistory>> {
    sqlx::query_as::<_, ChatHistory>(
        r#"
        SELECT * FROM chat_history
        WHERE app_id = ?
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(app_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Delete every row of an app. Returns the number of rows removed.
pub async fn delete_messages_by_app(pool: &DbPool, app_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM chat_history WHERE app_id = ?")
        .bind(app_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
