//! Rebuilds the model-facing message history from the persisted turn log.

use forge_llm::{ChatMessage, ToolCall};
use forge_models::{ChatHistory, MessageType};
use tracing::debug;

use crate::db::{self, DbPool};
use crate::error::Result;

/// Content replayed for tool results, which are not persisted.
pub const TOOL_RESULT_PLACEHOLDER: &str = "(tool result not retained)";

#[derive(Clone)]
pub struct ChatMemoryService {
    db: DbPool,
    max_messages: usize,
}

impl ChatMemoryService {
    pub fn new(db: DbPool, max_messages: usize) -> Self {
        Self { db, max_messages }
    }

    /// The newest `max_messages` rows for an app, oldest first, as chat
    /// messages. `current_id` is the row of the message being answered;
    /// it is sent separately and so is left out here.
    pub async fn load(&self, app_id: i64, current_id: Option<i64>) -> Result<Vec<ChatMessage>> {
        let limit = self.max_messages as i64 + 1;
        let mut rows = db::list_recent_messages(&self.db, app_id, limit).await?;

        if let (Some(first), Some(current)) = (rows.first(), current_id) {
            if first.id == current {
                rows.remove(0);
            }
        }
        rows.truncate(self.max_messages);
        rows.reverse();

        let messages: Vec<ChatMessage> = rows.iter().flat_map(replay).collect();
        debug!(app_id, rows = rows.len(), messages = messages.len(), "Chat memory rebuilt");
        Ok(messages)
    }
}

/// One persisted row as the messages the model should see.
fn replay(row: &ChatHistory) -> Vec<ChatMessage> {
    match row.kind() {
        Some(MessageType::User) => vec![ChatMessage::user(&row.message)],
        Some(MessageType::Ai) => {
            let records = row.tool_call_records();
            if records.is_empty() {
                return vec![ChatMessage::assistant(&row.message)];
            }
            let calls: Vec<ToolCall> = records
                .into_iter()
                .map(|r| ToolCall {
                    id: r.id,
                    name: r.name,
                    arguments: r.arguments,
                })
                .collect();
            let results = calls
                .iter()
                .map(|c| ChatMessage::tool_result(&c.id, TOOL_RESULT_PLACEHOLDER));
            std::iter::once(ChatMessage::assistant_with_tools(&row.message, calls.clone()))
                .chain(results)
                .collect()
        }
        None => Vec::new(),
    }
}
