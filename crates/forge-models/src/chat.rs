//! Chat history model: the append-only log of conversation turns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

/// Who produced a persisted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    User,
    Ai,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::User => "user",
            MessageType::Ai => "ai",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(MessageType::User),
            "ai" => Some(MessageType::Ai),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One model-requested tool invocation within a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Unique within a turn
    pub id: String,
    pub name: String,
    /// Serialized JSON arguments
    pub arguments: String,
}

impl ToolCallRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// A persisted chat history row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct ChatHistory {
    pub id: i64,
    pub app_id: i64,
    pub message: String,
    pub message_type: String,
    /// JSON array of [`ToolCallRecord`], in request order
    pub tool_calls: Option<String>,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

impl ChatHistory {
    pub fn kind(&self) -> Option<MessageType> {
        MessageType::from_str(&self.message_type)
    }

    /// Decoded tool calls; malformed JSON reads as no calls.
    pub fn tool_call_records(&self) -> Vec<ToolCallRecord> {
        self.tool_calls
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default()
    }
}
