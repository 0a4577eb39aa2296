//! Wire records for the tool pipeline's event stream.

use serde::{Deserialize, Serialize};

use crate::ToolCallRecord;

/// One event of a tool-augmented generation turn.
///
/// Serialized as a small object tagged by `type`, for example
/// `{"type":"ai_response","data":"..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Partial assistant text
    AiResponse { data: String },
    /// The model asked for a tool; arguments may still be partial
    ToolRequest {
        id: String,
        name: String,
        arguments: String,
    },
    /// A tool finished
    ToolExecuted {
        id: String,
        name: String,
        arguments: String,
        result: String,
    },
}

impl StreamEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            StreamEvent::AiResponse { .. } => "ai_response",
            StreamEvent::ToolRequest { .. } => "tool_request",
            StreamEvent::ToolExecuted { .. } => "tool_executed",
        }
    }

    /// The tool call this event refers to, if any.
    pub fn tool_call(&self) -> Option<ToolCallRecord> {
        match self {
            StreamEvent::AiResponse { .. } => None,
            StreamEvent::ToolRequest { id, name, arguments }
            | StreamEvent::ToolExecuted {
                id, name, arguments, ..
            } => Some(ToolCallRecord::new(id, name, arguments)),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
