//! Streaming chat model transport with tool calling.
//!
//! [`ChatModel`] is the seam the generation loop drives: one call streams a
//! single model turn as [`ModelEvent`]s (text deltas, tool-call deltas) and
//! finishes with exactly one [`ModelEvent::Completed`]. [`OpenAiChatModel`]
//! implements it for OpenAI-compatible `/chat/completions` endpoints.
//!
//! This crate has no knowledge of tools' behaviour; it only carries their
//! declarations to the model and the model's requests back.

mod openai;
mod sse;

pub use openai::{OpenAiChatModel, OpenAiConfig};
pub use sse::StreamAccumulator;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Error types for the model transport.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Malformed stream data: {0}")]
    Malformed(String),

    #[error("Model stream ended without a completion")]
    IncompleteStream,
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON argument string as produced by the model
    pub arguments: String,
}

/// One chat message in the request history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Assistant turn that asks for tools; empty text is sent as `null`.
    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        let content = content.into();
        Self {
            role: Role::Assistant,
            content: (!content.is_empty()).then_some(content),
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn text_content(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Declaration of a tool the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: Value,
}

/// One model request.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// The complete assistant message for one model turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub message: ChatMessage,
    pub usage: TokenUsage,
    pub finish_reason: Option<String>,
}

// ============================================================================
// Streaming
// ============================================================================

/// Incremental output of one model turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    TextDelta(String),
    /// Tool-call fragment; `id`/`name` arrive on the first delta for an index
    ToolCallDelta {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: String,
    },
    Completed(ChatResponse),
}

/// A streaming chat model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Stream one turn into `tx`. Implementations send deltas as they arrive
    /// and end with a single [`ModelEvent::Completed`] on success.
    async fn stream_chat(&self, request: ChatRequest, tx: mpsc::Sender<ModelEvent>) -> Result<()>;

    /// Run one turn and return only the complete response.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let (tx, mut rx) = mpsc::channel(64);
        let collect = async {
            let mut completed = None;
            while let Some(event) = rx.recv().await {
                if let ModelEvent::Completed(response) = event {
                    completed = Some(response);
                }
            }
            completed
        };
        let (result, completed) = tokio::join!(self.stream_chat(request, tx), collect);
        result?;
        completed.ok_or(Error::IncompleteStream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl ChatModel for Echo {
        async fn stream_chat(&self, request: ChatRequest, tx: mpsc::Sender<ModelEvent>) -> Result<()> {
            let text = request
                .messages
                .last()
                .map(|m| m.text_content().to_string())
                .unwrap_or_default();
            let _ = tx.send(ModelEvent::TextDelta(text.clone())).await;
            let _ = tx
                .send(ModelEvent::Completed(ChatResponse {
                    message: ChatMessage::assistant(text),
                    usage: TokenUsage::default(),
                    finish_reason: Some("stop".into()),
                }))
                .await;
            Ok(())
        }
    }

    struct Silent;

    #[async_trait]
    impl ChatModel for Silent {
        async fn stream_chat(&self, _request: ChatRequest, _tx: mpsc::Sender<ModelEvent>) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_chat_collects_completion() {
        let response = Echo
            .chat(ChatRequest::new(vec![ChatMessage::user("vue_project")]))
            .await
            .unwrap();
        assert_eq!(response.message.text_content(), "vue_project");
    }

    #[tokio::test]
    async fn test_chat_without_completion_is_an_error() {
        let err = Silent.chat(ChatRequest::default()).await.unwrap_err();
        assert!(matches!(err, Error::IncompleteStream));
    }

    #[test]
    fn test_assistant_with_tools_drops_empty_text() {
        let msg = ChatMessage::assistant_with_tools(
            "",
            vec![ToolCall {
                id: "c1".into(),
                name: "readFile".into(),
                arguments: "{}".into(),
            }],
        );
        assert_eq!(msg.content, None);
        assert!(msg.has_tool_calls());
    }
}
