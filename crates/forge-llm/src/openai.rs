//! OpenAI-compatible streaming chat client.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::sse::StreamAccumulator;
use crate::{ChatMessage, ChatModel, ChatRequest, Error, ModelEvent, Result, Role, ToolSpec};

/// Maximum attempts to open the stream before giving up
const MAX_RETRIES: u32 = 2;

/// Delay between retries (doubles each time)
const RETRY_DELAY_MS: u64 = 500;

/// Configuration for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl OpenAiConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
            timeout_secs: 300,
            max_tokens: None,
            temperature: None,
        }
    }
}

/// Streaming chat model over `POST {base_url}/chat/completions`.
#[derive(Clone)]
pub struct OpenAiChatModel {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiChatModel {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Request(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn build_request_body(&self, request: &ChatRequest) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "messages": request.messages.iter().map(message_to_openai).collect::<Vec<_>>(),
            "stream": true,
            "stream_options": { "include_usage": true },
        });

        if !request.tools.is_empty() {
            body["tools"] = Value::Array(request.tools.iter().map(tool_to_openai).collect());
        }
        if let Some(max_tokens) = self.config.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = self.config.temperature {
            body["temperature"] = json!(temperature);
        }

        body
    }

    /// Open the stream, retrying only on rate limits and unavailability.
    /// Nothing has been forwarded yet at this point, so a retry is invisible.
    async fn open_stream(&self, body: &Value) -> Result<reqwest::Response> {
        let mut delay = Duration::from_millis(RETRY_DELAY_MS);

        for attempt in 0..MAX_RETRIES {
            let response = self
                .client
                .post(self.endpoint())
                .bearer_auth(&self.config.api_key)
                .json(body)
                .send()
                .await
                .map_err(|e| Error::Request(e.to_string()))?;

            let status = response.status().as_u16();
            if status == 200 {
                return Ok(response);
            }

            let retryable = status == 429 || status == 503;
            if retryable && attempt < MAX_RETRIES - 1 {
                debug!(status, attempt, delay_ms = delay.as_millis(), "Retrying chat request");
                sleep(delay).await;
                delay *= 2;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            warn!(status, model = %self.config.model, "Chat request failed");
            return Err(if status == 429 {
                Error::RateLimitExceeded
            } else {
                Error::Http { status, body }
            });
        }

        Err(Error::Request("Max retries exceeded".to_string()))
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn stream_chat(&self, request: ChatRequest, tx: mpsc::Sender<ModelEvent>) -> Result<()> {
        let body = self.build_request_body(&request);
        debug!(
            model = %self.config.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Starting chat stream"
        );

        let response = self.open_stream(&body).await?;
        let mut stream = response.bytes_stream();
        let mut accumulator = StreamAccumulator::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Request(e.to_string()))?;
            for event in accumulator.push_bytes(&chunk)? {
                // A closed receiver only means nobody is listening to deltas
                let _ = tx.send(event).await;
            }
            if accumulator.is_done() {
                break;
            }
        }

        let response = accumulator.finish()?;
        debug!(
            finish_reason = ?response.finish_reason,
            tool_calls = response.message.tool_calls.len(),
            output_tokens = response.usage.output_tokens,
            "Chat stream complete"
        );
        let _ = tx.send(ModelEvent::Completed(response)).await;
        Ok(())
    }
}

/// Convert a message to OpenAI API format
fn message_to_openai(message: &ChatMessage) -> Value {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };

    let mut msg = json!({ "role": role, "content": message.content });

    if !message.tool_calls.is_empty() {
        msg["tool_calls"] = Value::Array(
            message
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": { "name": call.name, "arguments": call.arguments }
                    })
                })
                .collect(),
        );
    }

    if let Some(ref id) = message.tool_call_id {
        msg["tool_call_id"] = json!(id);
    }

    msg
}

fn tool_to_openai(tool: &ToolSpec) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolCall;

    #[test]
    fn test_request_body_shape() {
        let model = OpenAiChatModel::new(OpenAiConfig::new("http://x/v1/", "qwen-plus", "k")).unwrap();
        let request = ChatRequest::new(vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hi"),
            ChatMessage::assistant_with_tools(
                "",
                vec![ToolCall {
                    id: "c1".into(),
                    name: "readFile".into(),
                    arguments: "{\"relativeFilePath\":\"a\"}".into(),
                }],
            ),
            ChatMessage::tool_result("c1", "content"),
        ])
        .with_tools(vec![ToolSpec {
            name: "readFile".into(),
            description: "Read a file".into(),
            parameters: json!({"type": "object"}),
        }]);

        let body = model.build_request_body(&request);
        assert_eq!(model.endpoint(), "http://x/v1/chat/completions");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][2]["content"], Value::Null);
        assert_eq!(body["messages"][2]["tool_calls"][0]["function"]["name"], "readFile");
        assert_eq!(body["messages"][3]["tool_call_id"], "c1");
        assert_eq!(body["tools"][0]["function"]["name"], "readFile");
    }

    #[test]
    fn test_no_tools_key_without_tools() {
        let model = OpenAiChatModel::new(OpenAiConfig::new("http://x", "m", "k")).unwrap();
        let body = model.build_request_body(&ChatRequest::new(vec![ChatMessage::user("hi")]));
        assert!(body.get("tools").is_none());
    }
}
