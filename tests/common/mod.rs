//! Shared harness for integration tests.
//!
//! Everything runs in-process: a scripted chat model, in-memory SQLite,
//! the in-memory vector store with hash embeddings, and a temporary
//! output root for generated projects.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use forge::config::Config;
use forge::db::{self, DbPool};
use forge::services::{DeliveryEvent, TurnStream};
use forge::AppState;
use forge_embeddings::{Embedder, EmbeddingService};
use forge_llm::{ChatMessage, ChatModel, ChatRequest, ChatResponse, ModelEvent, TokenUsage, ToolCall};
use forge_models::ChatHistory;
use forge_qdrant::{MemoryVectorStore, SearchFilter, VectorStore};
use tempfile::TempDir;
use tokio::sync::mpsc;

pub const EMBEDDING_DIM: usize = 256;

// ============================================================================
// Scripted model
// ============================================================================

/// One scripted model round.
#[derive(Debug, Clone)]
pub enum Reply {
    Message(ChatMessage),
    /// Stream the text, then fail without a completion
    Fail { partial: String, error: String },
}

/// Plays back replies in order, streaming text in small deltas and tool
/// calls as id/name then argument deltas. Records every request.
pub struct StubModel {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ChatRequest>>,
    delta_delay: Option<Duration>,
}

impl StubModel {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            delta_delay: None,
        }
    }

    pub fn with_delta_delay(mut self, delay: Duration) -> Self {
        self.delta_delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Text of the final user message of request `n`.
    pub fn user_prompt(&self, n: usize) -> String {
        let requests = self.requests.lock().unwrap();
        requests[n]
            .messages
            .iter()
            .rev()
            .find(|m| m.role == forge_llm::Role::User)
            .map(|m| m.text_content().to_string())
            .unwrap_or_default()
    }

    async fn send_text(&self, text: &str, tx: &mpsc::Sender<ModelEvent>) {
        let chars: Vec<char> = text.chars().collect();
        for piece in chars.chunks(8) {
            if let Some(delay) = self.delta_delay {
                tokio::time::sleep(delay).await;
            }
            let _ = tx.send(ModelEvent::TextDelta(piece.iter().collect())).await;
        }
    }
}

#[async_trait]
impl ChatModel for StubModel {
    async fn stream_chat(&self, request: ChatRequest, tx: mpsc::Sender<ModelEvent>) -> forge_llm::Result<()> {
        self.requests.lock().unwrap().push(request);
        let Some(reply) = self.replies.lock().unwrap().pop_front() else {
            return Err(forge_llm::Error::Request("script exhausted".into()));
        };

        match reply {
            Reply::Fail { partial, error } => {
                self.send_text(&partial, &tx).await;
                Err(forge_llm::Error::Request(error))
            }
            Reply::Message(message) => {
                self.send_text(message.text_content(), &tx).await;
                for (index, call) in message.tool_calls.iter().enumerate() {
                    let _ = tx
                        .send(ModelEvent::ToolCallDelta {
                            index,
                            id: Some(call.id.clone()),
                            name: Some(call.name.clone()),
                            arguments: String::new(),
                        })
                        .await;
                    let _ = tx
                        .send(ModelEvent::ToolCallDelta {
                            index,
                            id: None,
                            name: None,
                            arguments: call.arguments.clone(),
                        })
                        .await;
                }
                let finish_reason = if message.has_tool_calls() { "tool_calls" } else { "stop" };
                let _ = tx
                    .send(ModelEvent::Completed(ChatResponse {
                        message,
                        usage: TokenUsage {
                            input_tokens: 10,
                            output_tokens: 5,
                            total_tokens: 15,
                        },
                        finish_reason: Some(finish_reason.to_string()),
                    }))
                    .await;
                Ok(())
            }
        }
    }
}

pub fn text(content: &str) -> Reply {
    Reply::Message(ChatMessage::assistant(content))
}

pub fn tools(calls: Vec<ToolCall>) -> Reply {
    Reply::Message(ChatMessage::assistant_with_tools("", calls))
}

pub fn call(id: &str, name: &str, arguments: serde_json::Value) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }
}

pub fn write_file(id: &str, path: &str, content: &str) -> ToolCall {
    call(
        id,
        "writeFile",
        serde_json::json!({ "relativeFilePath": path, "content": content }),
    )
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub state: AppState,
    pub model: Arc<StubModel>,
    pub store: MemoryVectorStore,
    pub embedder: Arc<dyn Embedder>,
    pub config: Config,
    pub output: TempDir,
}

impl Harness {
    pub async fn new(model: StubModel) -> Self {
        Self::with_config(model, |_| {}).await
    }

    pub async fn with_config(model: StubModel, configure: impl FnOnce(&mut Config)) -> Self {
        let output = TempDir::new().unwrap();

        let mut config = Config::default();
        config.storage.code_output_root = output.path().to_string_lossy().into_owned();
        config.build.enabled = false;
        config.tools.pexels_api_key = None;
        configure(&mut config);

        let pool = db::init_pool(":memory:").await.unwrap();
        db::initialize_schema(&pool).await.unwrap();

        let model = Arc::new(model);
        let store = MemoryVectorStore::new();
        let embedder: Arc<dyn Embedder> = Arc::new(EmbeddingService::hashed(EMBEDDING_DIM));
        let state = AppState::from_parts(
            pool,
            model.clone(),
            embedder.clone(),
            Arc::new(store.clone()) as Arc<dyn VectorStore>,
            &config,
        );

        Self {
            state,
            model,
            store,
            embedder,
            config,
            output,
        }
    }

    pub fn db(&self) -> &DbPool {
        &self.state.db
    }

    pub async fn history(&self, app_id: i64) -> Vec<ChatHistory> {
        db::list_recent_messages(self.db(), app_id, 100).await.unwrap()
    }

    pub async fn fragment_count(&self, app_id: i64) -> usize {
        self.store
            .count(&SearchFilter::new().with_project_id(&app_id.to_string()))
            .await
    }

    /// Poll until the app has `at_least` fragments indexed.
    pub async fn wait_for_fragments(&self, app_id: i64, at_least: usize) -> usize {
        for _ in 0..200 {
            let count = self.fragment_count(app_id).await;
            if count >= at_least {
                return count;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.fragment_count(app_id).await
    }
}

/// Drain a turn to its end and return every delivered event.
pub async fn drain(mut turn: TurnStream) -> Vec<DeliveryEvent> {
    let mut events = Vec::new();
    while let Some(event) = turn.events.recv().await {
        events.push(event);
    }
    turn.finished.await.unwrap();
    events
}

/// Concatenated chunk text.
pub fn chunks(events: &[DeliveryEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            DeliveryEvent::Chunk(c) => Some(c.as_str()),
            _ => None,
        })
        .collect()
}
