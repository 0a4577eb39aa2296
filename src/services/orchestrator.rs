//! Turn orchestration: one entry point per user message.
//!
//! A turn runs on two independently owned channels. The generation channel
//! carries [`LoopEvent`]s from the loop task to the dispatcher and always
//! runs to the end. The delivery channel carries caller chunks and may be
//! dropped at any time; once a send fails the dispatcher stops delivering
//! but keeps collecting. The turn is persisted exactly once, on whichever
//! comes first of completion, failure, or the generation channel closing
//! (or the dispatcher being dropped) without either.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use forge_llm::{ChatMessage, ChatModel};
use forge_models::CodeGenType;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::generation::{protocol, GenerationLoop, LoopEvent, Relay, StreamCollector};
use super::rag::{IndexerService, PromptAugmenter, RagListener};
use super::tools::{ToolContext, ToolRegistry};
use super::{chat_memory::ChatMemoryService, code_parser, guardrail, project_summary, prompts, router, ProjectBuilder};
use crate::config::GenerationConfig;
use crate::db::{self, DbPool, NewChatMessage};
use crate::error::{Error, Result};

/// Buffered loop events between the loop task and the dispatcher
const GENERATION_BUFFER: usize = 256;

/// Buffered chunks waiting for the caller
const DELIVERY_BUFFER: usize = 64;

/// One user message to answer.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub app_id: i64,
    pub user_id: i64,
    pub message: String,
    /// `None` asks the model to pick
    pub codegen_type: Option<CodeGenType>,
    /// Deliver wire records as JSON instead of rendered text
    pub raw: bool,
}

impl TurnRequest {
    pub fn new(app_id: i64, message: impl Into<String>, codegen_type: CodeGenType) -> Self {
        Self {
            app_id,
            user_id: 0,
            message: message.into(),
            codegen_type: Some(codegen_type),
            raw: false,
        }
    }
}

/// What the caller receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryEvent {
    Chunk(String),
    Completed,
    Failed(String),
}

/// Handle to a running turn.
pub struct TurnStream {
    pub codegen_type: CodeGenType,
    pub events: mpsc::Receiver<DeliveryEvent>,
    /// Resolves once the turn is persisted and post-completion work started
    pub finished: JoinHandle<()>,
}

/// Collaborators of the facade.
pub struct FacadeDeps {
    pub db: DbPool,
    pub model: Arc<dyn ChatModel>,
    pub tools: Arc<ToolRegistry>,
    pub augmenter: PromptAugmenter,
    pub indexer: IndexerService,
    pub memory: ChatMemoryService,
    pub builder: ProjectBuilder,
    pub generation: GenerationConfig,
    pub output_root: PathBuf,
}

#[derive(Clone)]
pub struct CodeGeneratorFacade {
    inner: Arc<FacadeInner>,
}

struct FacadeInner {
    db: DbPool,
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolRegistry>,
    no_tools: Arc<ToolRegistry>,
    augmenter: PromptAugmenter,
    indexer: IndexerService,
    listener: RagListener,
    memory: ChatMemoryService,
    builder: ProjectBuilder,
    generation: GenerationConfig,
    output_root: PathBuf,
}

impl CodeGeneratorFacade {
    pub fn new(deps: FacadeDeps) -> Self {
        Self {
            inner: Arc::new(FacadeInner {
                listener: RagListener::new(deps.indexer.clone()),
                no_tools: Arc::new(ToolRegistry::new()),
                db: deps.db,
                model: deps.model,
                tools: deps.tools,
                augmenter: deps.augmenter,
                indexer: deps.indexer,
                memory: deps.memory,
                builder: deps.builder,
                generation: deps.generation,
                output_root: deps.output_root,
            }),
        }
    }

    /// Start a turn. Validation and setup errors return before any stream
    /// exists; after that every outcome arrives on the stream.
    pub async fn generate(&self, request: TurnRequest) -> Result<TurnStream> {
        guardrail::check_input(&request.message)?;
        let inner = &self.inner;

        let codegen_type = match request.codegen_type {
            Some(t) => t,
            None => router::route_codegen_type(inner.model.as_ref(), &request.message).await,
        };
        info!(
            app_id = request.app_id,
            user_id = request.user_id,
            codegen_type = %codegen_type,
            "Starting generation turn"
        );

        let user_row = db::insert_chat_message(
            &inner.db,
            NewChatMessage::user(request.app_id, request.user_id, request.message.clone()),
        )
        .await?;

        let prompt = inner
            .augmenter
            .augment(&request.message, request.app_id, codegen_type)
            .await;
        let history = inner.memory.load(request.app_id, Some(user_row.id)).await?;

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(prompts::system_prompt(codegen_type)));
        messages.extend(history);
        messages.push(ChatMessage::user(prompt));

        let tools = if codegen_type.uses_tools() {
            inner.tools.clone()
        } else {
            inner.no_tools.clone()
        };
        let generation = GenerationLoop::new(inner.model.clone(), tools.clone(), inner.generation.max_tool_invocations);
        let ctx = ToolContext::new(request.app_id, inner.output_root.clone());

        let (loop_tx, loop_rx) = mpsc::channel(GENERATION_BUFFER);
        let (delivery_tx, delivery_rx) = mpsc::channel(DELIVERY_BUFFER);

        let loop_ctx = ctx.clone();
        tokio::spawn(async move {
            generation.run(messages, &loop_ctx, loop_tx).await;
        });

        let turn = Turn {
            inner: self.inner.clone(),
            relay: Relay::new(tools, &inner.generation.silent_tools),
            ctx,
            codegen_type,
            user_id: request.user_id,
            raw: request.raw,
            delivery: delivery_tx,
            delivering: true,
        };
        let finished = tokio::spawn(turn.dispatch(loop_rx));

        Ok(TurnStream {
            codegen_type,
            events: delivery_rx,
            finished,
        })
    }

    /// Delete an app's history and its indexed fragments.
    pub async fn clear_history(&self, app_id: i64) -> Result<u64> {
        let deleted = db::delete_messages_by_app(&self.inner.db, app_id).await?;
        if let Err(e) = self.inner.indexer.delete_project(&app_id.to_string()).await {
            warn!(app_id, error = %e, "Failed to delete project fragments");
        }
        info!(app_id, deleted, "Cleared chat history");
        Ok(deleted)
    }

    /// Rebuild an app's fragments from its project directory on disk.
    /// Returns the number of files indexed.
    pub async fn reindex_project(&self, app_id: i64) -> Result<usize> {
        let root = ToolContext::new(app_id, self.inner.output_root.clone()).project_root();
        if !project_summary::is_dir(&root).await {
            return Err(Error::NotFound(format!("project directory for app {}", app_id)));
        }

        let project_id = app_id.to_string();
        self.inner.indexer.delete_project(&project_id).await?;
        self.inner.indexer.index_project(&project_id, &root).await
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Per-turn consumer of the generation channel.
struct Turn {
    inner: Arc<FacadeInner>,
    relay: Relay,
    ctx: ToolContext,
    codegen_type: CodeGenType,
    user_id: i64,
    raw: bool,
    delivery: mpsc::Sender<DeliveryEvent>,
    delivering: bool,
}

impl Turn {
    async fn dispatch(mut self, mut loop_rx: mpsc::Receiver<LoopEvent>) {
        let collector = Arc::new(StreamCollector::new());
        let guard = SaveGuard {
            saved: Arc::new(AtomicBool::new(false)),
            db: self.inner.db.clone(),
            collector: collector.clone(),
            app_id: self.ctx.app_id,
            user_id: self.user_id,
        };

        while let Some(event) = loop_rx.recv().await {
            if let LoopEvent::ToolExecuted { name, arguments, .. } = &event {
                self.inner.listener.on_tool_executed(name, arguments, &self.ctx);
            }

            if let Some(record) = protocol::encode(&event) {
                if let Some(call) = record.tool_call() {
                    collector.record_tool_call(call);
                }
                let rendered = self.relay.render(&record);
                if let Some(ref text) = rendered {
                    collector.append_text(text);
                }
                let chunk = if self.raw {
                    Some(self.relay.redact(record).to_json())
                } else {
                    rendered
                };
                if let Some(chunk) = chunk {
                    self.deliver(DeliveryEvent::Chunk(chunk)).await;
                }
            }

            match event {
                LoopEvent::Completed { usage } => {
                    debug!(app_id = self.ctx.app_id, total_tokens = usage.total_tokens, "Turn completed");
                    guard.save().await;
                    self.after_completion(&collector).await;
                    self.deliver(DeliveryEvent::Completed).await;
                    return;
                }
                LoopEvent::Failed(message) => {
                    error!(app_id = self.ctx.app_id, error = %message, "Generation failed");
                    guard.save().await;
                    self.deliver(DeliveryEvent::Failed(message)).await;
                    return;
                }
                _ => {}
            }
        }

        warn!(app_id = self.ctx.app_id, "Generation ended without a terminal event");
        guard.save().await;
        self.deliver(DeliveryEvent::Failed("generation ended unexpectedly".to_string()))
            .await;
    }

    /// Forward to the caller while it is still listening.
    async fn deliver(&mut self, event: DeliveryEvent) {
        if !self.delivering {
            return;
        }
        if self.delivery.send(event).await.is_err() {
            self.delivering = false;
            info!(app_id = self.ctx.app_id, "Caller disconnected, generation continues");
        }
    }

    async fn after_completion(&self, collector: &StreamCollector) {
        let app_id = self.ctx.app_id;
        match code_parser::parse(self.codegen_type, &collector.full_text()) {
            Some(code) => {
                if let Err(e) = code_parser::save(&self.inner.output_root, self.codegen_type, app_id, &code).await {
                    warn!(app_id, error = %e, "Failed to save generated code");
                }
            }
            None => {
                let project_dir = self.inner.output_root.join(self.codegen_type.dir_name(app_id));
                self.inner.builder.spawn_build(project_dir);
            }
        }
    }
}

/// Persists the collected turn once. Dropping an unsaved guard (the
/// dispatcher was cancelled) still saves, on a fresh task.
struct SaveGuard {
    saved: Arc<AtomicBool>,
    db: DbPool,
    collector: Arc<StreamCollector>,
    app_id: i64,
    user_id: i64,
}

impl SaveGuard {
    fn claim(&self) -> bool {
        self.saved
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    async fn save(&self) {
        if self.claim() {
            save_turn(&self.db, self.app_id, self.user_id, &self.collector).await;
        }
    }
}

impl Drop for SaveGuard {
    fn drop(&mut self) {
        if !self.claim() {
            return;
        }
        let (db, collector, app_id, user_id) = (self.db.clone(), self.collector.clone(), self.app_id, self.user_id);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { save_turn(&db, app_id, user_id, &collector).await });
            }
            Err(_) => error!(app_id, "No runtime to persist an interrupted turn"),
        }
    }
}

async fn save_turn(db: &DbPool, app_id: i64, user_id: i64, collector: &StreamCollector) {
    let text = collector.full_text();
    if text.trim().is_empty() {
        warn!(app_id, "Empty AI response, not saved");
        return;
    }

    let tool_calls = collector.tool_calls();
    let count = tool_calls.len();
    let message = NewChatMessage::ai(app_id, user_id, text).with_tool_calls(tool_calls);
    match db::insert_chat_message(db, message).await {
        Ok(row) => info!(app_id, row_id = row.id, tool_calls = count, "Saved AI response"),
        Err(e) => error!(app_id, error = %e, "Failed to save AI response"),
    }
}
