//! The bounded model/tool state machine for one turn.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use forge_llm::{ChatMessage, ChatModel, ChatRequest, ChatResponse, ModelEvent, TokenUsage, ToolCall, ToolSpec};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::LoopEvent;
use crate::services::tools::{ToolContext, ToolRegistry};

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    Completed,
    LimitReached,
    Failed(String),
}

enum LoopState {
    AwaitingModel,
    ExecutingTools(Vec<ToolCall>),
    Terminal(LoopOutcome),
}

/// Text of the synthetic assistant message that ends an over-limit turn.
pub fn limit_message(limit: usize) -> String {
    format!(
        "Tool invocation limit reached ({}); please start a new conversation to continue.",
        limit
    )
}

/// Drives model requests and tool execution until the model answers
/// without tool calls, a round fails, or the invocation ceiling is hit.
#[derive(Clone)]
pub struct GenerationLoop {
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolRegistry>,
    max_tool_invocations: usize,
}

impl GenerationLoop {
    pub fn new(model: Arc<dyn ChatModel>, tools: Arc<ToolRegistry>, max_tool_invocations: usize) -> Self {
        Self {
            model,
            tools,
            max_tool_invocations,
        }
    }

    /// Run one turn from `messages`, emitting every event on `tx`.
    ///
    /// Exactly one terminal event (`Completed` or `Failed`) is sent. A closed
    /// receiver does not stop the turn.
    pub async fn run(
        &self,
        mut messages: Vec<ChatMessage>,
        ctx: &ToolContext,
        tx: mpsc::Sender<LoopEvent>,
    ) -> LoopOutcome {
        let specs = self.tools.specs();
        let mut usage = TokenUsage::default();
        let mut executed = 0usize;
        let mut round = 0usize;
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    round += 1;
                    match self.request_round(&messages, &specs, &tx).await {
                        Ok(response) => {
                            add_usage(&mut usage, &response.usage);
                            debug!(
                                app_id = ctx.app_id,
                                round,
                                tool_calls = response.message.tool_calls.len(),
                                "Model round complete"
                            );
                            if response.message.has_tool_calls() {
                                let calls = response.message.tool_calls.clone();
                                messages.push(response.message);
                                LoopState::ExecutingTools(calls)
                            } else {
                                let _ = tx.send(LoopEvent::Completed { usage }).await;
                                LoopState::Terminal(LoopOutcome::Completed)
                            }
                        }
                        Err(message) => {
                            let _ = tx.send(LoopEvent::Failed(message.clone())).await;
                            LoopState::Terminal(LoopOutcome::Failed(message))
                        }
                    }
                }

                LoopState::ExecutingTools(calls) => {
                    if executed + calls.len() > self.max_tool_invocations {
                        warn!(
                            app_id = ctx.app_id,
                            executed,
                            requested = calls.len(),
                            limit = self.max_tool_invocations,
                            "Tool invocation limit reached"
                        );
                        let _ = tx
                            .send(LoopEvent::TextDelta(limit_message(self.max_tool_invocations)))
                            .await;
                        let _ = tx.send(LoopEvent::Completed { usage }).await;
                        LoopState::Terminal(LoopOutcome::LimitReached)
                    } else {
                        match self.execute_batch(calls, &mut messages, ctx, &tx).await {
                            Ok(count) => {
                                executed += count;
                                LoopState::AwaitingModel
                            }
                            Err(message) => {
                                let _ = tx.send(LoopEvent::Failed(message.clone())).await;
                                LoopState::Terminal(LoopOutcome::Failed(message))
                            }
                        }
                    }
                }

                LoopState::Terminal(outcome) => {
                    info!(
                        app_id = ctx.app_id,
                        rounds = round,
                        tool_invocations = executed,
                        output_tokens = usage.output_tokens,
                        outcome = ?outcome,
                        "Generation loop finished"
                    );
                    return outcome;
                }
            };
        }
    }

    /// One streamed model request. Deltas are forwarded as they arrive;
    /// a tool request is announced as soon as its id is known.
    async fn request_round(
        &self,
        messages: &[ChatMessage],
        specs: &[ToolSpec],
        tx: &mpsc::Sender<LoopEvent>,
    ) -> Result<ChatResponse, String> {
        let request = ChatRequest::new(messages.to_vec()).with_tools(specs.to_vec());
        let (model_tx, mut model_rx) = mpsc::channel(64);

        let forward = async {
            let mut pending: HashMap<usize, (Option<String>, String, String)> = HashMap::new();
            let mut announced: HashSet<String> = HashSet::new();
            let mut completed = None;

            while let Some(event) = model_rx.recv().await {
                match event {
                    ModelEvent::TextDelta(text) => {
                        let _ = tx.send(LoopEvent::TextDelta(text)).await;
                    }
                    ModelEvent::ToolCallDelta {
                        index,
                        id,
                        name,
                        arguments,
                    } => {
                        let entry = pending.entry(index).or_default();
                        if id.is_some() {
                            entry.0 = id;
                        }
                        if let Some(name) = name {
                            entry.1.push_str(&name);
                        }
                        entry.2.push_str(&arguments);

                        if let Some(id) = entry.0.clone() {
                            if !entry.1.is_empty() && announced.insert(id.clone()) {
                                let _ = tx
                                    .send(LoopEvent::ToolRequest {
                                        id,
                                        name: entry.1.clone(),
                                        arguments: entry.2.clone(),
                                    })
                                    .await;
                            }
                        }
                    }
                    ModelEvent::Completed(response) => {
                        for call in &response.message.tool_calls {
                            if announced.insert(call.id.clone()) {
                                let _ = tx
                                    .send(LoopEvent::ToolRequest {
                                        id: call.id.clone(),
                                        name: call.name.clone(),
                                        arguments: call.arguments.clone(),
                                    })
                                    .await;
                            }
                        }
                        completed = Some(response);
                    }
                }
            }
            completed
        };

        let (result, completed) = tokio::join!(self.model.stream_chat(request, model_tx), forward);

        if let Err(e) = result {
            warn!(error = %e, "Model request failed");
            return Err(e.to_string());
        }
        completed.ok_or_else(|| "model stream ended without a completion".to_string())
    }

    /// Execute one batch in request order, appending each result to memory.
    async fn execute_batch(
        &self,
        calls: Vec<ToolCall>,
        messages: &mut Vec<ChatMessage>,
        ctx: &ToolContext,
        tx: &mpsc::Sender<LoopEvent>,
    ) -> Result<usize, String> {
        let count = calls.len();
        for call in calls {
            let result = self
                .tools
                .execute(&call.name, &call.arguments, ctx)
                .await
                .map_err(|e| {
                    warn!(app_id = ctx.app_id, tool = %call.name, error = %e, "Tool execution failed");
                    e.to_string()
                })?;

            messages.push(ChatMessage::tool_result(&call.id, &result));
            let _ = tx
                .send(LoopEvent::ToolExecuted {
                    id: call.id,
                    name: call.name,
                    arguments: call.arguments,
                    result,
                })
                .await;
        }
        Ok(count)
    }
}

fn add_usage(total: &mut TokenUsage, round: &TokenUsage) {
    total.input_tokens += round.input_tokens;
    total.output_tokens += round.output_tokens;
    total.total_tokens += round.total_tokens;
}
