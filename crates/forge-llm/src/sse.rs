//! Server-sent event parsing for OpenAI-style chat streams.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::{ChatMessage, ChatResponse, Error, ModelEvent, Result, TokenUsage, ToolCall};

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<StreamUsage>,
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Option<StreamDelta>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCall {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<StreamFunction>,
}

#[derive(Debug, Deserialize)]
struct StreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: String,
}

/// Turns raw SSE bytes into [`ModelEvent`]s and assembles the final message.
///
/// Bytes are buffered until a full line is available so multi-byte
/// characters split across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    buffer: Vec<u8>,
    content: String,
    tool_calls: BTreeMap<usize, ToolCall>,
    usage: TokenUsage,
    finish_reason: Option<String>,
    done: bool,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a network chunk; returns events for every complete line in it.
    pub fn push_bytes(&mut self, chunk: &[u8]) -> Result<Vec<ModelEvent>> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&line);
            events.extend(self.push_line(&line)?);
        }

        Ok(events)
    }

    /// Handle one SSE line. Comments, `event:` lines and blanks are ignored.
    pub fn push_line(&mut self, line: &str) -> Result<Vec<ModelEvent>> {
        let line = line.trim();
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(Vec::new());
        };
        let data = data.trim();

        if data == "[DONE]" {
            self.done = true;
            return Ok(Vec::new());
        }
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let chunk: StreamChunk =
            serde_json::from_str(data).map_err(|e| Error::Malformed(format!("{}: {}", e, data)))?;

        if let Some(error) = chunk.error {
            return Err(Error::Request(error.message));
        }

        if let Some(usage) = chunk.usage {
            self.usage = TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            };
        }

        let mut events = Vec::new();
        for choice in chunk.choices {
            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(reason);
            }
            let Some(delta) = choice.delta else { continue };

            if let Some(text) = delta.content.filter(|t| !t.is_empty()) {
                self.content.push_str(&text);
                events.push(ModelEvent::TextDelta(text));
            }

            for call in delta.tool_calls.unwrap_or_default() {
                let (name, arguments) = match call.function {
                    Some(f) => (f.name, f.arguments.unwrap_or_default()),
                    None => (None, String::new()),
                };

                let entry = self.tool_calls.entry(call.index).or_insert_with(|| ToolCall {
                    id: String::new(),
                    name: String::new(),
                    arguments: String::new(),
                });
                if let Some(ref id) = call.id {
                    entry.id = id.clone();
                }
                if let Some(ref name) = name {
                    entry.name.push_str(name);
                }
                entry.arguments.push_str(&arguments);

                events.push(ModelEvent::ToolCallDelta {
                    index: call.index,
                    id: call.id,
                    name,
                    arguments,
                });
            }
        }

        Ok(events)
    }

    /// True once `[DONE]` was seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Assemble the complete response. A stream that stopped before either
    /// `[DONE]` or a finish reason is treated as cut off.
    pub fn finish(mut self) -> Result<ChatResponse> {
        if !self.buffer.is_empty() {
            let rest = String::from_utf8_lossy(&std::mem::take(&mut self.buffer)).into_owned();
            self.push_line(&rest)?;
        }

        if !self.done && self.finish_reason.is_none() {
            return Err(Error::IncompleteStream);
        }

        let tool_calls: Vec<ToolCall> = self
            .tool_calls
            .into_values()
            .enumerate()
            .map(|(i, mut call)| {
                if call.id.is_empty() {
                    call.id = format!("call_{}", i);
                }
                if call.arguments.trim().is_empty() {
                    call.arguments = "{}".to_string();
                }
                call
            })
            .collect();

        let message = if tool_calls.is_empty() {
            ChatMessage::assistant(self.content)
        } else {
            ChatMessage::assistant_with_tools(self.content, tool_calls)
        };

        Ok(ChatResponse {
            message,
            usage: self.usage,
            finish_reason: self.finish_reason,
        })
    }
}
