//! Tool-augmented generation for one conversation turn.
//!
//! [`GenerationLoop`] drives the model and the tools and reports everything
//! it does as [`LoopEvent`]s on a single channel. Consumers (the caller
//! relay, the [`StreamCollector`], the indexing listener, persistence) each
//! react to that one stream independently.

mod collector;
mod loop_runner;
pub mod protocol;

pub use collector::StreamCollector;
pub use loop_runner::{limit_message, GenerationLoop, LoopOutcome};
pub use protocol::Relay;

use forge_llm::TokenUsage;

/// Everything observable about a running turn.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    /// Partial assistant text
    TextDelta(String),
    /// A tool call was requested; `arguments` may be incomplete
    ToolRequest {
        id: String,
        name: String,
        arguments: String,
    },
    /// A tool call finished with `result`
    ToolExecuted {
        id: String,
        name: String,
        arguments: String,
        result: String,
    },
    /// The turn ended normally (including at the tool limit)
    Completed { usage: TokenUsage },
    /// The turn ended in error
    Failed(String),
}

impl LoopEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopEvent::Completed { .. } | LoopEvent::Failed(_))
    }
}
