//! Service layer for Forge.
//!
//! - Tools (model-invokable file and asset operations)
//! - Generation (bounded tool loop, stream collection, relay)
//! - RAG (indexing, retrieval, prompt augmentation)
//! - Orchestrator (turn entry point and persistence)
//! - Supporting pieces: guardrail, code parsers, project builder,
//!   type routing, chat memory, project summaries

mod builder;
pub mod chat_memory;
pub mod code_parser;
pub mod generation;
pub mod guardrail;
mod orchestrator;
pub mod project_summary;
pub mod prompts;
pub mod rag;
pub mod router;
pub mod tools;

pub use builder::ProjectBuilder;
pub use chat_memory::ChatMemoryService;
pub use orchestrator::{CodeGeneratorFacade, DeliveryEvent, FacadeDeps, TurnRequest, TurnStream};
pub use project_summary::ProjectSummaryService;
pub use rag::{IndexerService, PromptAugmenter, RagListener, RetrieverService};
pub use tools::{ToolContext, ToolRegistry};
