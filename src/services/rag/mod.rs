//! Retrieval augmentation over generated projects.
//!
//! - [`IndexerService`]: chunk, embed and replace a file's fragments
//! - [`RetrieverService`]: project-scoped search with top-1 fallback
//! - [`PromptAugmenter`]: merge matches and the project summary into the prompt
//! - [`RagListener`]: re-index on file tool execution, off the loop's path

mod augmenter;
mod indexer;
mod listener;
mod retriever;

pub use augmenter::PromptAugmenter;
pub use indexer::IndexerService;
pub use listener::{action_for, IndexAction, RagListener};
pub use retriever::RetrieverService;
