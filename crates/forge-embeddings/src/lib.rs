//! Embedding service with multi-provider fallback.
//!
//! Supports Gemini, OpenAI-compatible and Ollama embedding APIs, trying
//! providers in priority order. With no providers configured it falls back
//! to deterministic feature-hashed token vectors, which keep lexical
//! similarity meaningful for development and tests.
//!
//! # Example
//!
//! ```no_run
//! use forge_embeddings::{Embedder, EmbeddingConfig, EmbeddingProviderConfig, EmbeddingService};
//!
//! # async fn example() -> Result<(), forge_embeddings::Error> {
//! let config = EmbeddingConfig {
//!     providers: vec![EmbeddingProviderConfig::new("openai", "sk-...", 1)],
//!     dimension: 768,
//! };
//!
//! let service = EmbeddingService::from_config(&config)?;
//! let vector = service.embed_single("export default { name: 'Footer' }").await?;
//! # Ok(())
//! # }
//! ```

mod hashing;
mod providers;
mod service;

pub use hashing::{hash_embed, tokenize};
pub use providers::{default_dimension, default_endpoint, default_model};
pub use service::EmbeddingService;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// Error types
// ============================================================================

/// Errors that can occur in the embedding service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Internal error (HTTP client, parsing, etc.)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Provider API error
    #[error("Provider error: {0}")]
    Provider(String),

    /// No credentials configured
    #[error("No credentials configured")]
    NoCredentials,

    /// All providers failed
    #[error("All embedding providers failed")]
    AllProvidersFailed,
}

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// Embedder seam
// ============================================================================

/// Turns text into fixed-dimension vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder returns.
    fn dimension(&self) -> usize;

    /// Embed many texts, preserving order.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Embed one text.
    async fn embed_single(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(vec![text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| Error::Internal("Embedder returned no vector".to_string()))
    }
}

// ============================================================================
// Configuration types
// ============================================================================

/// Configuration for the embedding service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// List of embedding providers; sorted by priority on load.
    pub providers: Vec<EmbeddingProviderConfig>,
    /// Embedding dimension.
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            dimension: 768,
        }
    }
}

/// Configuration for a single embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingProviderConfig {
    /// Provider name ("gemini", "openai", "ollama").
    pub name: String,
    /// Base URL for the API.
    pub base_url: String,
    /// Model name to use.
    pub model: String,
    /// API key for authentication; empty for keyless providers like Ollama.
    pub api_key: String,
    /// Priority (lower = higher priority).
    pub priority: u8,
}

impl EmbeddingProviderConfig {
    /// Provider with default endpoint and model for its name.
    pub fn new(name: &str, api_key: impl Into<String>, priority: u8) -> Self {
        Self {
            name: name.to_string(),
            base_url: default_endpoint(name),
            model: default_model(name),
            api_key: api_key.into(),
            priority,
        }
    }

    /// Whether the provider can be called.
    pub fn has_credentials(&self) -> bool {
        self.name == "ollama" || !self.api_key.is_empty()
    }
}
