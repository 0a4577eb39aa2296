//! Vector store boundary for code fragment embeddings.
//!
//! [`VectorStore`] is the seam the indexer and retriever talk to.
//! [`QdrantService`] backs it with a Qdrant collection; [`MemoryVectorStore`]
//! keeps points in process for tests and for running without Qdrant.

mod memory;
mod qdrant;

pub use memory::MemoryVectorStore;
pub use qdrant::{QdrantConfig, QdrantService};

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

/// Error types for the vector store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Result type for the vector store.
pub type Result<T> = std::result::Result<T, Error>;

/// Point payload key names
pub const KEY_PROJECT_ID: &str = "project_id";
pub const KEY_FILE_PATH: &str = "file_path";
pub const KEY_KIND: &str = "kind";
pub const KEY_CONTENT: &str = "content";

/// One embedded point to store.
#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, Value>,
}

impl VectorPoint {
    pub fn new(id: impl Into<String>, vector: Vec<f32>, payload: HashMap<String, Value>) -> Self {
        Self {
            id: id.into(),
            vector,
            payload,
        }
    }
}

/// Search result from the vector store
#[derive(Debug, Clone)]
pub struct VectorSearchResult {
    pub id: String,
    pub score: f32,
    pub payload: HashMap<String, Value>,
}

/// Equality filter over payload keys. Empty filters match everything.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub project_id: Option<String>,
    pub file_path: Option<String>,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project_id(mut self, project_id: &str) -> Self {
        self.project_id = Some(project_id.to_string());
        self
    }

    pub fn with_file_path(mut self, path: &str) -> Self {
        self.file_path = Some(path.to_string());
        self
    }

    /// Field/value pairs that must all match.
    pub fn conditions(&self) -> Vec<(&'static str, &str)> {
        let mut conditions = Vec::new();
        if let Some(ref pid) = self.project_id {
            conditions.push((KEY_PROJECT_ID, pid.as_str()));
        }
        if let Some(ref p) = self.file_path {
            conditions.push((KEY_FILE_PATH, p.as_str()));
        }
        conditions
    }

    /// Evaluate the filter against a payload in process.
    pub fn matches(&self, payload: &HashMap<String, Value>) -> bool {
        self.conditions()
            .into_iter()
            .all(|(key, expected)| payload.get(key).and_then(Value::as_str) == Some(expected))
    }
}

/// Nearest-neighbour storage for embedded fragments.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace points by id.
    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<()>;

    /// Top `limit` points by cosine similarity, best first, optionally
    /// dropping anything scored below `min_score`.
    async fn search(
        &self,
        vector: Vec<f32>,
        limit: usize,
        min_score: Option<f32>,
        filter: SearchFilter,
    ) -> Result<Vec<VectorSearchResult>>;

    /// Remove every point matching the filter.
    async fn delete_where(&self, filter: SearchFilter) -> Result<()>;
}

/// Cosine similarity; zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
