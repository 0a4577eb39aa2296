//! Project-scoped similarity search with a top-1 fallback.

use std::sync::Arc;

use forge_embeddings::Embedder;
use forge_models::{FragmentKind, RetrievalMatch};
use forge_qdrant::{SearchFilter, VectorSearchResult, VectorStore, KEY_CONTENT, KEY_FILE_PATH, KEY_KIND};
use serde_json::Value;
use tracing::debug;

use super::indexer::{KEY_METADATA, KEY_SECTION};
use crate::error::Result;

#[derive(Clone)]
pub struct RetrieverService {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    /// Re-query for the single nearest fragment when nothing clears the threshold
    guarantee_top_one: bool,
}

impl RetrieverService {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, guarantee_top_one: bool) -> Self {
        Self {
            embedder,
            store,
            guarantee_top_one,
        }
    }

    /// Best matches for `query` within one project, highest score first.
    pub async fn search(
        &self,
        project_id: &str,
        query: &str,
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<RetrievalMatch>> {
        if query.trim().is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed_single(query).await?;
        let filter = SearchFilter::new().with_project_id(project_id);

        let mut results = self
            .store
            .search(vector.clone(), top_k, Some(min_score), filter.clone())
            .await?;

        if results.is_empty() && self.guarantee_top_one {
            results = self.store.search(vector, 1, None, filter).await?;
            debug!(project_id, found = results.len(), "No match above threshold, fell back to nearest");
        }

        let matches: Vec<RetrievalMatch> = results.into_iter().filter_map(to_match).collect();
        debug!(project_id, top_k, min_score, matches = matches.len(), "Retrieval complete");
        Ok(matches)
    }
}

fn to_match(result: VectorSearchResult) -> Option<RetrievalMatch> {
    let payload = result.payload;
    let text = |key: &str| payload.get(key).and_then(Value::as_str).map(str::to_string);

    let file_path = text(KEY_FILE_PATH)?;
    let content = text(KEY_CONTENT).unwrap_or_default();
    let kind = text(KEY_KIND)
        .and_then(|k| FragmentKind::from_str(&k))
        .unwrap_or(FragmentKind::Module);
    let section = text(KEY_SECTION);
    let metadata = match payload.get(KEY_METADATA) {
        Some(Value::Object(map)) => map.clone().into_iter().collect(),
        _ => Default::default(),
    };

    Some(RetrievalMatch {
        file_path,
        section,
        content,
        kind,
        score: result.score.clamp(0.0, 1.0),
        metadata,
    })
}
