//! Fragment indexing: chunk, embed, replace in the vector store.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use forge_chunker::{ChunkerConfig, ChunkerService};
use forge_embeddings::Embedder;
use forge_models::CodeFragment;
use forge_qdrant::{SearchFilter, VectorPoint, VectorStore, KEY_CONTENT, KEY_FILE_PATH, KEY_KIND, KEY_PROJECT_ID};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::services::project_summary;
use crate::services::tools::paths::normalize_relative;

/// Payload keys beyond the filterable ones in `forge_qdrant`.
pub(crate) const KEY_SECTION: &str = "section";
pub(crate) const KEY_FILE_TYPE: &str = "file_type";
pub(crate) const KEY_CHUNK_INDEX: &str = "chunk_index";
pub(crate) const KEY_CONTENT_HASH: &str = "content_hash";
pub(crate) const KEY_METADATA: &str = "metadata";

/// Keeps a project's fragments in step with its files.
///
/// Every file is replaced as a unit: its old fragments are deleted before
/// the new ones are inserted.
#[derive(Clone)]
pub struct IndexerService {
    inner: Arc<IndexerInner>,
}

struct IndexerInner {
    chunker: ChunkerService,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl IndexerService {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, max_chunk_size: usize) -> Self {
        Self {
            inner: Arc::new(IndexerInner {
                chunker: ChunkerService::with_config(ChunkerConfig { max_chunk_size }),
                embedder,
                store,
            }),
        }
    }

    pub fn supports(&self, file_path: &str) -> bool {
        self.inner.chunker.supports(file_path)
    }

    /// Re-index one file. Returns the number of fragments stored.
    pub async fn index(&self, project_id: &str, file_path: &str, content: &str) -> Result<usize> {
        let file_path = normalize_relative(file_path);
        if !self.supports(&file_path) {
            debug!(project_id, file = %file_path, "Skipping unsupported file");
            return Ok(0);
        }

        self.delete_file(project_id, &file_path).await?;

        let fragments = self.inner.chunker.chunk(project_id, &file_path, content);
        if fragments.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = fragments.iter().map(embedding_text).collect();
        let vectors = self.inner.embedder.embed(texts).await?;

        let points: Vec<VectorPoint> = fragments
            .iter()
            .zip(vectors)
            .map(|(fragment, vector)| VectorPoint::new(fragment.id.clone(), vector, fragment_payload(fragment)))
            .collect();
        let count = points.len();
        self.inner.store.upsert(points).await?;

        info!(project_id, file = %file_path, fragments = count, "Indexed file");
        Ok(count)
    }

    /// Remove every fragment of one file.
    pub async fn delete_file(&self, project_id: &str, file_path: &str) -> Result<()> {
        let file_path = normalize_relative(file_path);
        self.inner
            .store
            .delete_where(SearchFilter::new().with_project_id(project_id).with_file_path(&file_path))
            .await?;
        debug!(project_id, file = %file_path, "Deleted file fragments");
        Ok(())
    }

    /// Remove every fragment of a project.
    pub async fn delete_project(&self, project_id: &str) -> Result<()> {
        self.inner
            .store
            .delete_where(SearchFilter::new().with_project_id(project_id))
            .await?;
        info!(project_id, "Deleted project fragments");
        Ok(())
    }

    /// Index every supported file under `root`. Per-file failures are
    /// logged and skipped; returns the number of files indexed.
    pub async fn index_project(&self, project_id: &str, root: &Path) -> Result<usize> {
        let files = project_summary::walk_files(root).await;
        let mut indexed = 0;

        for path in files {
            let Some(relative) = project_summary::relative_path(root, &path) else {
                continue;
            };
            if !self.supports(&relative) {
                continue;
            }
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(file = %relative, error = %e, "Failed to read file for indexing");
                    continue;
                }
            };
            match self.index(project_id, &relative, &content).await {
                Ok(n) if n > 0 => indexed += 1,
                Ok(_) => {}
                Err(e) => warn!(project_id, file = %relative, error = %e, "Failed to index file"),
            }
        }

        info!(project_id, files = indexed, "Indexed project");
        Ok(indexed)
    }
}

/// Text sent to the embedder: the path gives the vector a location signal.
fn embedding_text(fragment: &CodeFragment) -> String {
    format!("{}\n{}", fragment.display_path(), fragment.content)
}

fn fragment_payload(fragment: &CodeFragment) -> HashMap<String, Value> {
    let mut payload: HashMap<String, Value> = HashMap::new();
    payload.insert(KEY_PROJECT_ID.to_string(), json!(fragment.project_id));
    payload.insert(KEY_FILE_PATH.to_string(), json!(fragment.file_path));
    payload.insert(KEY_KIND.to_string(), json!(fragment.kind.as_str()));
    payload.insert(KEY_CONTENT.to_string(), json!(fragment.content));
    payload.insert(KEY_FILE_TYPE.to_string(), json!(fragment.file_type.as_str()));
    payload.insert(KEY_CHUNK_INDEX.to_string(), json!(fragment.chunk_index));
    payload.insert(KEY_CONTENT_HASH.to_string(), json!(fragment.content_hash));
    if let Some(ref section) = fragment.section {
        payload.insert(KEY_SECTION.to_string(), json!(section));
    }
    if !fragment.metadata.is_empty() {
        payload.insert(KEY_METADATA.to_string(), json!(fragment.metadata));
    }
    payload
}
