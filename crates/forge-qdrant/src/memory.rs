//! In-process vector store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{cosine_similarity, Error, Result, SearchFilter, VectorPoint, VectorSearchResult, VectorStore};

/// Brute-force cosine search over points held in memory.
#[derive(Clone, Default)]
pub struct MemoryVectorStore {
    points: Arc<RwLock<HashMap<String, VectorPoint>>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored points, optionally narrowed by a filter.
    pub async fn count(&self, filter: &SearchFilter) -> usize {
        self.points
            .read()
            .await
            .values()
            .filter(|p| filter.matches(&p.payload))
            .count()
    }

    /// Snapshot of matching points.
    pub async fn points(&self, filter: &SearchFilter) -> Vec<VectorPoint> {
        self.points
            .read()
            .await
            .values()
            .filter(|p| filter.matches(&p.payload))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<()> {
        let mut guard = self.points.write().await;
        let count = points.len();
        for point in points {
            if let Some(existing) = guard.values().next() {
                if existing.vector.len() != point.vector.len() {
                    return Err(Error::DimensionMismatch {
                        expected: existing.vector.len(),
                        actual: point.vector.len(),
                    });
                }
            }
            guard.insert(point.id.clone(), point);
        }
        debug!(count, total = guard.len(), "Upserted points in memory");
        Ok(())
    }

    async fn search(
        &self,
        vector: Vec<f32>,
        limit: usize,
        min_score: Option<f32>,
        filter: SearchFilter,
    ) -> Result<Vec<VectorSearchResult>> {
        let guard = self.points.read().await;
        let mut results: Vec<VectorSearchResult> = guard
            .values()
            .filter(|p| filter.matches(&p.payload))
            .map(|p| VectorSearchResult {
                id: p.id.clone(),
                score: cosine_similarity(&vector, &p.vector),
                payload: p.payload.clone(),
            })
            .filter(|r| min_score.map_or(true, |min| r.score >= min))
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(limit);
        Ok(results)
    }

    async fn delete_where(&self, filter: SearchFilter) -> Result<()> {
        let mut guard = self.points.write().await;
        let before = guard.len();
        guard.retain(|_, p| !filter.matches(&p.payload));
        debug!(deleted = before - guard.len(), "Deleted points in memory");
        Ok(())
    }
}
