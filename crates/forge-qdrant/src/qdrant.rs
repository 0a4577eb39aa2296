//! Qdrant-backed vector store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    condition::ConditionOneOf, point_id::PointIdOptions, r#match::MatchValue, Condition,
    CreateCollectionBuilder, DeletePointsBuilder, Distance, FieldCondition, Filter, Match,
    PointId, PointStruct, RetrievedPoint, ScoredPoint, ScrollPointsBuilder, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde_json::Value;
use tracing::{debug, info};

use crate::{Error, Result, SearchFilter, VectorPoint, VectorSearchResult, VectorStore};

/// Page size when scrolling for deletes.
const SCROLL_PAGE: u32 = 1000;

/// Configuration for the Qdrant service.
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub collection_prefix: String,
}

impl QdrantConfig {
    /// Create a new Qdrant configuration.
    pub fn new(url: impl Into<String>, collection_prefix: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            collection_prefix: collection_prefix.into(),
        }
    }

    /// `{prefix}code_fragments`
    pub fn collection_name(&self) -> String {
        format!("{}code_fragments", self.collection_prefix)
    }
}

/// Vector storage in a single Qdrant collection shared by all projects.
/// Projects are separated by the `project_id` payload field.
#[derive(Clone)]
pub struct QdrantService {
    inner: Arc<QdrantServiceInner>,
}

struct QdrantServiceInner {
    client: Qdrant,
    collection: String,
}

impl QdrantService {
    /// Connect and make sure the fragment collection exists with `dimension`.
    pub async fn new(config: &QdrantConfig, dimension: usize) -> Result<Self> {
        let client = Qdrant::from_url(&config.url)
            .build()
            .map_err(|e| Error::VectorStore(format!("Failed to connect to Qdrant: {}", e)))?;

        // Test connection
        client
            .list_collections()
            .await
            .map_err(|e| Error::VectorStore(format!("Qdrant connection test failed: {}", e)))?;

        let service = Self {
            inner: Arc::new(QdrantServiceInner {
                client,
                collection: config.collection_name(),
            }),
        };
        service.ensure_collection(dimension).await?;

        info!(url = %config.url, collection = %service.inner.collection, "Qdrant service connected");
        Ok(service)
    }

    pub fn collection_name(&self) -> &str {
        &self.inner.collection
    }

    /// Create the collection if missing. An existing collection with a
    /// different dimension is dropped and recreated.
    async fn ensure_collection(&self, dimension: usize) -> Result<()> {
        let collection_name = &self.inner.collection;

        let exists = self
            .inner
            .client
            .collection_exists(collection_name)
            .await
            .map_err(|e| Error::VectorStore(format!("Failed to check collection: {}", e)))?;

        if exists {
            let existing_dim = self.collection_dimension().await?;
            if existing_dim == dimension {
                debug!(collection = %collection_name, dimension, "Collection already exists with correct dimension");
                return Ok(());
            }

            info!(
                collection = %collection_name,
                existing_dim,
                new_dim = dimension,
                "Collection dimension mismatch - recreating"
            );

            self.inner
                .client
                .delete_collection(collection_name)
                .await
                .map_err(|e| Error::VectorStore(format!("Failed to delete mismatched collection: {}", e)))?;
        }

        self.inner
            .client
            .create_collection(
                CreateCollectionBuilder::new(collection_name)
                    .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine)),
            )
            .await
            .map_err(|e| Error::VectorStore(format!("Failed to create collection: {}", e)))?;

        info!(collection = %collection_name, dimension, "Created Qdrant collection");
        Ok(())
    }

    async fn collection_dimension(&self) -> Result<usize> {
        let info = self
            .inner
            .client
            .collection_info(&self.inner.collection)
            .await
            .map_err(|e| Error::VectorStore(format!("Failed to get collection info: {}", e)))?;

        Ok(info
            .result
            .as_ref()
            .and_then(|r| r.config.as_ref())
            .and_then(|c| c.params.as_ref())
            .and_then(|p| p.vectors_config.as_ref())
            .and_then(|vc| match vc.config.as_ref() {
                Some(qdrant_client::qdrant::vectors_config::Config::Params(params)) => {
                    Some(params.size as usize)
                }
                _ => None,
            })
            .unwrap_or(0))
    }

    /// Delete multiple points by ID.
    async fn delete_batch(&self, ids: Vec<String>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let point_ids: Vec<PointId> = ids.into_iter().map(PointId::from).collect();

        self.inner
            .client
            .delete_points(DeletePointsBuilder::new(&self.inner.collection).points(point_ids))
            .await
            .map_err(|e| Error::VectorStore(format!("Failed to delete points: {}", e)))?;

        Ok(())
    }

    /// One page of point ids matching the filter.
    async fn scroll_ids(
        &self,
        offset: Option<PointId>,
        filter: &SearchFilter,
    ) -> Result<(Vec<String>, Option<PointId>)> {
        let mut builder = ScrollPointsBuilder::new(&self.inner.collection)
            .limit(SCROLL_PAGE)
            .with_payload(false)
            .filter(to_qdrant_filter(filter));

        if let Some(off) = offset {
            builder = builder.offset(off);
        }

        let response = self
            .inner
            .client
            .scroll(builder)
            .await
            .map_err(|e| Error::VectorStore(format!("Scroll failed: {}", e)))?;

        let ids = response
            .result
            .into_iter()
            .map(|point: RetrievedPoint| point_id_to_string(point.id))
            .filter(|id| !id.is_empty())
            .collect();

        Ok((ids, response.next_page_offset))
    }
}

#[async_trait]
impl VectorStore for QdrantService {
    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let qdrant_points: Vec<PointStruct> = points
            .into_iter()
            .map(|point| {
                let qdrant_payload: HashMap<String, QdrantValue> = point
                    .payload
                    .into_iter()
                    .filter_map(|(k, v)| json_to_qdrant_value(v).map(|qv| (k, qv)))
                    .collect();

                PointStruct::new(point.id, point.vector, qdrant_payload)
            })
            .collect();

        let count = qdrant_points.len();

        self.inner
            .client
            .upsert_points(UpsertPointsBuilder::new(&self.inner.collection, qdrant_points).wait(true))
            .await
            .map_err(|e| Error::VectorStore(format!("Failed to upsert points: {}", e)))?;

        debug!(collection = %self.inner.collection, count, "Upserted points");
        Ok(())
    }

    async fn search(
        &self,
        vector: Vec<f32>,
        limit: usize,
        min_score: Option<f32>,
        filter: SearchFilter,
    ) -> Result<Vec<VectorSearchResult>> {
        let mut builder = SearchPointsBuilder::new(&self.inner.collection, vector, limit as u64)
            .with_payload(true)
            .filter(to_qdrant_filter(&filter));

        if let Some(min) = min_score {
            builder = builder.score_threshold(min);
        }

        let response = self
            .inner
            .client
            .search_points(builder)
            .await
            .map_err(|e| Error::VectorStore(format!("Search failed: {}", e)))?;

        Ok(response
            .result
            .into_iter()
            .map(scored_point_to_result)
            .collect())
    }

    /// Scroll + delete by id, page by page, until nothing matches.
    async fn delete_where(&self, filter: SearchFilter) -> Result<()> {
        let mut offset = None;
        let mut deleted = 0usize;
        loop {
            let (ids, next) = self.scroll_ids(offset, &filter).await?;
            deleted += ids.len();
            self.delete_batch(ids).await?;
            match next {
                Some(next) => offset = Some(next),
                None => break,
            }
        }
        debug!(collection = %self.inner.collection, deleted, "Deleted points by filter");
        Ok(())
    }
}

fn to_qdrant_filter(filter: &SearchFilter) -> Filter {
    Filter {
        must: filter
            .conditions()
            .into_iter()
            .map(|(key, value)| make_match_condition(key, value))
            .collect(),
        ..Default::default()
    }
}

/// Create a match condition for a field
fn make_match_condition(key: &str, value: &str) -> Condition {
    Condition {
        condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
            key: key.to_string(),
            r#match: Some(Match {
                match_value: Some(MatchValue::Keyword(value.to_string())),
            }),
            ..Default::default()
        })),
    }
}

fn point_id_to_string(id: Option<PointId>) -> String {
    match id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => String::new(),
    }
}

/// Convert JSON value to Qdrant value
fn json_to_qdrant_value(value: Value) -> Option<QdrantValue> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(QdrantValue::from(b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(QdrantValue::from(i))
            } else {
                n.as_f64().map(QdrantValue::from)
            }
        }
        Value::String(s) => Some(QdrantValue::from(s)),
        Value::Array(arr) => {
            let values: Vec<QdrantValue> =
                arr.into_iter().filter_map(json_to_qdrant_value).collect();
            if values.is_empty() {
                None
            } else {
                Some(QdrantValue::from(values))
            }
        }
        // Nested objects are stored as JSON strings
        Value::Object(_) => Some(QdrantValue::from(value.to_string())),
    }
}

/// Convert Qdrant value to JSON value
fn qdrant_value_to_json(value: QdrantValue) -> Option<Value> {
    use qdrant_client::qdrant::value::Kind;

    match value.kind {
        Some(Kind::NullValue(_)) => Some(Value::Null),
        Some(Kind::BoolValue(b)) => Some(Value::Bool(b)),
        Some(Kind::IntegerValue(i)) => Some(Value::Number(i.into())),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d).map(Value::Number),
        Some(Kind::StringValue(s)) => Some(Value::String(s)),
        Some(Kind::ListValue(list)) => Some(Value::Array(
            list.values
                .into_iter()
                .filter_map(qdrant_value_to_json)
                .collect(),
        )),
        Some(Kind::StructValue(obj)) => Some(Value::Object(
            obj.fields
                .into_iter()
                .filter_map(|(k, v)| qdrant_value_to_json(v).map(|jv| (k, jv)))
                .collect(),
        )),
        None => None,
    }
}

/// Convert scored point to search result
fn scored_point_to_result(point: ScoredPoint) -> VectorSearchResult {
    let payload = point
        .payload
        .into_iter()
        .filter_map(|(k, v)| qdrant_value_to_json(v).map(|jv| (k, jv)))
        .collect();

    VectorSearchResult {
        id: point_id_to_string(point.id),
        score: point.score,
        payload,
    }
}
