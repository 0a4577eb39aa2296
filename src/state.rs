//! Application state for Forge.
//!
//! Contains the shared state that is passed to all handlers.

use std::path::PathBuf;
use std::sync::Arc;

use forge_embeddings::{Embedder, EmbeddingService};
use forge_llm::{ChatModel, OpenAiChatModel, OpenAiConfig};
use forge_qdrant::{MemoryVectorStore, QdrantService, VectorStore};
use tracing::{info, warn};

use crate::config::Config;
use crate::db::DbPool;
use crate::services::{
    ChatMemoryService, CodeGeneratorFacade, FacadeDeps, IndexerService, ProjectBuilder, ProjectSummaryService,
    PromptAugmenter, RetrieverService, ToolRegistry,
};
use crate::{config, Result};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: DbPool,
    /// Turn entry point.
    pub facade: CodeGeneratorFacade,
    /// Fragment indexer, shared with the facade.
    pub indexer: IndexerService,
    /// Registered tools.
    pub tools: Arc<ToolRegistry>,
}

impl AppState {
    /// Create the application state from the process configuration.
    pub async fn new() -> Result<Self> {
        let config = config::config();

        // Initialize database
        let db = crate::db::init_pool(&config.database.path).await?;
        crate::db::initialize_schema(&db).await?;

        // External collaborators
        let mut llm = OpenAiConfig::new(&config.llm.base_url, &config.llm.model, &config.llm.api_key);
        llm.timeout_secs = config.llm.timeout_secs;
        llm.max_tokens = config.llm.max_tokens;
        llm.temperature = config.llm.temperature;
        let model: Arc<dyn ChatModel> = Arc::new(OpenAiChatModel::new(llm)?);

        let embedder: Arc<dyn Embedder> = Arc::new(EmbeddingService::from_config(&config.embedding)?);
        let store = Self::vector_store(config, embedder.dimension()).await;

        Ok(Self::from_parts(db, model, embedder, store, config))
    }

    /// Qdrant when enabled and reachable, otherwise the in-process store.
    async fn vector_store(config: &Config, dimension: usize) -> Arc<dyn VectorStore> {
        if !config.qdrant.enabled {
            info!("Qdrant disabled, using in-memory vector store");
            return Arc::new(MemoryVectorStore::new());
        }
        let qdrant = forge_qdrant::QdrantConfig::new(&config.qdrant.url, &config.qdrant.collection_prefix);
        match QdrantService::new(&qdrant, dimension).await {
            Ok(service) => Arc::new(service),
            Err(e) => {
                warn!(url = %config.qdrant.url, error = %e, "Qdrant unavailable, using in-memory vector store");
                Arc::new(MemoryVectorStore::new())
            }
        }
    }

    /// Wire services over explicit collaborators.
    pub fn from_parts(
        db: DbPool,
        model: Arc<dyn ChatModel>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        config: &Config,
    ) -> Self {
        let output_root = PathBuf::from(&config.storage.code_output_root);

        let tools = Arc::new(ToolRegistry::with_defaults(&config.tools));
        let indexer = IndexerService::new(embedder.clone(), store.clone(), config.rag.max_chunk_size);
        let retriever = RetrieverService::new(embedder, store, config.rag.guarantee_top_one);
        let augmenter = PromptAugmenter::new(
            retriever,
            ProjectSummaryService::new(output_root.clone()),
            config.rag.clone(),
        );

        let facade = CodeGeneratorFacade::new(FacadeDeps {
            db: db.clone(),
            model,
            tools: tools.clone(),
            augmenter,
            indexer: indexer.clone(),
            memory: ChatMemoryService::new(db.clone(), config.chat_memory.max_messages),
            builder: ProjectBuilder::new(config.build.clone()),
            generation: config.generation.clone(),
            output_root,
        });

        Self {
            db,
            facade,
            indexer,
            tools,
        }
    }
}
