//! Provider fallback and retry around the raw HTTP calls.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::hashing::hash_embed;
use crate::providers::call_provider_batch;
use crate::{Embedder, EmbeddingConfig, EmbeddingProviderConfig, Error, Result};

/// Maximum retries per provider before fallback
const MAX_RETRIES: u32 = 2;

/// Delay between retries (doubles each time)
const RETRY_DELAY_MS: u64 = 500;

/// Maximum texts per batch for API calls
const MAX_BATCH_SIZE: usize = 100;

/// Service for generating text embeddings with multi-provider fallback.
///
/// Tries providers in priority order, falling back on rate limits or
/// failures. Uses hash-based vectors when no providers are configured.
#[derive(Clone)]
pub struct EmbeddingService {
    inner: Arc<EmbeddingServiceInner>,
}

struct EmbeddingServiceInner {
    providers: Vec<EmbeddingProviderConfig>,
    dimension: usize,
    client: Client,
}

impl EmbeddingService {
    /// Create a new embedding service from configuration.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let mut providers: Vec<EmbeddingProviderConfig> = config
            .providers
            .iter()
            .filter(|p| p.has_credentials())
            .cloned()
            .collect();
        providers.sort_by_key(|p| p.priority);

        if providers.is_empty() {
            warn!(
                dimension = config.dimension,
                "No embedding providers configured - using hash-based embeddings"
            );
        } else {
            info!(
                providers = ?providers.iter().map(|p| &p.name).collect::<Vec<_>>(),
                dimension = config.dimension,
                "Embedding service initialized from config"
            );
        }

        Ok(Self {
            inner: Arc::new(EmbeddingServiceInner {
                providers,
                dimension: config.dimension,
                client,
            }),
        })
    }

    /// Hash-only service, for tests and offline runs.
    pub fn hashed(dimension: usize) -> Self {
        Self {
            inner: Arc::new(EmbeddingServiceInner {
                providers: Vec::new(),
                dimension,
                client: Client::new(),
            }),
        }
    }

    /// Get provider names in priority order.
    pub fn providers(&self) -> Vec<String> {
        self.inner.providers.iter().map(|p| p.name.clone()).collect()
    }

    /// Check if real embedding providers are available.
    pub fn has_providers(&self) -> bool {
        !self.inner.providers.is_empty()
    }

    async fn embed_with_providers(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut last_error = None;

        for provider in &self.inner.providers {
            match self.try_provider(provider, texts).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(e) => {
                    warn!(
                        provider = %provider.name,
                        error = %e,
                        "Embedding provider failed, trying next"
                    );
                    last_error = Some(e);
                }
            }
        }

        // Providers are configured but all failed: no silent hash fallback,
        // so indexing waits for a provider instead of mixing vector spaces.
        Err(last_error.unwrap_or(Error::AllProvidersFailed))
    }

    /// Try a provider with retries.
    async fn try_provider(
        &self,
        provider: &EmbeddingProviderConfig,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>> {
        let mut delay = Duration::from_millis(RETRY_DELAY_MS);

        for attempt in 0..MAX_RETRIES {
            match call_provider_batch(&self.inner.client, provider, texts, self.inner.dimension).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(e) => {
                    if is_retryable(&e) && attempt < MAX_RETRIES - 1 {
                        debug!(
                            provider = %provider.name,
                            attempt,
                            delay_ms = delay.as_millis(),
                            "Retrying after error"
                        );
                        sleep(delay).await;
                        delay *= 2;
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        Err(Error::Internal("Max retries exceeded".to_string()))
    }
}

#[async_trait]
impl Embedder for EmbeddingService {
    fn dimension(&self) -> usize {
        self.inner.dimension
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        if self.inner.providers.is_empty() {
            debug!(count = texts.len(), "Generating hash-based embeddings");
            return Ok(texts
                .iter()
                .map(|t| hash_embed(t, self.inner.dimension))
                .collect());
        }

        debug!(count = texts.len(), "Generating API embeddings");
        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH_SIZE) {
            all.extend(self.embed_with_providers(batch).await?);
        }
        Ok(all)
    }
}

/// Check if an error is retryable (rate limit, temporary failure).
fn is_retryable(error: &Error) -> bool {
    let msg = error.to_string().to_lowercase();
    msg.contains("rate")
        || msg.contains("limit")
        || msg.contains("429")
        || msg.contains("503")
        || msg.contains("timeout")
        || msg.contains("temporarily")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn openai_provider(base_url: &str, priority: u8) -> EmbeddingProviderConfig {
        EmbeddingProviderConfig {
            name: "openai".to_string(),
            base_url: base_url.to_string(),
            model: "text-embedding-v3".to_string(),
            api_key: "test-key".to_string(),
            priority,
        }
    }

    #[tokio::test]
    async fn test_no_providers_uses_hash_fallback() {
        let service = EmbeddingService::from_config(&EmbeddingConfig {
            providers: vec![],
            dimension: 384,
        })
        .unwrap();

        assert!(!service.has_providers());
        assert_eq!(service.dimension(), 384);

        let result = service
            .embed(vec!["hello".to_string(), "world".to_string()])
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].len(), 384);
        assert_eq!(result[0], hash_embed("hello", 384));
    }

    #[tokio::test]
    async fn test_embed_empty_returns_empty() {
        let service = EmbeddingService::hashed(8);
        assert!(service.embed(vec![]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_openai_results_reordered_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"embedding": [0.0, 1.0], "index": 1},
                    {"embedding": [1.0, 0.0], "index": 0}
                ]
            })))
            .mount(&server)
            .await;

        let service = EmbeddingService::from_config(&EmbeddingConfig {
            providers: vec![openai_provider(&server.uri(), 1)],
            dimension: 2,
        })
        .unwrap();

        let result = service
            .embed(vec!["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(result, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_falls_back_to_next_provider() {
        let broken = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "bad model"}
            })))
            .mount(&broken)
            .await;

        let healthy = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [0.5, 0.5], "index": 0}]
            })))
            .mount(&healthy)
            .await;

        let service = EmbeddingService::from_config(&EmbeddingConfig {
            providers: vec![openai_provider(&healthy.uri(), 2), openai_provider(&broken.uri(), 1)],
            dimension: 2,
        })
        .unwrap();

        let vector = service.embed_single("x").await.unwrap();
        assert_eq!(vector, vec![0.5, 0.5]);
    }

    #[tokio::test]
    async fn test_all_providers_failing_is_an_error() {
        let broken = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "bad key"}
            })))
            .mount(&broken)
            .await;

        let service = EmbeddingService::from_config(&EmbeddingConfig {
            providers: vec![openai_provider(&broken.uri(), 1)],
            dimension: 2,
        })
        .unwrap();

        assert!(matches!(
            service.embed_single("x").await,
            Err(Error::Provider(_))
        ));
    }
}
