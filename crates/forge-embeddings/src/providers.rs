//! HTTP calls to embedding providers.

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{EmbeddingProviderConfig, Error, Result};

// ============================================================================
// Default values
// ============================================================================

/// Get default endpoint for a provider.
pub fn default_endpoint(name: &str) -> String {
    match name {
        "gemini" => "https://generativelanguage.googleapis.com/v1beta".to_string(),
        "ollama" => "http://localhost:11434".to_string(),
        _ => "https://api.openai.com/v1".to_string(),
    }
}

/// Get default model for a provider.
pub fn default_model(name: &str) -> String {
    match name {
        "gemini" => "text-embedding-004".to_string(),
        "ollama" => "nomic-embed-text".to_string(),
        _ => "text-embedding-3-small".to_string(),
    }
}

/// Get default dimension for a model.
pub fn default_dimension(model: &str) -> usize {
    if model.contains("text-embedding-004") || model.contains("nomic-embed-text") {
        768
    } else if model.contains("text-embedding-3-small") || model.contains("text-embedding-ada-002") {
        1536
    } else if model.contains("text-embedding-3-large") {
        3072
    } else if model.contains("text-embedding-v") {
        // DashScope text-embedding-v1..v4
        1024
    } else if model.contains("mxbai-embed-large") || model.contains("bge-large") {
        1024
    } else {
        384
    }
}

// ============================================================================
// API response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct GeminiBatchResponse {
    embeddings: Option<Vec<GeminiEmbedding>>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
    code: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbedResponse {
    data: Option<Vec<OpenAIEmbedding>>,
    error: Option<OpenAIError>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbedding {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}

// ============================================================================
// Calls
// ============================================================================

/// Embed a batch with one provider, in input order.
pub(crate) async fn call_provider_batch(
    client: &Client,
    provider: &EmbeddingProviderConfig,
    texts: &[String],
    dimension: usize,
) -> Result<Vec<Vec<f32>>> {
    let embeddings = match provider.name.as_str() {
        "gemini" => call_gemini_batch(client, provider, texts).await?,
        "ollama" => call_ollama_batch(client, provider, texts).await?,
        // OpenAI and OpenAI-compatible endpoints (DashScope, vLLM, ...)
        _ => call_openai_batch(client, provider, texts, dimension).await?,
    };

    if embeddings.len() != texts.len() {
        return Err(Error::Provider(format!(
            "{} returned {} embeddings for {} inputs",
            provider.name,
            embeddings.len(),
            texts.len()
        )));
    }
    Ok(embeddings)
}

async fn call_gemini_batch(
    client: &Client,
    provider: &EmbeddingProviderConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let url = format!(
        "{}/models/{}:batchEmbedContents?key={}",
        provider.base_url, provider.model, provider.api_key
    );

    let requests: Vec<_> = texts
        .iter()
        .map(|text| {
            json!({
                "model": format!("models/{}", provider.model),
                "content": { "parts": [{"text": text}] }
            })
        })
        .collect();

    let response = client
        .post(&url)
        .json(&json!({ "requests": requests }))
        .send()
        .await
        .map_err(|e| Error::Internal(format!("Gemini batch request failed: {}", e)))?;

    let status = response.status();
    let resp: GeminiBatchResponse = response
        .json()
        .await
        .map_err(|e| Error::Internal(format!("Failed to parse Gemini batch response: {}", e)))?;

    if let Some(error) = resp.error {
        return Err(Error::Provider(format!(
            "Gemini batch error ({}): {}",
            error.code.unwrap_or(status.as_u16() as i32),
            error.message
        )));
    }

    resp.embeddings
        .map(|embs| embs.into_iter().map(|e| e.values).collect())
        .ok_or_else(|| Error::Internal("No embeddings in Gemini batch response".to_string()))
}

async fn call_openai_batch(
    client: &Client,
    provider: &EmbeddingProviderConfig,
    texts: &[String],
    dimension: usize,
) -> Result<Vec<Vec<f32>>> {
    let url = format!("{}/embeddings", provider.base_url.trim_end_matches('/'));

    let mut body = json!({
        "model": provider.model,
        "input": texts,
    });
    // Only the text-embedding-3 family accepts a custom dimension
    if provider.model.starts_with("text-embedding-3") {
        body["dimensions"] = json!(dimension);
    }

    let response = client
        .post(&url)
        .bearer_auth(&provider.api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| Error::Internal(format!("OpenAI batch request failed: {}", e)))?;

    let status = response.status();
    let resp: OpenAIEmbedResponse = response
        .json()
        .await
        .map_err(|e| Error::Internal(format!("Failed to parse OpenAI batch response ({}): {}", status, e)))?;

    if let Some(error) = resp.error {
        return Err(Error::Provider(format!(
            "OpenAI batch error ({}): {}",
            status.as_u16(),
            error.message
        )));
    }

    let mut data = resp
        .data
        .ok_or_else(|| Error::Internal("No embeddings in OpenAI batch response".to_string()))?;

    // Sort by index to ensure correct order
    data.sort_by_key(|e| e.index);

    Ok(data.into_iter().map(|e| e.embedding).collect())
}

async fn call_ollama_batch(
    client: &Client,
    provider: &EmbeddingProviderConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let url = format!("{}/api/embed", provider.base_url.trim_end_matches('/'));

    let response = client
        .post(&url)
        .json(&json!({ "model": provider.model, "input": texts }))
        .send()
        .await
        .map_err(|e| Error::Internal(format!("Ollama batch request failed: {}", e)))?;

    // Parse flexibly: older servers answer with a single `embedding`
    let resp: Value = response
        .json()
        .await
        .map_err(|e| Error::Internal(format!("Failed to parse Ollama response: {}", e)))?;

    if let Some(error) = resp.get("error").and_then(|e| e.as_str()) {
        return Err(Error::Provider(format!("Ollama error: {}", error)));
    }

    if let Some(embeddings) = resp.get("embeddings") {
        return serde_json::from_value::<Vec<Vec<f32>>>(embeddings.clone())
            .map_err(|e| Error::Internal(format!("Failed to parse embeddings: {}", e)));
    }

    if let Some(embedding) = resp.get("embedding") {
        if let Ok(emb) = serde_json::from_value::<Vec<f32>>(embedding.clone()) {
            return Ok(vec![emb]);
        }
    }

    Err(Error::Internal("No embeddings in Ollama response".to_string()))
}
