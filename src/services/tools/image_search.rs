use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{str_arg_or, Tool, ToolContext};
use crate::config::ToolsConfig;
use crate::error::Result;

const PEXELS_SEARCH_URL: &str = "https://api.pexels.com/v1/search";

/// Pexels caps `per_page` well above this; keep tool output short.
const MAX_IMAGES: u64 = 15;

/// Image search over Pexels, falling back to placeholder URLs.
pub struct SearchImagesTool {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct PexelsResponse {
    #[serde(default)]
    photos: Vec<PexelsPhoto>,
}

#[derive(Debug, Deserialize)]
struct PexelsPhoto {
    src: std::collections::HashMap<String, String>,
}

impl SearchImagesTool {
    pub fn new(config: &ToolsConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: config.pexels_api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: config
                .pexels_base_url
                .clone()
                .unwrap_or_else(|| PEXELS_SEARCH_URL.to_string()),
        }
    }

    async fn search_pexels(&self, api_key: &str, query: &str, count: u64, purpose: &str) -> std::result::Result<Vec<String>, String> {
        let per_page = count.min(MAX_IMAGES).to_string();
        let response = self
            .client
            .get(&self.base_url)
            .header("Authorization", api_key)
            .query(&[
                ("query", query),
                ("per_page", per_page.as_str()),
                ("orientation", orientation(purpose)),
            ])
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }
        let body: PexelsResponse = response.json().await.map_err(|e| e.to_string())?;

        let key = size_key(purpose);
        Ok(body
            .photos
            .iter()
            .take(count as usize)
            .filter_map(|photo| photo.src.get(key).or_else(|| photo.src.get("medium")).cloned())
            .collect())
    }
}

#[async_trait]
impl Tool for SearchImagesTool {
    fn name(&self) -> &'static str {
        "searchImages"
    }

    fn display_name(&self) -> &'static str {
        "Search images"
    }

    fn description(&self) -> &'static str {
        "Search for high quality images by keyword and return image URLs"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search keywords, preferably English" },
                "count": { "type": "integer", "description": "Number of images, 1-5 recommended" },
                "purpose": { "type": "string", "enum": ["hero", "card", "avatar", "background"] }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: &Value, _ctx: &ToolContext) -> Result<String> {
        let query = str_arg_or(args, "query", "");
        let count = args.get("count").and_then(Value::as_u64).unwrap_or(3).clamp(1, MAX_IMAGES);
        let purpose = str_arg_or(args, "purpose", "card");

        let Some(api_key) = self.api_key.as_deref() else {
            warn!("Pexels API key not configured, using placeholder images");
            return Ok(placeholder_images(count, purpose));
        };

        match self.search_pexels(api_key, query, count, purpose).await {
            Ok(urls) if !urls.is_empty() => {
                info!(query, count = urls.len(), "Image search succeeded");
                Ok(format!("Found images:\n{}", urls.join("\n")))
            }
            Ok(_) => {
                info!(query, "No images found, using placeholders");
                Ok(placeholder_images(count, purpose))
            }
            Err(e) => {
                warn!(query, error = %e, "Image search failed, using placeholders");
                Ok(placeholder_images(count, purpose))
            }
        }
    }

    fn format_executed(&self, args: &Value) -> String {
        format!(
            "[Tool call] {} - query: {}, count: {}, purpose: {}",
            self.display_name(),
            str_arg_or(args, "query", ""),
            args.get("count").and_then(Value::as_u64).unwrap_or(1),
            str_arg_or(args, "purpose", "card")
        )
    }
}

fn orientation(purpose: &str) -> &'static str {
    match purpose.to_lowercase().as_str() {
        "avatar" => "square",
        "card" => "portrait",
        _ => "landscape",
    }
}

fn size_key(purpose: &str) -> &'static str {
    match purpose.to_lowercase().as_str() {
        "hero" | "background" => "large2x",
        "avatar" => "small",
        "card" => "medium",
        _ => "large",
    }
}

fn placeholder_size(purpose: &str) -> (u32, u32) {
    match purpose.to_lowercase().as_str() {
        "hero" | "background" => (1920, 1080),
        "avatar" => (200, 200),
        "card" => (400, 300),
        _ => (800, 600),
    }
}

fn placeholder_images(count: u64, purpose: &str) -> String {
    let (width, height) = placeholder_size(purpose);
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let urls: Vec<String> = (0..count)
        .map(|i| format!("https://picsum.photos/{}/{}?random={}", width, height, seed + i))
        .collect();
    format!("Placeholder images:\n{}", urls.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tool(base_url: Option<String>, key: Option<&str>) -> SearchImagesTool {
        SearchImagesTool::new(&ToolsConfig {
            pexels_api_key: key.map(String::from),
            pexels_base_url: base_url,
        })
    }

    #[tokio::test]
    async fn test_without_key_returns_placeholders() {
        let ctx = ToolContext::new(1, "/tmp");
        let result = tool(None, None)
            .execute(&json!({"query": "office", "count": 2, "purpose": "hero"}), &ctx)
            .await
            .unwrap();
        let lines: Vec<&str> = result.lines().collect();
        assert_eq!(lines[0], "Placeholder images:");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("https://picsum.photos/1920/1080?random="));
    }

    #[tokio::test]
    async fn test_pexels_search_uses_purpose_size() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("Authorization", "pexels-key"))
            .and(query_param("query", "team"))
            .and(query_param("orientation", "square"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "photos": [
                    {"src": {"small": "https://img/1-small.jpg", "medium": "https://img/1-medium.jpg"}},
                    {"src": {"medium": "https://img/2-medium.jpg"}}
                ]
            })))
            .mount(&server)
            .await;

        let ctx = ToolContext::new(1, "/tmp");
        let result = tool(Some(server.uri()), Some("pexels-key"))
            .execute(&json!({"query": "team", "count": 2, "purpose": "avatar"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result, "Found images:\nhttps://img/1-small.jpg\nhttps://img/2-medium.jpg");
    }

    #[tokio::test]
    async fn test_api_failure_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let ctx = ToolContext::new(1, "/tmp");
        let result = tool(Some(server.uri()), Some("k"))
            .execute(&json!({"query": "x", "count": 1}), &ctx)
            .await
            .unwrap();
        assert!(result.starts_with("Placeholder images:\nhttps://picsum.photos/400/300"));
    }
}
