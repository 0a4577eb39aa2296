//! Picks an output shape for a prompt when the caller did not name one.

use forge_llm::{ChatMessage, ChatModel, ChatRequest};
use forge_models::CodeGenType;
use tracing::{debug, warn};

const ROUTING_PROMPT: &str = "You choose how a web app request should be generated. \
Answer with exactly one of: html, multi_file, vue_project.\n\
- html: a small single page, everything in one file\n\
- multi_file: a static site split into HTML, CSS and JavaScript files\n\
- vue_project: a multi-page or interactive application that needs a Vue project";

/// Ask the model for a [`CodeGenType`]; any failure or unclear answer is `Html`.
pub async fn route_codegen_type(model: &dyn ChatModel, prompt: &str) -> CodeGenType {
    let request = ChatRequest::new(vec![ChatMessage::system(ROUTING_PROMPT), ChatMessage::user(prompt)]);

    match model.chat(request).await {
        Ok(response) => {
            let answer = response.message.text_content().to_string();
            let routed = parse_answer(&answer).unwrap_or_default();
            debug!(answer = %answer.trim(), routed = %routed, "Routed code generation type");
            routed
        }
        Err(e) => {
            warn!(error = %e, "Routing request failed, using html");
            CodeGenType::Html
        }
    }
}

/// The first type named in a free-form answer.
fn parse_answer(answer: &str) -> Option<CodeGenType> {
    let normalized = answer.trim().to_lowercase().replace(['`', '"', '\''], "");
    if let Some(t) = CodeGenType::from_str(&normalized) {
        return Some(t);
    }
    // Longest names first so "multi_file" is not read as something shorter
    [CodeGenType::VueProject, CodeGenType::MultiFile, CodeGenType::Html]
        .into_iter()
        .find(|t| normalized.contains(t.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use forge_llm::{ChatResponse, ModelEvent, TokenUsage};
    use tokio::sync::mpsc;

    struct Answer(&'static str);

    #[async_trait]
    impl ChatModel for Answer {
        async fn stream_chat(&self, _request: ChatRequest, tx: mpsc::Sender<ModelEvent>) -> forge_llm::Result<()> {
            if self.0.is_empty() {
                return Err(forge_llm::Error::RateLimitExceeded);
            }
            let _ = tx
                .send(ModelEvent::Completed(ChatResponse {
                    message: ChatMessage::assistant(self.0),
                    usage: TokenUsage::default(),
                    finish_reason: Some("stop".into()),
                }))
                .await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_routes_answers() {
        assert_eq!(route_codegen_type(&Answer("vue_project"), "shop").await, CodeGenType::VueProject);
        assert_eq!(route_codegen_type(&Answer("`multi_file`."), "site").await, CodeGenType::MultiFile);
        assert_eq!(route_codegen_type(&Answer("no idea"), "x").await, CodeGenType::Html);
        assert_eq!(route_codegen_type(&Answer(""), "x").await, CodeGenType::Html);
    }
}
