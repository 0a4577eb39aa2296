//! Builds the prompt sent to the model from retrieval results and the
//! project summary.

use forge_models::{CodeGenType, RetrievalMatch};
use tracing::{debug, info, warn};

use super::RetrieverService;
use crate::config::RagConfig;
use crate::services::project_summary::ProjectSummaryService;

/// Characters of one fragment shown before truncation
const MAX_FRAGMENT_DISPLAY: usize = 2000;

/// Injected characters after which remaining fragments are omitted
const MAX_CONTEXT_TOTAL: usize = 8000;

const COMPLETE_MARKER: &str = "(complete, safe to edit directly)";
const PARTIAL_MARKER: &str = "(partial, read the full file before editing)";

#[derive(Clone)]
pub struct PromptAugmenter {
    retriever: RetrieverService,
    summaries: ProjectSummaryService,
    config: RagConfig,
}

impl PromptAugmenter {
    pub fn new(retriever: RetrieverService, summaries: ProjectSummaryService, config: RagConfig) -> Self {
        Self {
            retriever,
            summaries,
            config,
        }
    }

    /// The message to send for this turn.
    ///
    /// Non-tool pipelines pass the message through. With retrieval disabled
    /// the project summary alone is prefixed. Retrieval errors degrade to
    /// "no context".
    pub async fn augment(&self, message: &str, app_id: i64, codegen_type: CodeGenType) -> String {
        if !codegen_type.uses_tools() || !self.config.enabled {
            return self.summaries.enhance(message, app_id, codegen_type).await;
        }

        let summary = self.summaries.summary(app_id, codegen_type).await;
        let matches = match self
            .retriever
            .search(&app_id.to_string(), message, self.config.top_k, self.config.min_score)
            .await
        {
            Ok(matches) => matches,
            Err(e) => {
                warn!(app_id, error = %e, "Retrieval failed, continuing without context");
                Vec::new()
            }
        };

        if summary.trim().is_empty() && matches.is_empty() {
            debug!(app_id, "No project state or context, message unchanged");
            return message.to_string();
        }

        let prompt = render(&summary, &matches, message);
        info!(
            app_id,
            fragments = matches.len(),
            prompt_len = prompt.len(),
            "Prompt augmented"
        );
        prompt
    }
}

fn render(summary: &str, matches: &[RetrievalMatch], message: &str) -> String {
    let mut out = String::new();

    if !summary.trim().is_empty() {
        out.push_str(summary);
        out.push('\n');
    }

    if !matches.is_empty() {
        out.push_str("=== Relevant code context ===\n");
        out.push_str("Code fragments related to this request; edit them directly where marked safe:\n\n");

        let mut total = 0;
        for m in matches {
            if total >= MAX_CONTEXT_TOTAL {
                out.push_str("...(more relevant code omitted)\n\n");
                break;
            }
            let block = render_fragment(m);
            total += block.chars().count();
            out.push_str(&block);
        }
    }

    out.push_str("=== User request ===\n");
    out.push_str(message);
    out
}

fn render_fragment(m: &RetrievalMatch) -> String {
    let truncated = m.content.chars().count() > MAX_FRAGMENT_DISPLAY;
    let mut content: String = if truncated {
        let head: String = m.content.chars().take(MAX_FRAGMENT_DISPLAY).collect();
        format!("{}\n// ... content truncated ...", head)
    } else {
        m.content.clone()
    };
    if !content.ends_with('\n') {
        content.push('\n');
    }

    let marker = if truncated || m.is_partial() {
        PARTIAL_MARKER
    } else {
        COMPLETE_MARKER
    };

    format!(
        "[{}] relevance: {:.2}\n{}\n```{}\n{}```\n\n",
        m.file_path,
        m.score,
        marker,
        language_tag(&m.file_path),
        content
    )
}

fn language_tag(file_path: &str) -> &'static str {
    let lower = file_path.to_lowercase();
    if lower.ends_with(".vue") {
        "vue"
    } else if lower.ends_with(".js") {
        "javascript"
    } else if lower.ends_with(".ts") {
        "typescript"
    } else if lower.ends_with(".css") {
        "css"
    } else if lower.ends_with(".json") {
        "json"
    } else if lower.ends_with(".html") {
        "html"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_models::FragmentKind;
    use std::collections::HashMap;

    fn fragment(path: &str, section: Option<&str>, content: &str, score: f32) -> RetrievalMatch {
        RetrievalMatch {
            file_path: path.into(),
            section: section.map(str::to_string),
            content: content.into(),
            kind: FragmentKind::Style,
            score,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_layout_and_markers() {
        let matches = vec![
            fragment("src/Footer.vue", Some("style"), "<style>\n.footer {}\n</style>", 0.42),
            fragment("src/big.js", Some("part2"), "const x = 1;", 0.3),
        ];
        let prompt = render("", &matches, "make the footer blue");

        assert!(prompt.starts_with("=== Relevant code context ===\n"));
        assert!(prompt.contains(
            "[src/Footer.vue] relevance: 0.42\n(complete, safe to edit directly)\n```vue\n<style>\n.footer {}\n</style>\n```\n\n"
        ));
        assert!(prompt.contains("[src/big.js] relevance: 0.30\n(partial, read the full file before editing)\n```javascript\n"));
        assert!(prompt.ends_with("=== User request ===\nmake the footer blue"));
    }

    #[test]
    fn test_long_fragment_truncated_and_marked_partial() {
        let long = "a".repeat(2500);
        let block = render_fragment(&fragment("src/App.vue", None, &long, 0.9));
        assert!(block.contains(PARTIAL_MARKER));
        assert!(block.contains("// ... content truncated ..."));
        assert!(!block.contains(&"a".repeat(2001)));
    }

    #[test]
    fn test_total_cap_omits_rest() {
        let body = "b".repeat(1900);
        let matches: Vec<_> = (0..6)
            .map(|i| fragment(&format!("src/f{}.css", i), None, &body, 0.8))
            .collect();
        let prompt = render("", &matches, "q");
        assert!(prompt.contains("...(more relevant code omitted)"));
        assert!(!prompt.contains("[src/f5.css]"));
    }

    #[test]
    fn test_summary_prefix() {
        let prompt = render("=== Current project state ===\n", &[], "hi");
        assert_eq!(prompt, "=== Current project state ===\n\n=== User request ===\nhi");
    }
}
