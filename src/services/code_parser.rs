//! Extract and save code from the plain-text pipelines' output.

use std::path::{Path, PathBuf};

use forge_models::CodeGenType;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use crate::error::{Error, Result};

static HTML_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)```html\s*\n([\s\S]*?)```").expect("valid regex"));
static CSS_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)```css\s*\n([\s\S]*?)```").expect("valid regex"));
static JS_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)```(?:js|javascript)\s*\n([\s\S]*?)```").expect("valid regex"));
static GENERIC_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"```\s*\n([\s\S]*?)```").expect("valid regex"));
static HTML_DOCUMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(<!DOCTYPE[^>]*>\s*)?(<html[\s\S]*?</html>)").expect("valid regex"));

/// Files parsed from one response, keyed by output file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCode {
    pub html: String,
    pub css: String,
    pub js: String,
}

impl ParsedCode {
    /// Non-empty files to write.
    pub fn files(&self) -> Vec<(&'static str, &str)> {
        [("index.html", &self.html), ("style.css", &self.css), ("script.js", &self.js)]
            .into_iter()
            .filter(|(_, content)| !content.trim().is_empty())
            .map(|(name, content)| (name, content.as_str()))
            .collect()
    }
}

/// Single-page HTML: fenced html, a generic fence holding a document, a bare
/// document, and finally the whole response.
pub fn parse_html(response: &str) -> ParsedCode {
    let html = first_group(&HTML_BLOCK, response)
        .or_else(|| {
            first_group(&GENERIC_BLOCK, response).filter(|block| block.contains("<html") || block.contains("<!DOCTYPE"))
        })
        .filter(|s| !s.trim().is_empty())
        .or_else(|| html_document(response))
        .unwrap_or_else(|| {
            warn!(len = response.len(), "No HTML found in response, saving it verbatim");
            response.to_string()
        });

    ParsedCode {
        html: html.trim().to_string(),
        ..Default::default()
    }
}

/// `index.html` + `style.css` + `script.js` from their fenced blocks.
pub fn parse_multi_file(response: &str) -> ParsedCode {
    let html = first_group(&HTML_BLOCK, response)
        .filter(|s| !s.trim().is_empty())
        .or_else(|| html_document(response))
        .unwrap_or_default();

    ParsedCode {
        html: html.trim().to_string(),
        css: first_group(&CSS_BLOCK, response).unwrap_or_default().trim().to_string(),
        js: first_group(&JS_BLOCK, response).unwrap_or_default().trim().to_string(),
    }
}

/// Parse according to the pipeline; the tool pipeline writes its own files.
pub fn parse(codegen_type: CodeGenType, response: &str) -> Option<ParsedCode> {
    match codegen_type {
        CodeGenType::Html => Some(parse_html(response)),
        CodeGenType::MultiFile => Some(parse_multi_file(response)),
        CodeGenType::VueProject => None,
    }
}

/// Write parsed files into `{output_root}/{type}_{app_id}/`.
pub async fn save(output_root: &Path, codegen_type: CodeGenType, app_id: i64, code: &ParsedCode) -> Result<PathBuf> {
    let files = code.files();
    if files.is_empty() {
        return Err(Error::InvalidInput("response contained no code to save".to_string()));
    }

    let dir = output_root.join(codegen_type.dir_name(app_id));
    tokio::fs::create_dir_all(&dir).await?;
    for (name, content) in &files {
        tokio::fs::write(dir.join(name), content).await?;
    }

    info!(app_id, dir = %dir.display(), files = files.len(), "Saved generated code");
    Ok(dir)
}

fn first_group(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn html_document(text: &str) -> Option<String> {
    let caps = HTML_DOCUMENT.captures(text)?;
    let doctype = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    let html = caps.get(2)?.as_str();
    Some(format!("{}{}", doctype, html))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_html_fence_preferred() {
        let text = "Here you go:\n```html\n<!DOCTYPE html><html><body>hi</body></html>\n```\nEnjoy";
        assert_eq!(parse_html(text).html, "<!DOCTYPE html><html><body>hi</body></html>");
    }

    #[test]
    fn test_generic_fence_needs_document() {
        let text = "```\n<html><p>x</p></html>\n```";
        assert_eq!(parse_html(text).html, "<html><p>x</p></html>");

        let text = "```\nconsole.log(1)\n```\n<!DOCTYPE html>\n<html>doc</html>";
        assert_eq!(parse_html(text).html, "<!DOCTYPE html>\n<html>doc</html>");
    }

    #[test]
    fn test_falls_back_to_whole_text() {
        assert_eq!(parse_html("  just words  ").html, "just words");
    }

    #[test]
    fn test_multi_file() {
        let text = "```html\n<html></html>\n```\n```css\nbody{}\n```\n```javascript\nlet a;\n```";
        let code = parse_multi_file(text);
        assert_eq!(code.html, "<html></html>");
        assert_eq!(code.css, "body{}");
        assert_eq!(code.js, "let a;");
        assert_eq!(code.files().len(), 3);
    }

    #[tokio::test]
    async fn test_save_skips_empty_parts() {
        let dir = TempDir::new().unwrap();
        let code = parse_multi_file("```html\n<html></html>\n```");
        let saved = save(dir.path(), CodeGenType::MultiFile, 4, &code).await.unwrap();

        assert_eq!(saved, dir.path().join("multi_file_4"));
        assert!(saved.join("index.html").exists());
        assert!(!saved.join("style.css").exists());

        let empty = ParsedCode::default();
        assert!(save(dir.path(), CodeGenType::Html, 4, &empty).await.is_err());
    }
}
