use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{extension, quick_validator, required_str, str_arg_or, Tool, ToolContext};
use crate::error::Result;

/// Writes a whole file, creating parent directories.
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &'static str {
        "writeFile"
    }

    fn display_name(&self) -> &'static str {
        "Write file"
    }

    fn description(&self) -> &'static str {
        "Write content to a file at the given project-relative path, replacing any existing file"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "relativeFilePath": { "type": "string", "description": "Project-relative file path" },
                "content": { "type": "string", "description": "Full file content" }
            },
            "required": ["relativeFilePath", "content"]
        })
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Result<String> {
        let (relative, content) = match (required_str(args, "relativeFilePath"), required_str(args, "content")) {
            (Ok(r), Ok(c)) => (r, c),
            (Err(e), _) | (_, Err(e)) => return Ok(e),
        };
        let path = match ctx.resolve(relative) {
            Ok(path) => path,
            Err(message) => return Ok(message),
        };

        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return Ok(format!("Error: failed to write file {}: {}", relative, e));
            }
        }
        if let Err(e) = tokio::fs::write(&path, content).await {
            warn!(path = %path.display(), error = %e, "File write failed");
            return Ok(format!("Error: failed to write file {}: {}", relative, e));
        }
        info!(app_id = ctx.app_id, path = %path.display(), bytes = content.len(), "File written");

        let errors = quick_validator::validate(relative, content);
        Ok(match quick_validator::format_result(&errors) {
            Some(check) => {
                warn!(path = relative, ?errors, "Syntax check warnings");
                format!("File written: {}\n{}", relative, check)
            }
            None => format!("File written: {}", relative),
        })
    }

    fn format_executed(&self, args: &Value) -> String {
        let relative = str_arg_or(args, "relativeFilePath", "");
        format!(
            "[Tool call] {} {}\n```{}\n{}\n```\n",
            self.display_name(),
            relative,
            extension(relative),
            str_arg_or(args, "content", "")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_creates_dirs_and_validates() {
        let root = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(3, root.path());

        let result = WriteFileTool
            .execute(
                &json!({"relativeFilePath": "src/components/Footer.vue", "content": "<template><footer/></template>"}),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(result, "File written: src/components/Footer.vue");
        let written = std::fs::read_to_string(root.path().join("vue_project_3/src/components/Footer.vue")).unwrap();
        assert_eq!(written, "<template><footer/></template>");

        let result = WriteFileTool
            .execute(&json!({"relativeFilePath": "src/a.js", "content": "if (x {"}), &ctx)
            .await
            .unwrap();
        assert!(result.starts_with("File written: src/a.js\n⚠️ Syntax check:"));
    }

    #[tokio::test]
    async fn test_unsafe_path_is_error_text() {
        let root = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(3, root.path());
        let result = WriteFileTool
            .execute(&json!({"relativeFilePath": "../escape.txt", "content": "x"}), &ctx)
            .await
            .unwrap();
        assert!(result.starts_with("Error:"));
        assert!(!root.path().join("escape.txt").exists());
    }

    #[test]
    fn test_format_executed() {
        let rendered = WriteFileTool.format_executed(&json!({"relativeFilePath": "src/App.vue", "content": "<template/>"}));
        assert_eq!(rendered, "[Tool call] Write file src/App.vue\n```vue\n<template/>\n```\n");
    }
}
