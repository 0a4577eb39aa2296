use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use super::{required_str, str_arg_or, Tool, ToolContext};
use crate::error::Result;

/// Returns a file's full text.
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        "readFile"
    }

    fn display_name(&self) -> &'static str {
        "Read file"
    }

    fn description(&self) -> &'static str {
        "Read the content of a file at the given project-relative path"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "relativeFilePath": { "type": "string", "description": "Project-relative file path" }
            },
            "required": ["relativeFilePath"]
        })
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Result<String> {
        let relative = match required_str(args, "relativeFilePath") {
            Ok(r) => r,
            Err(e) => return Ok(e),
        };
        let path = match ctx.resolve(relative) {
            Ok(path) => path,
            Err(message) => return Ok(message),
        };
        info!(app_id = ctx.app_id, path = %path.display(), "Reading file");

        if !path.is_file() {
            return Ok(format!(
                "Error: file does not exist or is not a file - {}",
                relative
            ));
        }
        Ok(match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => format!("Error: failed to read file {}: {}", relative, e),
        })
    }

    fn format_executed(&self, args: &Value) -> String {
        format!(
            "[Tool call] {} {}",
            self.display_name(),
            str_arg_or(args, "relativeFilePath", "")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_existing_and_missing() {
        let root = tempfile::tempdir().unwrap();
        let project = root.path().join("vue_project_1/src");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(project.join("App.vue"), "<template/>").unwrap();
        let ctx = ToolContext::new(1, root.path());

        let content = ReadFileTool
            .execute(&json!({"relativeFilePath": "src/App.vue"}), &ctx)
            .await
            .unwrap();
        assert_eq!(content, "<template/>");

        let missing = ReadFileTool
            .execute(&json!({"relativeFilePath": "src/Nope.vue"}), &ctx)
            .await
            .unwrap();
        assert_eq!(missing, "Error: file does not exist or is not a file - src/Nope.vue");

        let dir = ReadFileTool
            .execute(&json!({"relativeFilePath": "src"}), &ctx)
            .await
            .unwrap();
        assert!(dir.starts_with("Error:"));
    }
}
