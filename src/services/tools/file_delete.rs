use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::paths::normalize_relative;
use super::{required_str, str_arg_or, Tool, ToolContext};
use crate::error::Result;

/// Project files the model may never delete.
const PROTECTED_FILES: &[&str] = &[
    "package.json",
    "package-lock.json",
    "vite.config.js",
    "vite.config.ts",
    "index.html",
    "src/main.js",
    "src/main.ts",
    "src/App.vue",
];

/// Deletes a single file.
pub struct DeleteFileTool;

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &'static str {
        "deleteFile"
    }

    fn display_name(&self) -> &'static str {
        "Delete file"
    }

    fn description(&self) -> &'static str {
        "Delete a file at the given project-relative path; core project files are protected"
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
        if PROTECTED_FILES.contains(&normalize_relative(relative).as_str()) {
            warn!(app_id = ctx.app_id, path = relative, "Refused to delete protected file");
            return Ok(format!(
                "Error: deleting important project files is not allowed - {}",
                relative
            ));
        }

        let path = match ctx.resolve(relative) {
            Ok(path) => path,
            Err(message) => return Ok(message),
        };
        if !path.exists() {
            return Ok(format!("Error: file does not exist - {}", relative));
        }
        if !path.is_file() {
            return Ok(format!("Error: not a file, directories cannot be deleted - {}", relative));
        }

        Ok(match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(app_id = ctx.app_id, path = %path.display(), "File deleted");
                format!("File deleted: {}", relative)
            }
            Err(e) => format!("Error: failed to delete file {}: {}", relative, e),
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
    async fn test_delete_and_protect() {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("vue_project_4/src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("Old.vue"), "x").unwrap();
        std::fs::write(src.join("main.js"), "x").unwrap();
        let ctx = ToolContext::new(4, root.path());

        let result = DeleteFileTool
            .execute(&json!({"relativeFilePath": "src/Old.vue"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result, "File deleted: src/Old.vue");
        assert!(!src.join("Old.vue").exists());

        let result = DeleteFileTool
            .execute(&json!({"relativeFilePath": "./src/main.js"}), &ctx)
            .await
            .unwrap();
        assert!(result.starts_with("Error: deleting important project files"));
        assert!(src.join("main.js").exists());

        let result = DeleteFileTool
            .execute(&json!({"relativeFilePath": "src/Gone.vue"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result, "Error: file does not exist - src/Gone.vue");
    }
}
