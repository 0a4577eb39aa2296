use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{quick_validator, required_str, str_arg_or, Tool, ToolContext};
use crate::error::Result;

/// Replaces every occurrence of a snippet inside an existing file.
pub struct ModifyFileTool;

#[async_trait]
impl Tool for ModifyFileTool {
    fn name(&self) -> &'static str {
        "modifyFile"
    }

    fn display_name(&self) -> &'static str {
        "Modify file"
    }

    fn description(&self) -> &'static str {
        "Modify a file by replacing the given old content with new content"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "relativeFilePath": { "type": "string", "description": "Project-relative file path" },
                "oldContent": { "type": "string", "description": "Exact text to replace" },
                "newContent": { "type": "string", "description": "Replacement text" }
            },
            "required": ["relativeFilePath", "oldContent", "newContent"]
        })
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Result<String> {
        let relative = match required_str(args, "relativeFilePath") {
            Ok(r) => r,
            Err(e) => return Ok(e),
        };
        let (old, new) = match (required_str(args, "oldContent"), required_str(args, "newContent")) {
            (Ok(o), Ok(n)) => (o, n),
            (Err(e), _) | (_, Err(e)) => return Ok(e),
        };

        // An identical replacement would let the model loop on the same call
        if old == new {
            warn!(app_id = ctx.app_id, path = relative, "Identical old and new content");
            return Ok("Error: old and new content are identical, nothing to modify. If the task is complete, tell the user directly.".to_string());
        }

        let path = match ctx.resolve(relative) {
            Ok(path) => path,
            Err(message) => return Ok(message),
        };
        if !path.exists() {
            return Ok(format!("Error: file does not exist - {}", relative));
        }
        if !path.is_file() {
            return Ok(format!("Error: not a file - {}", relative));
        }

        let original = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => return Ok(format!("Error: failed to modify file {}: {}", relative, e)),
        };
        if old.is_empty() || !original.contains(old) {
            warn!(
                path = relative,
                old_len = old.len(),
                first_line_present = original.contains(old.lines().next().unwrap_or("")),
                "Content to replace not found"
            );
            return Ok(format!(
                "Warning: content to replace was not found, file unchanged - {}",
                relative
            ));
        }

        let modified = original.replace(old, new);
        if let Err(e) = tokio::fs::write(&path, &modified).await {
            return Ok(format!("Error: failed to modify file {}: {}", relative, e));
        }
        info!(app_id = ctx.app_id, path = %path.display(), "File modified");

        let errors = quick_validator::validate(relative, &modified);
        Ok(match quick_validator::format_result(&errors) {
            Some(check) => format!("File modified: {}\n{}", relative, check),
            None => format!("File modified: {}", relative),
        })
    }

    fn format_executed(&self, args: &Value) -> String {
        format!(
            "[Tool call] {} {}\n\nBefore:\n```\n{}\n```\n\nAfter:\n```\n{}\n```\n",
            self.display_name(),
            str_arg_or(args, "relativeFilePath", ""),
            str_arg_or(args, "oldContent", ""),
            str_arg_or(args, "newContent", "")
        )
    }
}
