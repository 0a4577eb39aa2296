use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use super::{str_arg, Tool, ToolContext};
use crate::error::Result;
use crate::services::project_summary::{file_tree, is_dir};

/// Lists a project directory as a tree.
pub struct ReadDirTool;

#[async_trait]
impl Tool for ReadDirTool {
    fn name(&self) -> &'static str {
        "readDir"
    }

    fn display_name(&self) -> &'static str {
        "Read directory"
    }

    fn description(&self) -> &'static str {
        "List the files under a project-relative directory; omit the path for the project root"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "relativeDirPath": { "type": "string", "description": "Project-relative directory, empty for the root" }
            }
        })
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Result<String> {
        let relative = str_arg(args, "relativeDirPath")
            .map(str::trim)
            .filter(|p| !p.is_empty() && *p != ".")
            .unwrap_or("");

        let dir = if relative.is_empty() {
            ctx.project_root()
        } else {
            match ctx.resolve(relative) {
                Ok(path) => path,
                Err(message) => return Ok(message),
            }
        };
        info!(app_id = ctx.app_id, dir = %dir.display(), "Reading directory");

        if !is_dir(&dir).await {
            return Ok(format!(
                "Error: directory does not exist - {}",
                if relative.is_empty() { "." } else { relative }
            ));
        }

        let tree = file_tree(&dir).await;
        Ok(format!(
            "Directory structure of {}:\n{}",
            if relative.is_empty() { "." } else { relative },
            if tree.is_empty() { "(empty)\n".to_string() } else { tree }
        ))
    }

    fn format_executed(&self, args: &Value) -> String {
        let relative = str_arg(args, "relativeDirPath").filter(|p| !p.trim().is_empty());
        format!("[Tool call] {} {}", self.display_name(), relative.unwrap_or("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lists_project_root_and_subdir() {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("vue_project_6/src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("App.vue"), "").unwrap();
        let ctx = ToolContext::new(6, root.path());

        let listing = ReadDirTool.execute(&json!({}), &ctx).await.unwrap();
        assert_eq!(listing, "Directory structure of .:\n└── src/\n    └── App.vue\n");

        let listing = ReadDirTool
            .execute(&json!({"relativeDirPath": "src"}), &ctx)
            .await
            .unwrap();
        assert_eq!(listing, "Directory structure of src:\n└── App.vue\n");

        let missing = ReadDirTool
            .execute(&json!({"relativeDirPath": "docs"}), &ctx)
            .await
            .unwrap();
        assert_eq!(missing, "Error: directory does not exist - docs");
    }
}
