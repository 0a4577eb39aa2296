//! Model-invokable tools.
//!
//! Each tool implements [`Tool`]: a name the model calls it by, a JSON schema
//! for its arguments, and `execute`, which performs the side effect and
//! returns the text the model sees. Expected failures (missing file, bad
//! path, unreachable API) come back as `Ok` error text so the model can
//! adapt; `Err` is reserved for faults that should end the turn.
//!
//! Tools are looked up by name through the [`ToolRegistry`] built at startup.

mod code_validator;
mod dir_read;
mod file_delete;
mod file_modify;
mod file_read;
mod file_write;
mod image_search;
mod logo;
pub mod paths;
pub mod quick_validator;
mod registry;

pub use code_validator::ValidateCodeTool;
pub use dir_read::ReadDirTool;
pub use file_delete::DeleteFileTool;
pub use file_modify::ModifyFileTool;
pub use file_read::ReadFileTool;
pub use file_write::WriteFileTool;
pub use image_search::SearchImagesTool;
pub use logo::GenerateLogoTool;
pub use registry::ToolRegistry;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use forge_llm::ToolSpec;
use serde_json::Value;

use crate::error::Result;

/// Per-turn context handed to every tool call.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub app_id: i64,
    /// Directory holding every generated project
    pub output_root: PathBuf,
}

impl ToolContext {
    pub fn new(app_id: i64, output_root: impl Into<PathBuf>) -> Self {
        Self {
            app_id,
            output_root: output_root.into(),
        }
    }

    /// Root of this app's project (see [`paths::resolve_project_root`]).
    pub fn project_root(&self) -> PathBuf {
        paths::resolve_project_root(&self.output_root, self.app_id)
    }

    /// Resolve a model-supplied relative path, or an error message for the model.
    pub fn resolve(&self, relative: &str) -> std::result::Result<PathBuf, String> {
        paths::resolve_file_path(&self.output_root, self.app_id, relative)
    }
}

/// A named, model-invokable operation.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model calls the tool by (e.g. "writeFile").
    fn name(&self) -> &'static str;

    /// Human-readable name shown when the tool is selected.
    fn display_name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;

    /// Run the tool.
    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Result<String>;

    /// Caller-visible rendering of a finished call.
    fn format_executed(&self, args: &Value) -> String;

    /// Caller-visible notice for a newly requested call.
    fn format_request(&self) -> String {
        format!("\n\n[Tool selected] {}\n\n", self.display_name())
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

// ============================================================================
// Argument helpers
// ============================================================================

/// String argument, if present.
pub(crate) fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

/// String argument or a default.
pub(crate) fn str_arg_or<'a>(args: &'a Value, key: &str, default: &'a str) -> &'a str {
    str_arg(args, key).unwrap_or(default)
}

/// Required string argument; the error is the text returned to the model.
pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> std::result::Result<&'a str, String> {
    str_arg(args, key).ok_or_else(|| format!("Error: missing required argument '{}'", key))
}

/// File extension without the dot, lowercased.
pub(crate) fn extension(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}
