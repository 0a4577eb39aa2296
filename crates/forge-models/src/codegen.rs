//! Output shapes a generation turn can produce.

use serde::{Deserialize, Serialize};

/// Code generation pipeline, selected by the shape of the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeGenType {
    /// A single self-contained HTML document
    Html,
    /// index.html + style.css + script.js
    MultiFile,
    /// A Vue project built up through tool calls
    VueProject,
}

impl CodeGenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeGenType::Html => "html",
            CodeGenType::MultiFile => "multi_file",
            CodeGenType::VueProject => "vue_project",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "html" => Some(CodeGenType::Html),
            "multi_file" | "multi-file" | "multifile" => Some(CodeGenType::MultiFile),
            "vue_project" | "vue-project" | "vue" => Some(CodeGenType::VueProject),
            _ => None,
        }
    }

    pub fn all() -> &'static [CodeGenType] {
        &[
            CodeGenType::Html,
            CodeGenType::MultiFile,
            CodeGenType::VueProject,
        ]
    }

    /// Whether this pipeline runs the tool loop.
    pub fn uses_tools(&self) -> bool {
        matches!(self, CodeGenType::VueProject)
    }

    /// Directory name of an app's generated project under the output root.
    pub fn dir_name(&self, app_id: i64) -> String {
        format!("{}_{}", self.as_str(), app_id)
    }
}

impl Default for CodeGenType {
    fn default() -> Self {
        CodeGenType::Html
    }
}

impl std::fmt::Display for CodeGenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
