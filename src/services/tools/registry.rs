//! Name-keyed tool lookup built once at startup.

use std::collections::HashMap;
use std::sync::Arc;

use forge_llm::ToolSpec;
use serde_json::Value;
use tracing::{debug, warn};

use super::{
    DeleteFileTool, GenerateLogoTool, ModifyFileTool, ReadDirTool, ReadFileTool, SearchImagesTool, Tool,
    ToolContext, ValidateCodeTool, WriteFileTool,
};
use crate::config::ToolsConfig;
use crate::error::Result;

/// Registry of model-invokable tools.
///
/// Registration order is kept so the declared tool list is stable
/// between requests.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
    order: Vec<&'static str>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in tool.
    pub fn with_defaults(tools_config: &ToolsConfig) -> Self {
        let mut registry = Self::new();

        // File tools
        registry.register(Arc::new(WriteFileTool));
        registry.register(Arc::new(ReadFileTool));
        registry.register(Arc::new(ModifyFileTool));
        registry.register(Arc::new(DeleteFileTool));
        registry.register(Arc::new(ReadDirTool));

        // Asset tools
        registry.register(Arc::new(SearchImagesTool::new(tools_config)));
        registry.register(Arc::new(GenerateLogoTool));

        registry.register(Arc::new(ValidateCodeTool));

        registry
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name();
        if self.tools.insert(name, tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Tool names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.order.clone()
    }

    /// Declarations sent to the model.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.spec())
            .collect()
    }

    /// Execute a tool by name with the model's raw JSON arguments.
    ///
    /// An unknown tool or unparseable arguments come back as text for the
    /// model; only a tool's own `Err` propagates.
    pub async fn execute(&self, name: &str, raw_args: &str, ctx: &ToolContext) -> Result<String> {
        let Some(tool) = self.get(name) else {
            warn!(tool = name, "Model requested an unknown tool");
            return Ok(format!("Error: there is no tool called {}", name));
        };

        let args = match parse_args(raw_args) {
            Ok(args) => args,
            Err(e) => {
                warn!(tool = name, error = %e, "Tool arguments are not valid JSON");
                return Ok(format!("Error: invalid arguments for {}: {}", name, e));
            }
        };

        debug!(tool = name, app_id = ctx.app_id, "Executing tool");
        tool.execute(&args, ctx).await
    }

    /// Caller-visible notice for a newly requested call.
    pub fn format_request(&self, name: &str) -> String {
        match self.get(name) {
            Some(tool) => tool.format_request(),
            None => format!("\n\n[Tool selected] {}\n\n", name),
        }
    }

    /// Caller-visible rendering of a finished call.
    pub fn format_executed(&self, name: &str, raw_args: &str) -> String {
        match (self.get(name), parse_args(raw_args)) {
            (Some(tool), Ok(args)) => tool.format_executed(&args),
            _ => format!("[Tool call] {}", name),
        }
    }

    pub fn display_name(&self, name: &str) -> String {
        self.get(name)
            .map(|tool| tool.display_name().to_string())
            .unwrap_or_else(|| name.to_string())
    }
}

/// Parse a raw argument string; blank input means "no arguments".
fn parse_args(raw: &str) -> serde_json::Result<Value> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw)
}
