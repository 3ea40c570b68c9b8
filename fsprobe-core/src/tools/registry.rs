use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::tools::r#trait::{FailureKind, SharedTool, ToolDefinition, ToolOutput, ToolRequest};

pub struct ToolRegistry {
    tools: BTreeMap<String, SharedTool>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<SharedTool>) -> Self {
        let mut registry = Self {
            tools: BTreeMap::new(),
        };

        for tool in tools {
            registry.register_tool(tool);
        }

        registry
    }

    pub fn register_tool(&mut self, tool: SharedTool) {
        let name = tool.name().to_string();
        debug!(tool_name = %name, "Registering tool");
        self.tools.insert(name, tool);
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    pub fn list_tools(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&SharedTool> {
        self.tools.get(name)
    }

    pub async fn execute(&self, name: &str, request: &ToolRequest) -> ToolOutput {
        let Some(tool) = self.tools.get(name) else {
            warn!(tool_name = %name, "Unknown tool");
            return ToolOutput::Failure {
                kind: FailureKind::UnknownTool,
                error: format!(
                    "Unknown tool: {name}. Available tools: {}",
                    self.list_tools().join(", ")
                ),
                raw_error: None,
            };
        };

        debug!(tool_name = %name, tool_use_id = %request.tool_use_id, "Executing tool");
        let output = tool.execute(request).await;
        if let ToolOutput::Failure { kind, error, .. } = &output {
            debug!(tool_name = %name, %kind, %error, "Tool call failed");
        }
        output
    }
}
