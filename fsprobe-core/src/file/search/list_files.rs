use serde_json::{json, Value};

use crate::file::access::QueryEngine;
use crate::tools::r#trait::{ToolExecutor, ToolOutput, ToolRequest};

#[derive(Clone)]
pub struct ListFilesTool {
    engine: QueryEngine,
}

impl ListFilesTool {
    pub fn new(engine: QueryEngine) -> Self {
        Self { engine }
    }
}

#[async_trait::async_trait(?Send)]
impl ToolExecutor for ListFilesTool {
    fn name(&self) -> &'static str {
        "ls"
    }

    fn description(&self) -> &'static str {
        "List files and directories in a given path."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "directory": {
                    "type": "string",
                    "description": "The directory to list. Use '.' for the project root."
                }
            },
            "required": ["directory"]
        })
    }

    async fn execute(&self, request: &ToolRequest) -> ToolOutput {
        let directory = match request.required_str("directory") {
            Ok(directory) => directory,
            Err(output) => return output,
        };

        match self.engine.list(directory).await {
            Ok(files) => ToolOutput::Success(json!({ "files": files })),
            Err(e) => e.into(),
        }
    }
}
