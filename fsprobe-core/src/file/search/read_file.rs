use serde_json::{json, Value};

use crate::file::access::QueryEngine;
use crate::tools::r#trait::{ToolExecutor, ToolOutput, ToolRequest};

#[derive(Clone)]
pub struct ReadFileTool {
    engine: QueryEngine,
}

impl ReadFileTool {
    pub fn new(engine: QueryEngine) -> Self {
        Self { engine }
    }
}

#[async_trait::async_trait(?Send)]
impl ToolExecutor for ReadFileTool {
    fn name(&self) -> &'static str {
        "readFile"
    }

    fn description(&self) -> &'static str {
        "Read the contents of a file."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filePath": {
                    "type": "string",
                    "description": "The path to the file to read."
                }
            },
            "required": ["filePath"]
        })
    }

    async fn execute(&self, request: &ToolRequest) -> ToolOutput {
        let file_path = match request.required_str("filePath") {
            Ok(file_path) => file_path,
            Err(output) => return output,
        };

        match self.engine.read_file(file_path).await {
            Ok(content) => ToolOutput::Success(json!({ "content": content })),
            Err(e) => e.into(),
        }
    }
}

#[derive(Clone)]
pub struct ReadFileLinesTool {
    engine: QueryEngine,
}

impl ReadFileLinesTool {
    pub fn new(engine: QueryEngine) -> Self {
        Self { engine }
    }
}

#[async_trait::async_trait(?Send)]
impl ToolExecutor for ReadFileLinesTool {
    fn name(&self) -> &'static str {
        "readFileLines"
    }

    fn description(&self) -> &'static str {
        "Read specific lines from a file."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filePath": {
                    "type": "string",
                    "description": "The path to the file to read."
                },
                "startLine": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "The starting line number (1-indexed)."
                },
                "endLine": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "The ending line number (1-indexed, inclusive)."
                }
            },
            "required": ["filePath", "startLine", "endLine"]
        })
    }

    async fn execute(&self, request: &ToolRequest) -> ToolOutput {
        let file_path = match request.required_str("filePath") {
            Ok(file_path) => file_path,
            Err(output) => return output,
        };
        let start_line = match request.required_line("startLine") {
            Ok(line) => line,
            Err(output) => return output,
        };
        let end_line = match request.required_line("endLine") {
            Ok(line) => line,
            Err(output) => return output,
        };

        match self
            .engine
            .read_file_lines(file_path, start_line, end_line)
            .await
        {
            Ok(content) => ToolOutput::Success(json!({ "content": content })),
            Err(e) => e.into(),
        }
    }
}
