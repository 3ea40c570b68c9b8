use serde_json::{json, Value};
use tracing::debug;

use crate::{
    error::QueryError,
    file::access::QueryEngine,
    file::search::search_files::target_name,
    tools::r#trait::{ToolExecutor, ToolOutput, ToolRequest},
};

impl QueryEngine {
    /// Root-relative paths of the files under `directory` (default: the root)
    /// matching the glob `pattern`, sorted.
    pub async fn search_glob(
        &self,
        pattern: &str,
        directory: Option<&str>,
    ) -> Result<Vec<String>, QueryError> {
        self.with_deadline(target_name(directory), async {
            let search_dir = self.resolve_search_dir(directory).await?;
            let files: Vec<String> = self
                .expand_glob(&search_dir, pattern)
                .await?
                .into_iter()
                .map(|candidate| candidate.relative)
                .collect();

            debug!(
                pattern,
                directory = target_name(directory),
                files = files.len(),
                "Glob search complete"
            );
            Ok::<_, QueryError>(files)
        })
        .await
    }
}

#[derive(Clone)]
pub struct GlobFilesTool {
    engine: QueryEngine,
}

impl GlobFilesTool {
    pub fn new(engine: QueryEngine) -> Self {
        Self { engine }
    }
}

#[async_trait::async_trait(?Send)]
impl ToolExecutor for GlobFilesTool {
    fn name(&self) -> &'static str {
        "glob"
    }

    fn description(&self) -> &'static str {
        "Find files matching a glob pattern. Paths are relative to the project root."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "The glob pattern to match (e.g., \"**/*.ts\")."
                },
                "directory": {
                    "type": "string",
                    "description": "The directory to search in (defaults to project root)."
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, request: &ToolRequest) -> ToolOutput {
        let pattern = match request.required_str("pattern") {
            Ok(pattern) => pattern,
            Err(output) => return output,
        };
        let directory = match request.optional_str("directory") {
            Ok(directory) => directory,
            Err(output) => return output,
        };

        match self.engine.search_glob(pattern, directory).await {
            Ok(files) => ToolOutput::Success(json!({ "files": files })),
            Err(e) => e.into(),
        }
    }
}
