use regex::Regex;
use serde_json::{json, Value};
use tokio::fs;
use tracing::debug;

use crate::{
    error::QueryError,
    file::access::QueryEngine,
    file::search::{SearchMatch, DEFAULT_FILE_PATTERN},
    tools::r#trait::{ToolExecutor, ToolOutput, ToolRequest},
};

impl QueryEngine {
    /// Every line matching the regex `pattern` in files under `directory`
    /// (default: the root) whose path matches `file_pattern` (default: all
    /// files). Ordered by file, then line. Unreadable files are skipped.
    pub async fn search_pattern(
        &self,
        pattern: &str,
        directory: Option<&str>,
        file_pattern: Option<&str>,
    ) -> Result<Vec<SearchMatch>, QueryError> {
        self.with_deadline(
            target_name(directory),
            self.search_pattern_inner(pattern, directory, file_pattern),
        )
        .await
    }

    async fn search_pattern_inner(
        &self,
        pattern: &str,
        directory: Option<&str>,
        file_pattern: Option<&str>,
    ) -> Result<Vec<SearchMatch>, QueryError> {
        let search_dir = self.resolve_search_dir(directory).await?;
        let regex = Regex::new(pattern).map_err(|e| QueryError::bad_pattern(pattern, e))?;
        let candidates = self
            .expand_glob(&search_dir, file_pattern.unwrap_or(DEFAULT_FILE_PATTERN))
            .await?;

        let mut matches = Vec::new();
        for candidate in &candidates {
            let content = match fs::read_to_string(&candidate.path).await {
                Ok(content) => content,
                Err(e) => {
                    debug!(file = %candidate.relative, error = %e, "Skipping unreadable file");
                    continue;
                }
            };

            for (index, line) in content.lines().enumerate() {
                if regex.is_match(line) {
                    matches.push(SearchMatch {
                        file: candidate.relative.clone(),
                        line: index + 1,
                        content: line.trim().to_string(),
                    });
                }
            }
        }

        debug!(
            pattern,
            directory = target_name(directory),
            files = candidates.len(),
            matches = matches.len(),
            "Pattern search complete"
        );
        Ok(matches)
    }
}

pub(crate) fn target_name(directory: Option<&str>) -> &str {
    directory.unwrap_or(".")
}

#[derive(Clone)]
pub struct SearchFilesTool {
    engine: QueryEngine,
}

impl SearchFilesTool {
    pub fn new(engine: QueryEngine) -> Self {
        Self { engine }
    }
}

#[async_trait::async_trait(?Send)]
impl ToolExecutor for SearchFilesTool {
    fn name(&self) -> &'static str {
        "grep"
    }

    fn description(&self) -> &'static str {
        "Search for a pattern in files using regex."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "The regex pattern to search for."
                },
                "directory": {
                    "type": "string",
                    "description": "The directory to search in (defaults to project root)."
                },
                "filePattern": {
                    "type": "string",
                    "description": "File pattern to filter (e.g., \"**/*.ts\"). Defaults to all files."
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
        let file_pattern = match request.optional_str("filePattern") {
            Ok(file_pattern) => file_pattern,
            Err(output) => return output,
        };

        match self
            .engine
            .search_pattern(pattern, directory, file_pattern)
            .await
        {
            Ok(matches) => ToolOutput::Success(json!({ "matches": matches })),
            Err(e) => e.into(),
        }
    }
}
