use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_ignore_file_name() -> String {
    ".gitignore".to_string()
}

fn default_pruned_directories() -> Vec<String> {
    vec!["node_modules".to_string()]
}

/// Settings for the file query core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    /// Name of the per-directory file holding exclusion rules.
    #[serde(default = "default_ignore_file_name")]
    pub ignore_file_name: String,

    /// Directory names the ignore-file discovery never descends into. Hidden
    /// directories are always skipped. This only bounds discovery; it never
    /// excludes anything from query results.
    #[serde(default = "default_pruned_directories")]
    pub pruned_directories: Vec<String>,

    /// Optional deadline applied to every query operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_timeout_ms: Option<u64>,
}

impl File {
    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for File {
    fn default() -> Self {
        Self {
            ignore_file_name: default_ignore_file_name(),
            pruned_directories: default_pruned_directories(),
            query_timeout_ms: None,
        }
    }
}
