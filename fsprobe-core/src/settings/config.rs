use serde::{Deserialize, Serialize};

use crate::file::config::File;

fn default_log_filter() -> String {
    "info".to_string()
}

/// Top-level settings, loaded from TOML. Every field has a default so partial
/// files load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// `tracing` filter directive used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    #[serde(default)]
    pub file: File,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            file: File::default(),
        }
    }
}
