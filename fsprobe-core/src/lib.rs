pub mod error;
pub mod file;
pub mod settings;
pub mod tools;

// Public library API - callers embedding fsprobe should only need these.
pub use error::{DenyReason, ErrorKind, QueryError};
pub use file::access::QueryEngine;
pub use file::ignore::{IgnoreIndex, IgnoreRule, RuleSet};
pub use file::resolver::PathGuard;
pub use file::search::{FileSearchModule, SearchMatch};
pub use settings::{Settings, SettingsManager};
pub use tools::r#trait::ToolExecutor;
