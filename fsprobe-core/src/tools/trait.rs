use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use strum::Display;

use crate::error::{ErrorKind, QueryError};

/// Request passed to tool execution
#[derive(Debug, Clone)]
pub struct ToolRequest {
    /// The arguments for the tool
    pub arguments: Value,
    /// The unique ID for this tool use
    pub tool_use_id: String,
}

impl ToolRequest {
    pub fn new(arguments: Value, tool_use_id: impl Into<String>) -> Self {
        Self {
            arguments,
            tool_use_id: tool_use_id.into(),
        }
    }

    pub fn required_str(&self, name: &str) -> Result<&str, ToolOutput> {
        self.optional_str(name)?.ok_or_else(|| {
            ToolOutput::invalid_arguments(format!("Missing required parameter: {name}"))
        })
    }

    /// Absent and `null` both mean "not given".
    pub fn optional_str(&self, name: &str) -> Result<Option<&str>, ToolOutput> {
        match self.arguments.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(ToolOutput::invalid_arguments(format!(
                "Parameter {name} must be a string, got {other}"
            ))),
        }
    }

    /// A positive line number. Integral floats (`3.0`) are accepted since
    /// models frequently emit them.
    pub fn required_line(&self, name: &str) -> Result<usize, ToolOutput> {
        let value = self.arguments.get(name).ok_or_else(|| {
            ToolOutput::invalid_arguments(format!("Missing required parameter: {name}"))
        })?;

        let line = value
            .as_u64()
            .or_else(|| {
                value
                    .as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            })
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()));

        match line {
            Some(line) if line >= 1 => Ok(line as usize),
            _ => Err(ToolOutput::invalid_arguments(format!(
                "Parameter {name} must be a line number >= 1, got {value}"
            ))),
        }
    }
}

/// Classification carried by a failed [`ToolOutput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    AccessDenied,
    Ignored,
    Io,
    BadPattern,
    InvalidArguments,
    UnknownTool,
}

impl From<ErrorKind> for FailureKind {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::AccessDenied => Self::AccessDenied,
            ErrorKind::Ignored => Self::Ignored,
            ErrorKind::Io => Self::Io,
            ErrorKind::BadPattern => Self::BadPattern,
        }
    }
}

/// Result of a tool call. Tools never return a Rust error to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Success(Value),
    Failure {
        kind: FailureKind,
        error: String,
        raw_error: Option<String>,
    },
}

impl ToolOutput {
    pub fn invalid_arguments(error: impl Into<String>) -> Self {
        Self::Failure {
            kind: FailureKind::InvalidArguments,
            error: error.into(),
            raw_error: None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// Wire form: the success payload, or `{"error", "kind", "rawError"?}`.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Success(value) => value.clone(),
            Self::Failure {
                kind,
                error,
                raw_error,
            } => {
                let mut failure = json!({
                    "error": error,
                    "kind": kind,
                });
                if let Some(raw) = raw_error {
                    failure["rawError"] = json!(raw);
                }
                failure
            }
        }
    }
}

impl From<QueryError> for ToolOutput {
    fn from(err: QueryError) -> Self {
        Self::Failure {
            kind: err.kind().into(),
            error: err.to_string(),
            raw_error: err.raw_error(),
        }
    }
}

/// Name, description and argument schema of a tool, as shown to a caller.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[async_trait::async_trait(?Send)]
pub trait ToolExecutor {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn input_schema(&self) -> Value;

    async fn execute(&self, request: &ToolRequest) -> ToolOutput;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

pub type SharedTool = Arc<dyn ToolExecutor>;
