use std::io;

use serde::Serialize;
use strum::Display;
use thiserror::Error;

/// Why a path was refused by the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DenyReason {
    #[strum(to_string = "path is outside the project root")]
    OutsideRoot,
    #[strum(to_string = "path does not exist or is not accessible")]
    NotFound,
}

/// Stable, wire-friendly classification of a [`QueryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AccessDenied,
    Ignored,
    Io,
    BadPattern,
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Access denied for {path}: {reason}")]
    AccessDenied { path: String, reason: DenyReason },

    #[error("Path is excluded by ignore rules: {path}")]
    Ignored { path: String },

    #[error("I/O failure on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid pattern {pattern:?}: {message}")]
    BadPattern { pattern: String, message: String },
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AccessDenied { .. } => ErrorKind::AccessDenied,
            Self::Ignored { .. } => ErrorKind::Ignored,
            Self::Io { .. } => ErrorKind::Io,
            Self::BadPattern { .. } => ErrorKind::BadPattern,
        }
    }

    /// The low-level error preserved for diagnostics, if there is one.
    pub fn raw_error(&self) -> Option<String> {
        match self {
            Self::Io { source, .. } => Some(format!("{source:?}")),
            Self::BadPattern { message, .. } => Some(message.clone()),
            Self::AccessDenied { .. } | Self::Ignored { .. } => None,
        }
    }

    pub(crate) fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn denied(path: impl Into<String>, reason: DenyReason) -> Self {
        Self::AccessDenied {
            path: path.into(),
            reason,
        }
    }

    pub(crate) fn bad_pattern(pattern: impl Into<String>, message: impl ToString) -> Self {
        Self::BadPattern {
            pattern: pattern.into(),
            message: message.to_string(),
        }
    }
}
