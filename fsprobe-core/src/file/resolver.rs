use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{DenyReason, QueryError};

/// Confines every caller-supplied path to a single project root.
///
/// The root is canonicalized once at construction and never changes. Every
/// query goes through [`PathGuard::resolve`] before touching the file system.
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    pub fn new(root: impl AsRef<Path>) -> anyhow::Result<Self> {
        let root = root.as_ref();
        let canonical = root
            .canonicalize()
            .with_context(|| format!("Failed to resolve project root: {}", root.display()))?;
        if !canonical.is_dir() {
            bail!("Project root is not a directory: {}", canonical.display());
        }
        Ok(Self { root: canonical })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Joins a caller path onto the root without touching the file system.
    ///
    /// Callers sometimes hand back the real absolute path they were shown; that
    /// is accepted as-is. Any other leading `/` is treated as the project root.
    pub fn join(&self, candidate: &str) -> PathBuf {
        let path = Path::new(candidate);
        if path.is_absolute() && path.starts_with(&self.root) {
            return path.to_path_buf();
        }
        self.root.join(candidate.trim_start_matches('/'))
    }

    /// Root-relative form of `candidate` with `.` and `..` resolved lexically.
    /// `None` when the path climbs out of the root.
    pub fn lexical_relative(&self, candidate: &str) -> Option<PathBuf> {
        let joined = normalize(&self.join(candidate))?;
        joined.strip_prefix(&self.root).ok().map(Path::to_path_buf)
    }

    /// Resolves `candidate` to a canonical path that exists and lies at or
    /// beneath the root.
    pub async fn resolve(&self, candidate: &str) -> Result<PathBuf, QueryError> {
        let joined = self.join(candidate);
        let lexically_inside = normalize(&joined).is_some_and(|p| is_contained(&self.root, &p));
        if !lexically_inside {
            warn!(path = candidate, "Rejected path outside project root");
            return Err(QueryError::denied(candidate, DenyReason::OutsideRoot));
        }

        let real = match fs::canonicalize(&joined).await {
            Ok(real) => real,
            Err(e) => {
                debug!(path = candidate, error = %e, "Path does not resolve");
                return Err(QueryError::denied(candidate, DenyReason::NotFound));
            }
        };

        if !is_contained(&self.root, &real) {
            warn!(
                path = candidate,
                resolved = %real.display(),
                "Rejected path resolving outside project root"
            );
            return Err(QueryError::denied(candidate, DenyReason::OutsideRoot));
        }

        Ok(real)
    }

    /// Converts a canonical path under the root to its root-relative form.
    pub fn relative(&self, real: &Path) -> Option<PathBuf> {
        real.strip_prefix(&self.root).ok().map(Path::to_path_buf)
    }
}

/// True when `candidate` exists and, once symlinks are resolved, is `root` or a
/// descendant of it. Relative candidates are taken relative to `root`.
pub async fn validate(root: &Path, candidate: &Path) -> bool {
    let Ok(root) = fs::canonicalize(root).await else {
        return false;
    };
    let Ok(candidate) = fs::canonicalize(root.join(candidate)).await else {
        return false;
    };
    is_contained(&root, &candidate)
}

/// Component-wise containment. `Path::starts_with` never matches a partial
/// component, so `/srv/app2` is not inside `/srv/app`.
pub fn is_contained(root: &Path, candidate: &Path) -> bool {
    candidate.starts_with(root)
}

/// Lexically resolves `.` and `..`. Returns `None` if `..` would climb above
/// the first component.
pub(crate) fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    return None;
                }
                out.pop();
            }
            other => out.push(other),
        }
    }
    Some(out)
}

/// Renders a relative path with `/` separators, the form used in every result.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
