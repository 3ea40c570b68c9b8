//! File search and discovery module.
//!
//! Provides the regex and glob searches plus the JSON tools for all five
//! query operations.

pub mod glob_files;
pub mod list_files;
pub mod read_file;
pub mod search_files;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{GlobBuilder, GlobMatcher};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::error::QueryError;
use crate::file::access::QueryEngine;
use crate::file::ignore::RuleSet;
use crate::file::resolver::to_slash;
use crate::tools::r#trait::SharedTool;

use glob_files::GlobFilesTool;
use list_files::ListFilesTool;
use read_file::{ReadFileLinesTool, ReadFileTool};
use search_files::SearchFilesTool;

/// Glob used when a search does not restrict file names.
pub const DEFAULT_FILE_PATTERN: &str = "**/*";

/// One matching line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMatch {
    /// Root-relative path of the file.
    pub file: String,
    /// 1-based line number.
    pub line: usize,
    /// The line with surrounding whitespace trimmed.
    pub content: String,
}

/// A file produced by glob expansion.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub path: PathBuf,
    pub relative: String,
}

/// Module providing the file query tools.
///
/// Bundles:
/// - ListFilesTool: list directory entries
/// - ReadFileTool / ReadFileLinesTool: whole file or a line range
/// - SearchFilesTool: regex search across files
/// - GlobFilesTool: find files by glob
pub struct FileSearchModule {
    list_files: Arc<ListFilesTool>,
    read_file: Arc<ReadFileTool>,
    read_file_lines: Arc<ReadFileLinesTool>,
    search_files: Arc<SearchFilesTool>,
    glob_files: Arc<GlobFilesTool>,
}

impl FileSearchModule {
    pub fn new(engine: QueryEngine) -> Self {
        Self {
            list_files: Arc::new(ListFilesTool::new(engine.clone())),
            read_file: Arc::new(ReadFileTool::new(engine.clone())),
            read_file_lines: Arc::new(ReadFileLinesTool::new(engine.clone())),
            search_files: Arc::new(SearchFilesTool::new(engine.clone())),
            glob_files: Arc::new(GlobFilesTool::new(engine)),
        }
    }

    pub fn tools(&self) -> Vec<SharedTool> {
        vec![
            self.list_files.clone(),
            self.read_file.clone(),
            self.read_file_lines.clone(),
            self.search_files.clone(),
            self.glob_files.clone(),
        ]
    }
}

/// Compiles a glob the way shell globbing reads it: `*` stops at `/`, `**`
/// crosses directories.
pub(crate) fn compile_glob(pattern: &str) -> Result<GlobMatcher, QueryError> {
    let trimmed = pattern.trim();
    let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Err(QueryError::bad_pattern(pattern, "glob pattern is empty"));
    }

    GlobBuilder::new(trimmed)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| QueryError::bad_pattern(pattern, e))
}

impl QueryEngine {
    /// Files under `search_dir` whose path relative to it matches `pattern`,
    /// sorted by root-relative path.
    ///
    /// The walk honors ignore files on its own and is also pruned with the
    /// index's composed rules, which cover nested files re-rooted at the
    /// project root. Symlinks are not followed.
    pub(crate) async fn expand_glob(
        &self,
        search_dir: &Path,
        pattern: &str,
    ) -> Result<Vec<Candidate>, QueryError> {
        let matcher = compile_glob(pattern)?;
        let display = self
            .guard()
            .relative(search_dir)
            .map(|p| to_slash(&p))
            .unwrap_or_default();

        let is_dir = fs::metadata(search_dir)
            .await
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(QueryError::io(
                display,
                io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
            ));
        }

        let root = self.root().to_path_buf();
        let search_dir = search_dir.to_path_buf();
        let rules = self.ignore_index().snapshot();
        let ignore_file_name = self.settings().ignore_file_name.clone();

        tokio::task::spawn_blocking(move || {
            walk_candidates(&root, &search_dir, &matcher, rules, &ignore_file_name)
        })
        .await
        .map_err(|e| QueryError::io(display, io::Error::new(io::ErrorKind::Other, e)))
    }
}

fn walk_candidates(
    root: &Path,
    search_dir: &Path,
    matcher: &GlobMatcher,
    rules: Arc<RuleSet>,
    ignore_file_name: &str,
) -> Vec<Candidate> {
    let filter_root = root.to_path_buf();
    let filter_rules = rules.clone();

    let walker = WalkBuilder::new(search_dir)
        .hidden(true)
        .parents(false)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .require_git(false)
        .follow_links(false)
        .add_custom_ignore_filename(ignore_file_name)
        .filter_entry(move |entry| {
            let Ok(relative) = entry.path().strip_prefix(&filter_root) else {
                return false;
            };
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !filter_rules.matches(relative, is_dir)
        })
        .build();

    let mut candidates = Vec::new();
    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let path = entry.path();
        let Ok(within_search) = path.strip_prefix(search_dir) else {
            continue;
        };
        if !matcher.is_match(within_search) {
            continue;
        }

        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        if rules.matches(relative, false) {
            continue;
        }

        candidates.push(Candidate {
            path: path.to_path_buf(),
            relative: to_slash(relative),
        });
    }

    candidates.sort_by(|a, b| a.relative.cmp(&b.relative));
    candidates
}
