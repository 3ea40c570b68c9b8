use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::debug;

use crate::error::QueryError;
use crate::file::config::File;
use crate::file::ignore::{DiscoveryOptions, IgnoreIndex, RuleSet};
use crate::file::resolver::PathGuard;

/// Read-only queries over one project root.
///
/// Every operation resolves its target through the [`PathGuard`] and filters
/// through the [`IgnoreIndex`]. Cloning is cheap and clones share the index.
#[derive(Clone)]
pub struct QueryEngine {
    guard: PathGuard,
    ignore: IgnoreIndex,
    settings: Arc<File>,
}

impl QueryEngine {
    /// Creates an engine with default settings. Must be called inside a tokio
    /// runtime: ignore-file discovery starts immediately in the background.
    pub fn new(root: impl AsRef<Path>) -> anyhow::Result<Self> {
        Self::with_settings(root, File::default())
    }

    pub fn with_settings(root: impl AsRef<Path>, settings: File) -> anyhow::Result<Self> {
        let guard = PathGuard::new(root)?;
        let ignore = IgnoreIndex::spawn(
            guard.root().to_path_buf(),
            DiscoveryOptions::from(&settings),
        );
        Ok(Self {
            guard,
            ignore,
            settings: Arc::new(settings),
        })
    }

    /// Creates an engine over a pre-built rule set; no discovery is run.
    pub fn with_rules(
        root: impl AsRef<Path>,
        rules: RuleSet,
        settings: File,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            guard: PathGuard::new(root)?,
            ignore: IgnoreIndex::from_rules(rules),
            settings: Arc::new(settings),
        })
    }

    pub fn root(&self) -> &Path {
        self.guard.root()
    }

    pub fn guard(&self) -> &PathGuard {
        &self.guard
    }

    pub fn ignore_index(&self) -> &IgnoreIndex {
        &self.ignore
    }

    pub fn settings(&self) -> &File {
        &self.settings
    }

    /// Waits for ignore-file discovery to finish.
    pub async fn ready(&self) {
        self.ignore.ready().await
    }

    /// Names of the entries in `directory`, excluding ignored ones, sorted.
    pub async fn list(&self, directory: &str) -> Result<Vec<String>, QueryError> {
        self.with_deadline(directory, self.list_inner(directory))
            .await
    }

    async fn list_inner(&self, directory: &str) -> Result<Vec<String>, QueryError> {
        let dir_path = self.guard.resolve(directory).await?;
        let relative_dir = self.guard.relative(&dir_path).unwrap_or_default();
        let rules = self.ignore.snapshot();

        let mut entries = fs::read_dir(&dir_path)
            .await
            .map_err(|e| QueryError::io(directory, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| QueryError::io(directory, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if rules.matches(&relative_dir.join(&name), is_dir) {
                continue;
            }
            names.push(name);
        }

        names.sort();
        debug!(directory, entries = names.len(), "Listed directory");
        Ok(names)
    }

    /// Full text of `file_path`.
    pub async fn read_file(&self, file_path: &str) -> Result<String, QueryError> {
        self.with_deadline(file_path, self.read_inner(file_path))
            .await
    }

    /// Lines `start_line..=end_line` (1-based) of `file_path` joined with `\n`.
    /// Out-of-range bounds are clamped to the file.
    pub async fn read_file_lines(
        &self,
        file_path: &str,
        start_line: usize,
        end_line: usize,
    ) -> Result<String, QueryError> {
        let content = self.read_file(file_path).await?;
        Ok(select_lines(&content, start_line, end_line))
    }

    async fn read_inner(&self, file_path: &str) -> Result<String, QueryError> {
        // Exclusion is decided on the raw input first so known-ignored files
        // never reach the file system.
        if self.excluded_raw(file_path) {
            debug!(file_path, "Read refused by ignore rules");
            return Err(QueryError::Ignored {
                path: file_path.to_string(),
            });
        }

        let real_path = self.guard.resolve(file_path).await?;
        if let Some(relative) = self.guard.relative(&real_path) {
            if self.ignore.snapshot().matches(&relative, false) {
                debug!(file_path, "Resolved path refused by ignore rules");
                return Err(QueryError::Ignored {
                    path: file_path.to_string(),
                });
            }
        }

        fs::read_to_string(&real_path)
            .await
            .map_err(|e| QueryError::io(file_path, e))
    }

    fn excluded_raw(&self, file_path: &str) -> bool {
        self.guard
            .lexical_relative(file_path)
            .is_some_and(|relative| self.ignore.snapshot().is_excluded(relative))
    }

    /// Resolves `directory` (default: the root) for a search operation.
    pub(crate) async fn resolve_search_dir(
        &self,
        directory: Option<&str>,
    ) -> Result<PathBuf, QueryError> {
        self.guard.resolve(directory.unwrap_or(".")).await
    }

    /// Applies the configured per-operation deadline, if any.
    pub(crate) async fn with_deadline<T>(
        &self,
        target: &str,
        operation: impl Future<Output = Result<T, QueryError>>,
    ) -> Result<T, QueryError> {
        let Some(limit) = self.settings.query_timeout() else {
            return operation.await;
        };
        match tokio::time::timeout(limit, operation).await {
            Ok(result) => result,
            Err(_) => Err(QueryError::io(
                target,
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("operation exceeded {}ms", limit.as_millis()),
                ),
            )),
        }
    }
}

/// 1-based inclusive line selection, clamped to the available lines.
pub fn select_lines(content: &str, start_line: usize, end_line: usize) -> String {
    let lines: Vec<&str> = content.split('\n').collect();
    let start = start_line.max(1) - 1;
    let end = end_line.min(lines.len());
    if start >= end {
        return String::new();
    }
    lines[start..end].join("\n")
}

#[cfg(test)]
mod tests {
    use std::fs as std_fs;
    use std::path::Path;

    use tempfile::tempdir;

    use super::*;
    use crate::error::{DenyReason, ErrorKind};
    use crate::file::ignore::IgnoreRule;

    fn rules(root: &Path, lines: &[(&str, &str)]) -> RuleSet {
        let parsed = lines
            .iter()
            .filter_map(|(prefix, line)| IgnoreRule::parse(line, prefix))
            .collect();
        RuleSet::build(root, parsed)
    }

    #[test]
    fn test_select_lines() {
        let content = "one\ntwo\nthree";
        assert_eq!(select_lines(content, 1, 1), "one");
        assert_eq!(select_lines(content, 2, 4), "two\nthree");
        assert_eq!(select_lines(content, 1, 3), content);
        assert_eq!(select_lines(content, 4, 9), "");
        assert_eq!(select_lines(content, 3, 2), "");
        assert_eq!(select_lines(content, 0, 1), "one");
    }

    #[test]
    fn test_select_lines_trailing_newline() {
        // A trailing newline leaves an empty final line, as splitting does.
        assert_eq!(select_lines("a\nb\n", 2, 3), "b\n");
    }

    #[tokio::test]
    async fn test_list_filters_and_sorts() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let root = temp.path();
        std_fs::create_dir_all(root.join("src"))?;
        std_fs::create_dir_all(root.join("build"))?;
        std_fs::write(root.join("b.txt"), "b")?;
        std_fs::write(root.join("a.txt"), "a")?;
        std_fs::write(root.join("debug.log"), "log")?;

        let engine = QueryEngine::with_rules(
            root,
            rules(root, &[("", "*.log"), ("", "build/")]),
            File::default(),
        )?;
        let names = engine.list(".").await?;
        assert_eq!(names, vec!["a.txt", "b.txt", "src"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_empty_directory() -> anyhow::Result<()> {
        let temp = tempdir()?;
        std_fs::create_dir_all(temp.path().join("empty"))?;
        let engine = QueryEngine::with_rules(temp.path(), RuleSet::empty(), File::default())?;
        assert!(engine.list("empty").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_list_file_is_io_failure() -> anyhow::Result<()> {
        let temp = tempdir()?;
        std_fs::write(temp.path().join("file.txt"), "x")?;
        let engine = QueryEngine::with_rules(temp.path(), RuleSet::empty(), File::default())?;
        let err = engine.list("file.txt").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        Ok(())
    }

    #[tokio::test]
    async fn test_read_file_checks_exclusion_before_existence() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let engine = QueryEngine::with_rules(
            temp.path(),
            rules(temp.path(), &[("", "*.secret")]),
            File::default(),
        )?;

        // Missing, but excluded: the policy answer wins.
        let err = engine.read_file("missing.secret").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Ignored);

        let err = engine.read_file("missing.txt").await.unwrap_err();
        assert!(matches!(
            err,
            QueryError::AccessDenied {
                reason: DenyReason::NotFound,
                ..
            }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_read_file_verbatim() -> anyhow::Result<()> {
        let temp = tempdir()?;
        std_fs::write(temp.path().join("notes.md"), "  line one\r\nline two\n")?;
        let engine = QueryEngine::with_rules(temp.path(), RuleSet::empty(), File::default())?;
        assert_eq!(
            engine.read_file("notes.md").await?,
            "  line one\r\nline two\n"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_read_file_lines_clamps() -> anyhow::Result<()> {
        let temp = tempdir()?;
        std_fs::write(temp.path().join("three.txt"), "first\nsecond\nthird")?;
        let engine = QueryEngine::with_rules(temp.path(), RuleSet::empty(), File::default())?;
        assert_eq!(
            engine.read_file_lines("three.txt", 2, 4).await?,
            "second\nthird"
        );
        assert_eq!(engine.read_file_lines("three.txt", 10, 20).await?, "");
        Ok(())
    }

    #[tokio::test]
    async fn test_read_outside_root_denied() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let project = temp.path().join("project");
        std_fs::create_dir_all(&project)?;
        std_fs::write(temp.path().join("outside.txt"), "x")?;

        let engine = QueryEngine::with_rules(&project, RuleSet::empty(), File::default())?;
        let err = engine.read_file("../outside.txt").await.unwrap_err();
        assert!(matches!(
            err,
            QueryError::AccessDenied {
                reason: DenyReason::OutsideRoot,
                ..
            }
        ));
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_into_excluded_location_is_ignored() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let root = temp.path();
        std_fs::create_dir_all(root.join("private"))?;
        std_fs::write(root.join("private/key.txt"), "k")?;
        std::os::unix::fs::symlink(root.join("private/key.txt"), root.join("alias.txt"))?;

        let engine = QueryEngine::with_rules(
            root,
            rules(root, &[("", "private/")]),
            File::default(),
        )?;
        let err = engine.read_file("alias.txt").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Ignored);
        Ok(())
    }

    #[tokio::test]
    async fn test_deadline_leaves_fast_reads_alone() -> anyhow::Result<()> {
        let temp = tempdir()?;
        std_fs::write(temp.path().join("a.txt"), "a")?;
        let settings = File {
            query_timeout_ms: Some(60_000),
            ..File::default()
        };
        let engine = QueryEngine::with_rules(temp.path(), RuleSet::empty(), settings)?;
        assert_eq!(engine.read_file("a.txt").await?, "a");
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_deadline_is_timed_out_io() -> anyhow::Result<()> {
        let temp = tempdir()?;
        for i in 0..300 {
            std_fs::write(temp.path().join(format!("f{i}.txt")), "needle\n")?;
        }
        let settings = File {
            query_timeout_ms: Some(0),
            ..File::default()
        };
        let engine = QueryEngine::with_rules(temp.path(), RuleSet::empty(), settings)?;

        let err = engine.search_pattern("needle", None, None).await.unwrap_err();
        match err {
            QueryError::Io { path, source } => {
                assert_eq!(path, ".");
                assert_eq!(source.kind(), io::ErrorKind::TimedOut);
            }
            other => panic!("expected a timed out Io failure, got {other:?}"),
        }
        Ok(())
    }
}
