use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tokio::fs;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::file::config::File;
use crate::file::resolver::{normalize, to_slash};

/// One line of an ignore file, re-rooted at the directory that declared it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreRule {
    /// Glob pattern without the leading `!`, already prefixed with `prefix`.
    pub pattern: String,
    /// A negated rule re-includes paths excluded by earlier rules.
    pub negated: bool,
    /// Root-relative directory of the declaring ignore file (`""` for the root).
    pub prefix: String,
}

impl IgnoreRule {
    /// Parses a single ignore-file line. Blank lines and comments yield `None`.
    pub fn parse(line: &str, prefix: &str) -> Option<Self> {
        if line.trim().is_empty() || line.starts_with('#') {
            return None;
        }

        let (negated, body) = match line.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, line),
        };

        let pattern = if prefix.is_empty() {
            body.to_string()
        } else {
            format!("{prefix}/{}", body.trim_start_matches('/'))
        };

        Some(Self {
            pattern,
            negated,
            prefix: prefix.to_string(),
        })
    }

    /// The rule rendered back as an ignore-file line.
    pub fn to_line(&self) -> String {
        if self.negated {
            format!("!{}", self.pattern)
        } else {
            self.pattern.clone()
        }
    }
}

/// An immutable, compiled set of ignore rules. Later rules override earlier
/// ones, so a negation declared after an exclusion re-includes the path.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<IgnoreRule>,
    matcher: Gitignore,
}

impl RuleSet {
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            matcher: Gitignore::empty(),
        }
    }

    /// Compiles `rules` in order. Lines that fail to parse as globs are dropped.
    pub fn build(root: &Path, rules: Vec<IgnoreRule>) -> Self {
        let mut builder = GitignoreBuilder::new(root);
        for rule in &rules {
            if let Err(e) = builder.add_line(None, &rule.to_line()) {
                debug!(pattern = %rule.pattern, error = %e, "Skipping malformed ignore rule");
            }
        }

        let matcher = match builder.build() {
            Ok(matcher) => matcher,
            Err(e) => {
                warn!(error = %e, "Failed to compile ignore rules");
                Gitignore::empty()
            }
        };

        Self { rules, matcher }
    }

    pub fn rules(&self) -> &[IgnoreRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether the root-relative `path` is excluded, treating it as a file.
    /// A trailing `/` marks the path as a directory.
    pub fn is_excluded(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let is_dir = path.as_os_str().to_string_lossy().ends_with('/');
        self.matches(path, is_dir)
    }

    /// Whether the root-relative `path` is excluded. A path is also excluded
    /// when any of its parent directories is.
    pub fn matches(&self, path: &Path, is_dir: bool) -> bool {
        if self.rules.is_empty() {
            return false;
        }
        // Paths that climb out of the root are not ours to judge; the guard
        // rejects them.
        let Some(path) = normalize(path) else {
            return false;
        };
        if path.as_os_str().is_empty() || path.has_root() {
            return false;
        }
        self.matcher
            .matched_path_or_any_parents(&path, is_dir)
            .is_ignore()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::empty()
    }
}

/// Knobs for the discovery walk.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub ignore_file_name: String,
    pub pruned_directories: Vec<String>,
}

impl From<&File> for DiscoveryOptions {
    fn from(settings: &File) -> Self {
        Self {
            ignore_file_name: settings.ignore_file_name.clone(),
            pruned_directories: settings.pruned_directories.clone(),
        }
    }
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self::from(&File::default())
    }
}

/// Finds every ignore file under `root` and composes their rules.
///
/// Discovery is best effort: unreadable directories and files are skipped.
pub async fn discover(root: &Path, options: &DiscoveryOptions) -> RuleSet {
    discover_with(root, options, |_| {}).await
}

/// Like [`discover`], calling `on_progress` with the rule set accumulated so far
/// after each directory level that contributed rules. The matcher is compiled
/// once per such level rather than once per ignore file.
pub async fn discover_with(
    root: &Path,
    options: &DiscoveryOptions,
    mut on_progress: impl FnMut(RuleSet),
) -> RuleSet {
    let mut rules = Vec::new();
    let mut current = RuleSet::empty();

    // Breadth-first so an ancestor's rules always precede a descendant's and
    // the deeper file wins on conflict.
    let mut level = vec![root.to_path_buf()];
    let mut depth = 0;
    while !level.is_empty() {
        let mut next_level = Vec::new();
        let before_level = rules.len();

        for dir in level {
            let (ignore_file, subdirs) = match scan_directory(&dir, options).await {
                Ok(found) => found,
                Err(e) => {
                    debug!(dir = %dir.display(), error = %e, "Skipping unreadable directory");
                    continue;
                }
            };
            next_level.extend(subdirs);

            let Some(ignore_file) = ignore_file else {
                continue;
            };

            let content = match fs::read_to_string(&ignore_file).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(file = %ignore_file.display(), error = %e, "Skipping unreadable ignore file");
                    continue;
                }
            };

            let prefix = dir.strip_prefix(root).map(to_slash).unwrap_or_default();
            let before = rules.len();
            rules.extend(content.lines().filter_map(|line| IgnoreRule::parse(line, &prefix)));
            debug!(
                file = %ignore_file.display(),
                rules = rules.len() - before,
                "Loaded ignore file"
            );
        }

        if rules.len() > before_level {
            debug!(depth, rules = rules.len(), "Publishing ignore rules");
            current = RuleSet::build(root, rules.clone());
            on_progress(current.clone());
        }

        level = next_level;
        depth += 1;
    }

    current
}

/// Lists one directory: the ignore file it holds, if any, and the
/// subdirectories discovery should descend into (sorted by name).
async fn scan_directory(
    dir: &Path,
    options: &DiscoveryOptions,
) -> std::io::Result<(Option<PathBuf>, Vec<PathBuf>)> {
    let mut entries = fs::read_dir(dir).await?;
    let mut ignore_file = None;
    let mut subdirs = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let Ok(file_type) = entry.file_type().await else {
            continue;
        };
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if file_type.is_file() && name == options.ignore_file_name.as_str() {
            ignore_file = Some(entry.path());
        } else if file_type.is_dir()
            && !name.starts_with('.')
            && !options.pruned_directories.iter().any(|p| p.as_str() == name)
        {
            subdirs.push(entry.path());
        }
    }

    subdirs.sort();
    Ok((ignore_file, subdirs))
}

#[derive(Clone)]
struct Snapshot {
    rules: Arc<RuleSet>,
    complete: bool,
}

/// Session-owned view of the project's ignore rules.
///
/// Discovery runs in the background from construction; until it finishes,
/// readers see whatever rules have been loaded so far.
#[derive(Clone)]
pub struct IgnoreIndex {
    state: watch::Receiver<Snapshot>,
}

impl IgnoreIndex {
    /// Starts discovery under `root` on the current tokio runtime.
    pub fn spawn(root: PathBuf, options: DiscoveryOptions) -> Self {
        let (tx, rx) = watch::channel(Snapshot {
            rules: Arc::new(RuleSet::empty()),
            complete: false,
        });

        tokio::spawn(async move {
            let rules = discover_with(&root, &options, |partial| {
                tx.send_replace(Snapshot {
                    rules: Arc::new(partial),
                    complete: false,
                });
            })
            .await;

            info!(
                root = %root.display(),
                rules = rules.len(),
                "Ignore rule discovery complete"
            );
            tx.send_replace(Snapshot {
                rules: Arc::new(rules),
                complete: true,
            });
        });

        Self { state: rx }
    }

    /// An index over an already-built rule set; it is ready immediately.
    pub fn from_rules(rules: RuleSet) -> Self {
        let (_tx, rx) = watch::channel(Snapshot {
            rules: Arc::new(rules),
            complete: true,
        });
        Self { state: rx }
    }

    /// The latest published rule set.
    pub fn snapshot(&self) -> Arc<RuleSet> {
        self.state.borrow().rules.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.state.borrow().complete
    }

    /// Waits until discovery has finished.
    pub async fn ready(&self) {
        let mut state = self.state.clone();
        // An error means discovery died early; the partial rules stay in effect.
        let _ = state.wait_for(|snapshot| snapshot.complete).await;
    }

    pub fn is_excluded(&self, path: impl AsRef<Path>) -> bool {
        self.snapshot().is_excluded(path)
    }
}

#[cfg(test)]
mod tests {
    use std::fs as std_fs;

    use tempfile::tempdir;

    use super::*;

    fn rules(lines: &[(&str, &str)]) -> RuleSet {
        let parsed = lines
            .iter()
            .filter_map(|(prefix, line)| IgnoreRule::parse(line, prefix))
            .collect();
        RuleSet::build(Path::new("/project"), parsed)
    }

    #[test]
    fn test_parse_skips_blank_and_comments() {
        assert_eq!(IgnoreRule::parse("", ""), None);
        assert_eq!(IgnoreRule::parse("   ", "sub"), None);
        assert_eq!(IgnoreRule::parse("# comment", "sub"), None);
    }

    #[test]
    fn test_parse_root_rules_verbatim() {
        let rule = IgnoreRule::parse("/build/", "").unwrap();
        assert_eq!(rule.pattern, "/build/");
        assert!(!rule.negated);
        assert_eq!(rule.to_line(), "/build/");
    }

    #[test]
    fn test_parse_nested_rules_prefixed() {
        let rule = IgnoreRule::parse("*.tmp", "sub/dir").unwrap();
        assert_eq!(rule.pattern, "sub/dir/*.tmp");
        assert_eq!(rule.prefix, "sub/dir");

        let anchored = IgnoreRule::parse("/out", "sub").unwrap();
        assert_eq!(anchored.pattern, "sub/out");

        let negated = IgnoreRule::parse("!keep.log", "sub").unwrap();
        assert!(negated.negated);
        assert_eq!(negated.pattern, "sub/keep.log");
        assert_eq!(negated.to_line(), "!sub/keep.log");
    }

    #[test]
    fn test_negation_in_nested_file_reincludes() {
        let set = rules(&[("", "*.log"), ("sub", "!keep.log")]);
        assert!(set.is_excluded("a.log"));
        assert!(set.is_excluded("sub/other.log"));
        assert!(!set.is_excluded("sub/keep.log"));
        assert!(!set.is_excluded("sub/keep.txt"));
    }

    #[test]
    fn test_later_rule_wins() {
        let set = rules(&[("", "!important.log"), ("", "*.log")]);
        assert!(set.is_excluded("important.log"));

        let set = rules(&[("", "*.log"), ("", "!important.log")]);
        assert!(!set.is_excluded("important.log"));
    }

    #[test]
    fn test_excluded_parent_excludes_children() {
        let set = rules(&[("", "dist/")]);
        assert!(set.is_excluded("dist/bundle.js"));
        assert!(set.is_excluded("dist/nested/deep.js"));
        assert!(set.matches(Path::new("dist"), true));
        assert!(!set.matches(Path::new("dist"), false));
        assert!(set.is_excluded("dist/"));
    }

    #[test]
    fn test_double_star_patterns() {
        let set = rules(&[("", "**/generated/**"), ("lib", "**/*.snap")]);
        assert!(set.is_excluded("src/generated/a.rs"));
        assert!(set.is_excluded("lib/a/b/c.snap"));
        assert!(!set.is_excluded("src/c.snap"));
    }

    #[test]
    fn test_empty_and_escaping_paths_never_excluded() {
        let set = rules(&[("", "*")]);
        assert!(!set.is_excluded(""));
        assert!(!set.is_excluded("."));
        assert!(!set.is_excluded("../outside.txt"));
        assert!(!set.is_excluded("/abs/file"));
        assert!(set.is_excluded("./file"));
    }

    #[test]
    fn test_no_rules_excludes_nothing() {
        let set = RuleSet::empty();
        assert!(set.is_empty());
        assert!(!set.is_excluded("node_modules"));
    }

    #[tokio::test]
    async fn test_discover_nested_files() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let root = temp.path();
        std_fs::create_dir_all(root.join("sub/deeper"))?;
        std_fs::write(root.join(".gitignore"), "*.log\n# comment\n\n")?;
        std_fs::write(root.join("sub/.gitignore"), "!keep.log\n")?;
        std_fs::write(root.join("sub/deeper/.gitignore"), "*.tmp\n")?;

        let set = discover(root, &DiscoveryOptions::default()).await;
        assert_eq!(set.len(), 3);
        assert_eq!(set.rules()[0].pattern, "*.log");
        assert!(set.is_excluded("a.log"));
        assert!(set.is_excluded("sub/other.log"));
        assert!(!set.is_excluded("sub/keep.log"));
        assert!(set.is_excluded("sub/deeper/x.tmp"));
        assert!(!set.is_excluded("x.tmp"));
        Ok(())
    }

    #[tokio::test]
    async fn test_discover_prunes_hidden_and_vendor_dirs() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let root = temp.path();
        std_fs::create_dir_all(root.join(".hidden"))?;
        std_fs::create_dir_all(root.join("node_modules/pkg"))?;
        std_fs::write(root.join(".hidden/.gitignore"), "*.rs\n")?;
        std_fs::write(root.join("node_modules/pkg/.gitignore"), "*.rs\n")?;

        let set = discover(root, &DiscoveryOptions::default()).await;
        assert!(set.is_empty());
        assert!(!set.is_excluded(".hidden/a.rs"));
        Ok(())
    }

    #[tokio::test]
    async fn test_discover_custom_options() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let root = temp.path();
        std_fs::create_dir_all(root.join("vendor"))?;
        std_fs::write(root.join(".probeignore"), "*.bin\n")?;
        std_fs::write(root.join(".gitignore"), "*.txt\n")?;
        std_fs::write(root.join("vendor/.probeignore"), "*.rs\n")?;

        let options = DiscoveryOptions {
            ignore_file_name: ".probeignore".to_string(),
            pruned_directories: vec!["vendor".to_string()],
        };
        let set = discover(root, &options).await;
        assert!(set.is_excluded("a.bin"));
        assert!(!set.is_excluded("a.txt"));
        assert!(!set.is_excluded("vendor/a.rs"));
        Ok(())
    }

    #[tokio::test]
    async fn test_discover_without_ignore_files() -> anyhow::Result<()> {
        let temp = tempdir()?;
        std_fs::create_dir_all(temp.path().join("src"))?;
        let mut progress = 0;
        let set = discover_with(temp.path(), &DiscoveryOptions::default(), |_| progress += 1).await;
        assert!(set.is_empty());
        assert_eq!(progress, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_discover_reports_growing_rule_sets() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let root = temp.path();
        std_fs::create_dir_all(root.join("a/b"))?;
        std_fs::create_dir_all(root.join("c"))?;
        std_fs::write(root.join(".gitignore"), "*.log\n")?;
        std_fs::write(root.join("a/.gitignore"), "*.tmp\n")?;
        std_fs::write(root.join("c/.gitignore"), "*.bak\n")?;
        std_fs::write(root.join("a/b/.gitignore"), "!keep.tmp\n")?;

        let mut counts = Vec::new();
        let set = discover_with(root, &DiscoveryOptions::default(), |partial| {
            counts.push(partial.len())
        })
        .await;

        // One snapshot per directory level: the root, then a/ and c/, then a/b/.
        assert_eq!(counts, vec![1, 3, 4]);
        assert_eq!(set.len(), 4);
        assert!(set.is_excluded("a/x.tmp"));
        assert!(!set.is_excluded("a/b/keep.tmp"));
        Ok(())
    }

    #[tokio::test]
    async fn test_discover_single_nested_file_per_level() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let root = temp.path();
        std_fs::create_dir_all(root.join("sub"))?;
        std_fs::write(root.join(".gitignore"), "*.log\n")?;
        std_fs::write(root.join("sub/.gitignore"), "!keep.log\n")?;

        let mut counts = Vec::new();
        discover_with(root, &DiscoveryOptions::default(), |partial| {
            counts.push(partial.len())
        })
        .await;
        assert_eq!(counts, vec![1, 2]);
        Ok(())
    }

    #[tokio::test]
    async fn test_discover_missing_root_is_empty() {
        let set = discover(Path::new("/definitely/not/here"), &DiscoveryOptions::default()).await;
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_index_becomes_ready() -> anyhow::Result<()> {
        let temp = tempdir()?;
        std_fs::write(temp.path().join(".gitignore"), "secret.txt\n")?;

        let index = IgnoreIndex::spawn(temp.path().to_path_buf(), DiscoveryOptions::default());
        index.ready().await;
        assert!(index.is_ready());
        assert!(index.is_excluded("secret.txt"));
        assert!(!index.is_excluded("public.txt"));
        Ok(())
    }

    #[test]
    fn test_index_from_rules_is_ready() {
        let index = IgnoreIndex::from_rules(rules(&[("", "*.log")]));
        assert!(index.is_ready());
        assert!(index.is_excluded("a.log"));
        assert_eq!(index.snapshot().len(), 1);
    }
}
