use crate::{
    config::{Config, SortOrder},
    coordinator::CancelToken,
    error::{Error, Result},
    file::{to_slash, FileMeta},
    filter::{Decision, InclusionPolicy, SkipReason},
};
use ignore::WalkBuilder;
use std::{
    cmp::Ordering,
    collections::HashSet,
    path::{Path, PathBuf},
};
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

/// Aggregate counters collected during selection.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SelectionCounters {
    /// Files skipped because they look binary
    pub skipped_binary: usize,

    /// Files skipped because they look like secrets
    pub skipped_secret: usize,

    /// Sum of sizes of every discovered candidate, before filtering
    pub total_bytes: u64,
}

/// Ordered, indexed result of file selection.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Selected files, sorted, with dense indices `0..len`
    pub files: Vec<FileMeta>,

    /// Skip and size counters
    pub counters: SelectionCounters,

    /// True if the file ceiling cut the selection short
    pub truncated: bool,

    limit: usize,
}

impl Selection {
    /// Returns the non-fatal truncation signal, if the ceiling was hit.
    #[must_use]
    pub fn truncation(&self) -> Option<Error> {
        self.truncated.then(|| Error::SelectionTruncated {
            limit: self.limit,
            kept: self.files.len(),
        })
    }

    /// Returns true if no file was selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Discovers, filters, orders and indexes the files to render.
pub struct Scanner {
    roots: Vec<PathBuf>,
    max_depth: usize,
    order: SortOrder,
    max_files: usize,
    policy: InclusionPolicy,
}

impl Scanner {
    /// Creates a new scanner from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a root cannot be made absolute or an exclude
    /// pattern is malformed.
    pub fn new(config: &Config) -> Result<Self> {
        let roots = config
            .paths
            .iter()
            .map(|p| std::path::absolute(p).map_err(|e| Error::io(p, e)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            roots,
            max_depth: config.max_depth,
            order: config.order,
            max_files: config.max_files,
            policy: InclusionPolicy::new(config)?,
        })
    }

    /// Selects the files to render.
    ///
    /// Hitting the file ceiling is not an error; see [`Selection::truncation`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `cancel` fires during discovery.
    pub fn select(&self, cancel: &CancelToken) -> Result<Selection> {
        let mut seen = HashSet::new();
        let mut counters = SelectionCounters::default();
        let mut files = Vec::new();

        for root in &self.roots {
            let candidates = if is_git_work_tree(root) {
                debug!("git-aware listing in {}", root.display());
                self.list_git_aware(root, cancel)?
            } else {
                self.list_plain(root, cancel)?
            };

            for path in candidates {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                if !seen.insert(path.clone()) {
                    continue;
                }

                let meta = match FileMeta::from_path(path, 0) {
                    Ok(meta) => meta,
                    Err(e) => {
                        warn!("Skipping unreadable candidate: {}", e);
                        continue;
                    }
                };
                counters.total_bytes += meta.size;

                match self.policy.decide(&meta.path, meta.size) {
                    Decision::Include => files.push(meta),
                    Decision::Skip(reason) => {
                        trace!("Skipping {} ({:?})", meta.path.display(), reason);
                        match reason {
                            SkipReason::Binary => counters.skipped_binary += 1,
                            SkipReason::Sensitive => counters.skipped_secret += 1,
                            _ => {}
                        }
                    }
                }
            }
        }

        sort_files(&mut files, self.order);

        let truncated = self.max_files > 0 && files.len() > self.max_files;
        if truncated {
            files.truncate(self.max_files);
        }

        for (i, meta) in files.iter_mut().enumerate() {
            meta.index = i;
        }

        debug!(
            "Selected {} files ({} binary skipped, {} sensitive skipped, {} bytes scanned)",
            files.len(),
            counters.skipped_binary,
            counters.skipped_secret,
            counters.total_bytes
        );

        Ok(Selection {
            files,
            counters,
            truncated,
            limit: self.max_files,
        })
    }

    /// Lists regular files honouring `.gitignore` and git excludes.
    fn list_git_aware(&self, root: &Path, cancel: &CancelToken) -> Result<Vec<PathBuf>> {
        let policy = self.policy.clone();
        let walker = WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .parents(true)
            .follow_links(false)
            .max_depth(self.depth_limit())
            .filter_entry(move |entry| {
                entry.depth() == 0
                    || !entry.file_type().is_some_and(|ft| ft.is_dir())
                    || !is_pruned_dir(&policy, &entry.file_name().to_string_lossy())
            })
            .build();

        let mut out = Vec::new();
        for result in walker {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match result {
                Ok(entry) if entry.file_type().is_some_and(|ft| ft.is_file()) => {
                    out.push(entry.into_path());
                }
                Ok(_) => {}
                Err(e) => warn!("Walk error: {}", e),
            }
        }
        Ok(out)
    }

    /// Lists regular files with a plain recursive walk.
    fn list_plain(&self, root: &Path, cancel: &CancelToken) -> Result<Vec<PathBuf>> {
        let mut walker = WalkDir::new(root).follow_links(false);
        if let Some(depth) = self.depth_limit() {
            walker = walker.max_depth(depth);
        }

        let mut out = Vec::new();
        let entries = walker.into_iter().filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !is_pruned_dir(&self.policy, &entry.file_name().to_string_lossy())
        });

        for result in entries {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match result {
                Ok(entry) if entry.file_type().is_file() => out.push(entry.into_path()),
                Ok(_) => {}
                Err(e) => warn!("Walk error: {}", e),
            }
        }
        Ok(out)
    }

    fn depth_limit(&self) -> Option<usize> {
        (self.max_depth > 0).then_some(self.max_depth)
    }
}

fn is_pruned_dir(policy: &InclusionPolicy, name: &str) -> bool {
    name == ".git" || policy.is_excluded_dir(name)
}

/// Returns true if `path` or one of its ancestors holds a `.git` entry.
fn is_git_work_tree(path: &Path) -> bool {
    path.ancestors().any(|dir| dir.join(".git").exists())
}

/// Sorts by the configured key, breaking ties by slash-normalized path.
fn sort_files(files: &mut [FileMeta], order: SortOrder) {
    files.sort_by(|a, b| {
        let primary = match order {
            SortOrder::Path => Ordering::Equal,
            SortOrder::Ext => a.ext.cmp(&b.ext),
            SortOrder::Size => a.size.cmp(&b.size),
            SortOrder::Mtime => a.mtime.cmp(&b.mtime),
        };
        primary.then_with(|| to_slash(&a.path).cmp(&to_slash(&b.path)))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use assert_fs::prelude::*;

    fn select(builder: ConfigBuilder) -> Selection {
        let config = builder.build().unwrap();
        Scanner::new(&config)
            .unwrap()
            .select(&CancelToken::new())
            .unwrap()
    }

    fn names(selection: &Selection) -> Vec<String> {
        selection
            .files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_scanner_finds_files_in_path_order() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("b.rs").write_str("fn b() {}").unwrap();
        temp.child("a.rs").write_str("fn a() {}").unwrap();
        temp.child("src/c.rs").write_str("fn c() {}").unwrap();

        let selection = select(Config::builder().path(temp.path()));

        assert_eq!(names(&selection), ["a.rs", "b.rs", "c.rs"]);
        assert!(selection.files.iter().all(|f| f.path.is_absolute()));
        assert!(!selection.truncated);
        assert!(selection.truncation().is_none());
    }

    #[test]
    fn test_indices_are_dense() {
        let temp = assert_fs::TempDir::new().unwrap();
        for name in ["x.go", "y.go", "z.go", "w.go"] {
            temp.child(name).write_str("package p\n").unwrap();
        }

        let selection = select(Config::builder().path(temp.path()));
        let indices: Vec<usize> = selection.files.iter().map(|f| f.index).collect();
        assert_eq!(indices, [0, 1, 2, 3]);
    }

    #[test]
    fn test_depth_limit() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("top.go").write_str("x").unwrap();
        temp.child("a/mid.go").write_str("x").unwrap();
        temp.child("a/b/deep.go").write_str("x").unwrap();

        let one = select(Config::builder().path(temp.path()).max_depth(1));
        assert_eq!(names(&one), ["top.go"]);

        let two = select(Config::builder().path(temp.path()).max_depth(2));
        assert_eq!(names(&two), ["mid.go", "top.go"]);

        let all = select(Config::builder().path(temp.path()));
        assert_eq!(all.files.len(), 3);
    }

    #[test]
    fn test_excluded_dirs_are_pruned() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("main.js").write_str("x").unwrap();
        temp.child("node_modules/dep/index.js").write_str("x").unwrap();
        temp.child("target/debug/out.js").write_str("x").unwrap();

        let selection = select(Config::builder().path(temp.path()));
        assert_eq!(names(&selection), ["main.js"]);
    }

    #[test]
    fn test_max_files_truncates() {
        let temp = assert_fs::TempDir::new().unwrap();
        for i in 0..5 {
            temp.child(format!("f{i}.txt")).write_str("x").unwrap();
        }

        let selection = select(Config::builder().path(temp.path()).max_files(2));

        assert_eq!(names(&selection), ["f0.txt", "f1.txt"]);
        assert!(selection.truncated);
        match selection.truncation() {
            Some(Error::SelectionTruncated { limit, kept }) => {
                assert_eq!(limit, 2);
                assert_eq!(kept, 2);
            }
            other => panic!("unexpected truncation signal: {other:?}"),
        }
    }

    #[test]
    fn test_max_files_not_hit() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("only.txt").write_str("x").unwrap();

        let selection = select(Config::builder().path(temp.path()).max_files(1));
        assert!(!selection.truncated);
    }

    #[test]
    fn test_order_by_size_and_ext() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.zz").write_str("xxxxx").unwrap();
        temp.child("b.aa").write_str("xxx").unwrap();
        temp.child("c.mm").write_str("x").unwrap();
        temp.child("d.mm").write_str("x").unwrap();

        let by_size = select(Config::builder().path(temp.path()).order(SortOrder::Size));
        assert_eq!(names(&by_size), ["c.mm", "d.mm", "b.aa", "a.zz"]);

        let by_ext = select(Config::builder().path(temp.path()).order(SortOrder::Ext));
        assert_eq!(names(&by_ext), ["b.aa", "c.mm", "d.mm", "a.zz"]);
    }

    #[test]
    fn test_counters() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("main.go").write_str("package main\n").unwrap();
        temp.child("blob.bin").write_binary(&[1, 0, 2, 0]).unwrap();
        temp.child(".env").write_str("A=1\n").unwrap();
        temp.child("notes.md").write_str("# n\n").unwrap();

        let selection = select(Config::builder().path(temp.path()).extensions(["go", "bin", "env"]));

        assert_eq!(names(&selection), ["main.go"]);
        assert_eq!(selection.counters.skipped_binary, 1);
        assert_eq!(selection.counters.skipped_secret, 0);
        assert_eq!(selection.counters.total_bytes, 13 + 4 + 4 + 4);

        let open = select(Config::builder().path(temp.path()));
        assert_eq!(open.counters.skipped_binary, 1);
        assert_eq!(open.counters.skipped_secret, 1);
        assert_eq!(names(&open), ["main.go", "notes.md"]);
    }

    #[test]
    fn test_overlapping_roots_are_deduplicated() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("src/lib.rs").write_str("x").unwrap();
        temp.child("README.md").write_str("x").unwrap();

        let selection = select(
            Config::builder()
                .path(temp.path())
                .path(temp.path().join("src")),
        );
        assert_eq!(names(&selection), ["README.md", "lib.rs"]);
    }

    #[test]
    fn test_single_file_root() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("one.rs");
        file.write_str("fn one() {}").unwrap();

        let selection = select(Config::builder().path(file.path()));
        assert_eq!(names(&selection), ["one.rs"]);
    }

    #[test]
    fn test_empty_selection_is_ok() {
        let temp = assert_fs::TempDir::new().unwrap();
        let selection = select(Config::builder().path(temp.path()));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_scanner_respects_gitignore() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(".git").create_dir_all().unwrap();
        temp.child(".gitignore").write_str("ignored.rs\n").unwrap();
        temp.child("included.rs").write_str("fn main() {}").unwrap();
        temp.child("ignored.rs").write_str("fn test() {}").unwrap();

        let selection = select(Config::builder().path(temp.path()));
        let names = names(&selection);

        assert!(names.contains(&"included.rs".to_string()));
        assert!(!names.contains(&"ignored.rs".to_string()));
    }

    #[test]
    fn test_cancelled_selection() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.txt").write_str("x").unwrap();
        let config = Config::builder().path(temp.path()).build().unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = Scanner::new(&config).unwrap().select(&cancel).unwrap_err();
        assert!(err.is_cancelled());
    }
}
