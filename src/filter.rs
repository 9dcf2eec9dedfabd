//! Inclusion policy for discovered files.
//!
//! Decides per file whether it is rendered, and why not when it isn't.

use crate::config::{is_glob, Config};
use crate::error::{Error, Result};
use crate::file::{extension_lower, is_likely_binary, to_slash};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::path::Path;

static SENSITIVE_DIRS: &[&str] = &["/.ssh/", "/.aws/", "/.azure/", "/.gnupg/", "/.secrets/"];

static SENSITIVE_SUFFIXES: &[&str] = &[
    ".pem", ".key", ".p12", ".pfx", ".asc", ".gpg", ".kdbx", ".keystore", ".jks",
];

static SENSITIVE_NAMES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [".git-credentials", ".npmrc", ".pypirc", "composer.auth.json"]
        .into_iter()
        .collect()
});

static SENSITIVE_WORDS: &[&str] = &[
    "secret", "token", "apikey", "api_key", "password", "passwd",
];

/// Why a file was left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Extension not in the allow-list
    Extension,
    /// Matched an exclude pattern
    Excluded,
    /// Looks like a credential or secret
    Sensitive,
    /// Contains NUL bytes
    Binary,
    /// Matched no include pattern
    NotIncluded,
    /// Larger than the size ceiling
    TooLarge,
}

/// Outcome of the inclusion policy for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Render the file
    Include,
    /// Leave the file out
    Skip(SkipReason),
}

/// Extension, pattern, sensitivity, binary and size filter.
#[derive(Debug, Clone)]
pub struct InclusionPolicy {
    extensions: HashSet<String>,
    exclude_globs: GlobSet,
    exclude_fragments: Vec<String>,
    exclude_names: Vec<String>,
    includes: Vec<String>,
    case_insensitive: bool,
    skip_secrets: bool,
    skip_binaries: bool,
    max_bytes: u64,
}

impl InclusionPolicy {
    /// Builds the policy from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an exclude glob is malformed.
    pub fn new(config: &Config) -> Result<Self> {
        let ci = config.case_insensitive;
        let fold = |s: &str| if ci { s.to_lowercase() } else { s.to_string() };

        let mut globs = GlobSetBuilder::new();
        let mut exclude_fragments = Vec::new();
        let mut exclude_names = Vec::new();

        for raw in &config.excludes {
            let pattern = raw.trim();
            if pattern.is_empty() {
                continue;
            }
            if is_glob(pattern) {
                let anchored = if pattern.starts_with("**") {
                    pattern.to_string()
                } else {
                    format!("**/{}", pattern.trim_start_matches('/'))
                };
                let glob = GlobBuilder::new(&anchored)
                    .case_insensitive(ci)
                    .build()
                    .map_err(|e| Error::invalid_pattern(pattern, e.to_string()))?;
                globs.add(glob);
            } else if pattern.contains('/') {
                exclude_fragments.push(fold(pattern));
            } else {
                exclude_names.push(fold(pattern));
            }
        }

        let exclude_globs = globs
            .build()
            .map_err(|e| Error::config(format!("Failed to build glob set: {e}")))?;

        Ok(Self {
            extensions: config.extensions.iter().map(|e| e.to_lowercase()).collect(),
            exclude_globs,
            exclude_fragments,
            exclude_names,
            includes: config
                .includes
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(fold)
                .collect(),
            case_insensitive: ci,
            skip_secrets: config.skip_secrets,
            skip_binaries: config.skip_binaries,
            max_bytes: config.max_bytes,
        })
    }

    /// Decides whether `path` (of `size` bytes) is rendered.
    #[must_use]
    pub fn decide(&self, path: &Path, size: u64) -> Decision {
        let slashed = to_slash(path);

        if !self.extensions.is_empty() && !self.extensions.contains(&extension_lower(path)) {
            return Decision::Skip(SkipReason::Extension);
        }

        if self.is_excluded(&slashed) {
            return Decision::Skip(SkipReason::Excluded);
        }

        if self.skip_secrets && is_sensitive(&slashed) {
            return Decision::Skip(SkipReason::Sensitive);
        }

        // Unreadable files are left to fail loudly at render time.
        if self.skip_binaries && is_likely_binary(path).unwrap_or(false) {
            return Decision::Skip(SkipReason::Binary);
        }

        if !self.includes.is_empty() && !self.is_included(&slashed) {
            return Decision::Skip(SkipReason::NotIncluded);
        }

        if self.max_bytes > 0 && size > self.max_bytes {
            return Decision::Skip(SkipReason::TooLarge);
        }

        Decision::Include
    }

    /// Returns true if a directory with this base name should not be entered.
    #[must_use]
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        let name = self.fold(name);
        self.exclude_names.iter().any(|n| *n == name)
    }

    fn is_excluded(&self, slashed: &str) -> bool {
        if self.exclude_globs.is_match(slashed) {
            return true;
        }

        let haystack = self.fold(slashed);
        if self.exclude_fragments.iter().any(|f| haystack.contains(f.as_str())) {
            return true;
        }

        let segmented = format!("{haystack}/");
        self.exclude_names
            .iter()
            .any(|name| segmented.contains(&format!("/{name}/")))
    }

    fn is_included(&self, slashed: &str) -> bool {
        let haystack = self.fold(slashed);
        self.includes.iter().any(|inc| haystack.contains(inc.as_str()))
    }

    fn fold(&self, s: &str) -> String {
        if self.case_insensitive {
            s.to_lowercase()
        } else {
            s.to_string()
        }
    }
}

/// Heuristic check for credential-like files.
#[must_use]
pub(crate) fn is_sensitive(slashed: &str) -> bool {
    if SENSITIVE_DIRS.iter().any(|d| slashed.contains(d)) {
        return true;
    }

    let base = slashed.rsplit('/').next().unwrap_or(slashed);
    if base == ".env" || base.starts_with(".env.") {
        return true;
    }

    let low_base = base.to_lowercase();
    if SENSITIVE_SUFFIXES.iter().any(|s| low_base.ends_with(s)) {
        return true;
    }

    if SENSITIVE_NAMES.contains(base) {
        return true;
    }

    let lowered = slashed.to_lowercase();
    SENSITIVE_WORDS.iter().any(|w| lowered.contains(w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn policy(builder: crate::config::ConfigBuilder) -> InclusionPolicy {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = builder.path(temp.path()).build().unwrap();
        InclusionPolicy::new(&config).unwrap()
    }

    #[test]
    fn test_extension_include_exclude() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.go").write_str("package x\n").unwrap();
        temp.child("node_modules/x.js").write_str("alert(1)\n").unwrap();
        temp.child("z.md").write_str("# x\n").unwrap();

        let policy = policy(Config::builder().extensions(["go", "md", "js"]));

        assert_eq!(policy.decide(&temp.path().join("a.go"), 10), Decision::Include);
        assert_eq!(
            policy.decide(&temp.path().join("node_modules/x.js"), 9),
            Decision::Skip(SkipReason::Excluded)
        );
        assert_eq!(policy.decide(&temp.path().join("z.md"), 4), Decision::Include);
    }

    #[test]
    fn test_extension_filter_rejects_missing_extension() {
        let policy = policy(Config::builder().extensions(["rs"]));
        assert_eq!(
            policy.decide(Path::new("/x/Makefile"), 1),
            Decision::Skip(SkipReason::Extension)
        );
    }

    #[test]
    fn test_ignore_case() {
        let p = Path::new("/x/Node_Modules/pkg/a.go");

        let excluding = policy(
            Config::builder()
                .extensions(["GO"])
                .excludes(["node_modules"])
                .case_insensitive(true),
        );
        assert_ne!(excluding.decide(p, 1), Decision::Include);

        let including = policy(
            Config::builder()
                .extensions(["GO"])
                .excludes(Vec::<String>::new())
                .includes(["PKG"])
                .case_insensitive(true),
        );
        assert_eq!(including.decide(p, 1), Decision::Include);
    }

    #[test]
    fn test_case_sensitive_by_default() {
        let policy = policy(Config::builder().excludes(["node_modules"]));
        assert_eq!(policy.decide(Path::new("/x/Node_Modules/a.go"), 1), Decision::Include);
    }

    #[test]
    fn test_exclude_name_matches_whole_segment() {
        let policy = policy(Config::builder().excludes(["build"]));
        assert_ne!(policy.decide(Path::new("/p/build/out.rs"), 1), Decision::Include);
        assert_eq!(policy.decide(Path::new("/p/builder/out.rs"), 1), Decision::Include);
    }

    #[test]
    fn test_exclude_fragment_and_glob() {
        let policy = policy(Config::builder().excludes(["src/gen", "*.lock"]));
        assert_ne!(policy.decide(Path::new("/p/src/generated.rs"), 1), Decision::Include);
        assert_ne!(policy.decide(Path::new("/p/Cargo.lock"), 1), Decision::Include);
        assert_eq!(policy.decide(Path::new("/p/src/main.rs"), 1), Decision::Include);
    }

    #[test]
    fn test_secrets_and_binary() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(".env").write_str("SECRET=1\n").unwrap();
        temp.child("bin.dat").write_binary(&[0, 1, 2, 3]).unwrap();

        let policy = policy(Config::builder().excludes(Vec::<String>::new()));

        assert_eq!(
            policy.decide(&temp.path().join(".env"), 9),
            Decision::Skip(SkipReason::Sensitive)
        );
        assert_eq!(
            policy.decide(&temp.path().join("bin.dat"), 4),
            Decision::Skip(SkipReason::Binary)
        );
    }

    #[test]
    fn test_secrets_and_binaries_allowed_when_disabled() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("bin.dat").write_binary(&[0, 1, 2, 3]).unwrap();

        let policy = policy(
            Config::builder()
                .skip_secrets(false)
                .skip_binaries(false),
        );

        assert_eq!(policy.decide(Path::new("/p/.env"), 1), Decision::Include);
        assert_eq!(policy.decide(&temp.path().join("bin.dat"), 4), Decision::Include);
    }

    #[test]
    fn test_max_bytes_and_includes() {
        let policy = policy(Config::builder().max_bytes(100).includes(["src/"]));

        assert_eq!(policy.decide(Path::new("/p/src/main.py"), 2), Decision::Include);
        assert_eq!(
            policy.decide(Path::new("/p/big.txt"), 1024),
            Decision::Skip(SkipReason::NotIncluded)
        );
        assert_eq!(
            policy.decide(Path::new("/p/src/big.txt"), 1024),
            Decision::Skip(SkipReason::TooLarge)
        );
    }

    #[test]
    fn test_is_sensitive() {
        assert!(is_sensitive("/home/u/.ssh/id_rsa"));
        assert!(is_sensitive("/p/.env.local"));
        assert!(is_sensitive("/p/certs/server.PEM"));
        assert!(is_sensitive("/p/.npmrc"));
        assert!(is_sensitive("/p/config/api_key.txt"));
        assert!(!is_sensitive("/p/src/main.rs"));
        assert!(!is_sensitive("/p/environment.rs"));
    }

    #[test]
    fn test_is_excluded_dir() {
        let policy = policy(Config::builder().case_insensitive(true));
        assert!(policy.is_excluded_dir("Node_Modules"));
        assert!(policy.is_excluded_dir(".git"));
        assert!(!policy.is_excluded_dir("src"));
    }
}
