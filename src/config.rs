use crate::error::{Error, Result};
use std::path::PathBuf;

const DEFAULT_OUTPUT: &str = "context.out";
const DEFAULT_EXCLUDES: &[&str] = &[
    ".git",
    "node_modules",
    ".venv",
    "dist",
    "build",
    "target",
    ".next",
    ".cache",
];

/// Output format of the generated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Bannered plain text
    #[default]
    Plain,
    /// Markdown sections with code blocks
    Markdown,
    /// One fenced code block per file, tagged with the file extension
    Fenced,
    /// A single JSON array of file records
    Json,
    /// One JSON record per line
    Ndjson,
}

impl OutputFormat {
    /// Returns the canonical lowercase name of this format.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Markdown => "markdown",
            Self::Fenced => "fenced",
            Self::Json => "json",
            Self::Ndjson => "ndjson",
        }
    }

    /// Returns true for the formats that emit JSON records.
    #[must_use]
    pub const fn is_structured(self) -> bool {
        matches!(self, Self::Json | Self::Ndjson)
    }

    /// Returns true if chunks are joined with `,\n` inside one JSON array.
    #[must_use]
    pub const fn joins_records(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Sort key applied to selected files before indices are assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Slash-normalized path
    #[default]
    Path,
    /// Lowercase extension, then path
    Ext,
    /// Size in bytes, then path
    Size,
    /// Modification time, then path
    Mtime,
}

/// Destination of the generated document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Standard output
    Stdout,
    /// A file, written atomically
    File(PathBuf),
}

impl OutputTarget {
    /// Parses a CLI-style output argument, where `-` means stdout.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value == "-" {
            Self::Stdout
        } else {
            Self::File(PathBuf::from(value))
        }
    }

    /// Returns true if output goes to stdout.
    #[must_use]
    pub const fn is_stdout(&self) -> bool {
        matches!(self, Self::Stdout)
    }
}

/// Per-file formatting limits consumed by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderOptions {
    /// Output format
    pub format: OutputFormat,
    /// Keep at most this many lines per file (0 = unlimited)
    pub max_lines: usize,
    /// Truncate each line to this many characters (0 = unlimited)
    pub max_cols: usize,
    /// Emit metadata only, no file content
    pub index_only: bool,
}

/// Configuration for the codectx pipeline.
///
/// Use [`Config::builder()`] to construct a new configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Directories (or files) to scan
    pub paths: Vec<PathBuf>,

    /// Maximum recursion depth relative to each root (0 = unlimited)
    pub max_depth: usize,

    /// Allowed extensions, without the leading dot (empty = all)
    pub extensions: Vec<String>,

    /// Exclusion patterns (names, path fragments or globs)
    pub excludes: Vec<String>,

    /// Inclusion substrings (empty = all)
    pub includes: Vec<String>,

    /// Skip files larger than this many bytes (0 = unlimited)
    pub max_bytes: u64,

    /// Keep at most this many lines per file (0 = unlimited)
    pub max_lines: usize,

    /// Truncate each line to this many characters (0 = unlimited)
    pub max_cols: usize,

    /// Where the document is written
    pub output: OutputTarget,

    /// Output format
    pub format: OutputFormat,

    /// Sort key for the selected files
    pub order: SortOrder,

    /// List selected files without rendering them
    pub dry_run: bool,

    /// Copy the final document to the clipboard
    pub clipboard: bool,

    /// Skip files that look like credentials or secrets
    pub skip_secrets: bool,

    /// Skip files that look binary
    pub skip_binaries: bool,

    /// Emit metadata only, no file content
    pub index_only: bool,

    /// Worker pool size (0 = auto)
    pub jobs: usize,

    /// Match include/exclude patterns case-insensitively
    pub case_insensitive: bool,

    /// Maximum number of files to render (0 = unlimited)
    pub max_files: usize,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use codectx::{Config, OutputFormat};
    ///
    /// let config = Config::builder()
    ///     .path("./src")
    ///     .format(OutputFormat::Markdown)
    ///     .max_lines(200)
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No path was given
    /// - A path doesn't exist
    /// - An exclude glob is malformed
    pub fn validate(&self) -> Result<()> {
        if self.paths.is_empty() {
            return Err(Error::config("no path given; use -p <dir>"));
        }

        for path in &self.paths {
            if !path.exists() {
                return Err(Error::config(format!(
                    "Path does not exist: {}",
                    path.display()
                )));
            }
        }

        for pattern in &self.excludes {
            if is_glob(pattern) {
                globset::Glob::new(pattern.trim())
                    .map_err(|e| Error::invalid_pattern(pattern, e.to_string()))?;
            }
        }

        if self.clipboard && self.output.is_stdout() {
            tracing::warn!("clipboard copy is not supported with stdout output; use -o <file>");
        }

        Ok(())
    }

    /// Returns the formatting limits consumed by the renderer.
    #[must_use]
    pub const fn render_options(&self) -> RenderOptions {
        RenderOptions {
            format: self.format,
            max_lines: self.max_lines,
            max_cols: self.max_cols,
            index_only: self.index_only,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            max_depth: 0,
            extensions: Vec::new(),
            excludes: default_excludes(),
            includes: Vec::new(),
            max_bytes: 0,
            max_lines: 0,
            max_cols: 0,
            output: OutputTarget::File(PathBuf::from(DEFAULT_OUTPUT)),
            format: OutputFormat::Plain,
            order: SortOrder::Path,
            dry_run: false,
            clipboard: false,
            skip_secrets: true,
            skip_binaries: true,
            index_only: false,
            jobs: 0,
            case_insensitive: false,
            max_files: 0,
        }
    }
}

fn default_excludes() -> Vec<String> {
    DEFAULT_EXCLUDES.iter().map(|s| (*s).to_string()).collect()
}

/// Returns true if the pattern uses glob wildcards.
pub(crate) fn is_glob(pattern: &str) -> bool {
    pattern.contains(|c: char| c == '*' || c == '?')
}

/// Splits a comma-separated list, trimming blanks.
#[must_use]
pub fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    paths: Vec<PathBuf>,
    max_depth: Option<usize>,
    extensions: Vec<String>,
    excludes: Option<Vec<String>>,
    extra_excludes: Vec<String>,
    includes: Vec<String>,
    max_bytes: Option<u64>,
    max_lines: Option<usize>,
    max_cols: Option<usize>,
    output: Option<OutputTarget>,
    format: Option<OutputFormat>,
    order: Option<SortOrder>,
    dry_run: bool,
    clipboard: bool,
    skip_secrets: Option<bool>,
    skip_binaries: Option<bool>,
    index_only: bool,
    jobs: Option<usize>,
    case_insensitive: bool,
    max_files: Option<usize>,
}

impl ConfigBuilder {
    /// Adds a directory (or file) to scan. May be called repeatedly.
    #[must_use]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    /// Sets the maximum recursion depth (0 = unlimited).
    #[must_use]
    pub const fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Adds allowed extensions. Entries may be written with or without a leading dot.
    #[must_use]
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions.extend(
            extensions
                .into_iter()
                .map(Into::into)
                .map(|e| e.trim().trim_start_matches('.').to_string())
                .filter(|e| !e.is_empty()),
        );
        self
    }

    /// Replaces the exclusion list, dropping the built-in defaults.
    #[must_use]
    pub fn excludes<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    /// Appends exclusion patterns to the current list.
    #[must_use]
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.extra_excludes.push(pattern.into());
        self
    }

    /// Adds inclusion substrings.
    #[must_use]
    pub fn includes<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.includes.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Skips files larger than `bytes` (0 = unlimited).
    #[must_use]
    pub const fn max_bytes(mut self, bytes: u64) -> Self {
        self.max_bytes = Some(bytes);
        self
    }

    /// Keeps at most `lines` lines per file (0 = unlimited).
    #[must_use]
    pub const fn max_lines(mut self, lines: usize) -> Self {
        self.max_lines = Some(lines);
        self
    }

    /// Truncates each line to `cols` characters (0 = unlimited).
    #[must_use]
    pub const fn max_cols(mut self, cols: usize) -> Self {
        self.max_cols = Some(cols);
        self
    }

    /// Sets the output destination.
    #[must_use]
    pub fn output(mut self, output: OutputTarget) -> Self {
        self.output = Some(output);
        self
    }

    /// Sets the output format.
    #[must_use]
    pub const fn format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Sets the sort key.
    #[must_use]
    pub const fn order(mut self, order: SortOrder) -> Self {
        self.order = Some(order);
        self
    }

    /// Enables dry run mode (list files only).
    #[must_use]
    pub const fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Copies the final document to the clipboard.
    #[must_use]
    pub const fn clipboard(mut self, enabled: bool) -> Self {
        self.clipboard = enabled;
        self
    }

    /// Enables or disables skipping of sensitive files.
    #[must_use]
    pub const fn skip_secrets(mut self, enabled: bool) -> Self {
        self.skip_secrets = Some(enabled);
        self
    }

    /// Enables or disables skipping of binary files.
    #[must_use]
    pub const fn skip_binaries(mut self, enabled: bool) -> Self {
        self.skip_binaries = Some(enabled);
        self
    }

    /// Emits metadata only.
    #[must_use]
    pub const fn index_only(mut self, enabled: bool) -> Self {
        self.index_only = enabled;
        self
    }

    /// Sets the worker pool size (0 = auto).
    #[must_use]
    pub const fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }

    /// Matches include/exclude patterns case-insensitively.
    #[must_use]
    pub const fn case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    /// Caps the number of selected files (0 = unlimited).
    #[must_use]
    pub const fn max_files(mut self, files: usize) -> Self {
        self.max_files = Some(files);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let mut excludes = self.excludes.unwrap_or_else(default_excludes);
        excludes.extend(self.extra_excludes);

        let config = Config {
            paths: self.paths,
            max_depth: self.max_depth.unwrap_or(0),
            extensions: self.extensions,
            excludes,
            includes: self.includes,
            max_bytes: self.max_bytes.unwrap_or(0),
            max_lines: self.max_lines.unwrap_or(0),
            max_cols: self.max_cols.unwrap_or(0),
            output: self
                .output
                .unwrap_or_else(|| OutputTarget::File(PathBuf::from(DEFAULT_OUTPUT))),
            format: self.format.unwrap_or_default(),
            order: self.order.unwrap_or_default(),
            dry_run: self.dry_run,
            clipboard: self.clipboard,
            skip_secrets: self.skip_secrets.unwrap_or(true),
            skip_binaries: self.skip_binaries.unwrap_or(true),
            index_only: self.index_only,
            jobs: self.jobs.unwrap_or(0),
            case_insensitive: self.case_insensitive,
            max_files: self.max_files.unwrap_or(0),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = Config::builder().path(temp.path()).build().unwrap();

        assert_eq!(config.format, OutputFormat::Plain);
        assert_eq!(config.order, SortOrder::Path);
        assert!(config.skip_secrets);
        assert!(config.skip_binaries);
        assert!(config.excludes.iter().any(|e| e == "node_modules"));
        assert_eq!(
            config.output,
            OutputTarget::File(PathBuf::from("context.out"))
        );
    }

    #[test]
    fn test_missing_paths() {
        let result = Config::builder().build();
        assert!(result.unwrap_err().is_config());
    }

    #[test]
    fn test_invalid_path() {
        let result = Config::builder()
            .path("/nonexistent/path/that/should/not/exist")
            .build();

        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_exclude_glob() {
        let temp = assert_fs::TempDir::new().unwrap();
        let result = Config::builder().path(temp.path()).exclude("[*.rs").build();

        assert!(matches!(result, Err(Error::InvalidPattern { .. })));
    }

    #[test]
    fn test_extensions_are_normalized() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = Config::builder()
            .path(temp.path())
            .extensions([".rs", " toml ", ""])
            .build()
            .unwrap();

        assert_eq!(config.extensions, vec!["rs", "toml"]);
    }

    #[test]
    fn test_excludes_replace_and_extend() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = Config::builder()
            .path(temp.path())
            .excludes(["vendor"])
            .exclude("*.lock")
            .build()
            .unwrap();

        assert_eq!(config.excludes, vec!["vendor", "*.lock"]);
    }

    #[test]
    fn test_output_target_parse() {
        assert_eq!(OutputTarget::parse("-"), OutputTarget::Stdout);
        assert_eq!(
            OutputTarget::parse("out.md"),
            OutputTarget::File(PathBuf::from("out.md"))
        );
    }

    #[test]
    fn test_split_csv() {
        assert_eq!(split_csv("rs, toml,,md "), vec!["rs", "toml", "md"]);
        assert!(split_csv("  ").is_empty());
    }

    #[test]
    fn test_render_options() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = Config::builder()
            .path(temp.path())
            .format(OutputFormat::Json)
            .max_lines(10)
            .max_cols(80)
            .index_only(true)
            .build()
            .unwrap();

        let opts = config.render_options();
        assert_eq!(opts.format, OutputFormat::Json);
        assert_eq!(opts.max_lines, 10);
        assert_eq!(opts.max_cols, 80);
        assert!(opts.index_only);
        assert!(opts.format.is_structured());
        assert!(opts.format.joins_records());
        assert!(OutputFormat::Ndjson.is_structured());
        assert!(!OutputFormat::Ndjson.joins_records());
        assert!(!OutputFormat::Markdown.is_structured());
    }
}
