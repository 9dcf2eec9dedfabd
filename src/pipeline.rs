use crate::{
    clipboard::Clipboard,
    config::Config,
    coordinator::{CancelToken, Coordinator},
    error::{Error, Result},
    file::FileMeta,
    frame::{DocumentFramer, FrameContext},
    logging::{Log, TracingLog},
    scanner::Scanner,
    writer::OutputSink,
};
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Statistics collected during pipeline execution.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    /// Number of files rendered (or listed, in dry-run mode)
    pub files_rendered: usize,

    /// Content bytes written, excluding framing
    pub content_bytes: u64,

    /// Files skipped because they look binary
    pub skipped_binary: usize,

    /// Files skipped because they look like secrets
    pub skipped_secret: usize,

    /// Sum of sizes of every discovered candidate
    pub total_bytes_scanned: u64,

    /// True if the file ceiling cut the selection short
    pub truncated: bool,

    /// Total execution time
    pub duration: Duration,

    /// Backend that copied the document to the clipboard, if any
    pub clipboard_source: Option<&'static str>,
}

impl PipelineStats {
    /// Prints a human-readable summary to stderr.
    ///
    /// Stderr keeps the summary out of documents written to stdout.
    pub fn print_summary(&self) {
        eprintln!("\n╔═══════════════════════════════════════════════════════╗");
        eprintln!("║              codectx Execution Summary                ║");
        eprintln!("╠═══════════════════════════════════════════════════════╣");
        eprintln!(
            "║ Files Rendered:       {:>8}                        ║",
            self.files_rendered
        );
        eprintln!(
            "║ Content Bytes:        {:>12}                    ║",
            self.content_bytes
        );
        eprintln!(
            "║ Bytes Scanned:        {:>12}                    ║",
            self.total_bytes_scanned
        );
        eprintln!("║                                                       ║");
        eprintln!(
            "║ Skipped (binary):     {:>8}                        ║",
            self.skipped_binary
        );
        eprintln!(
            "║ Skipped (sensitive):  {:>8}                        ║",
            self.skipped_secret
        );
        if self.truncated {
            eprintln!("║ ⚠ Selection truncated by --max-files                  ║");
        }
        eprintln!("║                                                       ║");
        eprintln!(
            "║ Total Time:           {:>8.2}s                       ║",
            self.duration.as_secs_f64()
        );
        eprintln!(
            "║ Throughput:           {:>8.1} files/s                 ║",
            self.throughput_files_per_sec()
        );
        eprintln!("╚═══════════════════════════════════════════════════════╝\n");
    }

    /// Returns the throughput in files per second.
    #[must_use]
    pub fn throughput_files_per_sec(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.files_rendered as f64 / secs
        } else {
            0.0
        }
    }
}

/// Main orchestrator: select, render, frame and commit one document.
pub struct Pipeline {
    config: Config,
    scanner: Scanner,
    log: Arc<dyn Log>,
    cancel: CancelToken,
}

impl Pipeline {
    /// Creates a new pipeline with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - A root path cannot be resolved
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let scanner = Scanner::new(&config)?;

        Ok(Self {
            config,
            scanner,
            log: Arc::new(TracingLog),
            cancel: CancelToken::new(),
        })
    }

    /// Replaces the logger handed to the render coordinator.
    #[must_use]
    pub fn with_log(mut self, log: Arc<dyn Log>) -> Self {
        self.log = log;
        self
    }

    /// Shares a cancellation token, typically tripped by a signal handler.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Executes the complete pipeline and returns statistics.
    ///
    /// # Process
    ///
    /// 1. **Select**: discovers, filters, orders and indexes files
    /// 2. **Render**: frames the document and renders files concurrently
    /// 3. **Commit**: atomically publishes the document, then copies it to the
    ///    clipboard if requested
    ///
    /// A selection cut short by `max_files` still succeeds; check
    /// [`PipelineStats::truncated`].
    ///
    /// # Errors
    ///
    /// Returns an error if rendering, writing or committing fails, or if the
    /// run is cancelled. No partial document is committed in that case.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use codectx::{Config, Pipeline};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let config = Config::builder()
    ///     .path("./src")
    ///     .build()?;
    ///
    /// let stats = Pipeline::new(config)?.run()?;
    /// stats.print_summary();
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self), fields(format = self.config.format.name()))]
    pub fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();

        let selection = self.scanner.select(&self.cancel)?;
        if let Some(signal) = selection.truncation() {
            warn!("{signal}; rendering the first {} files", selection.files.len());
        }
        if selection.is_empty() {
            self.log.warn("No files matched the current filters");
        }
        info!("Selected {} files", selection.files.len());

        let mut sink = OutputSink::open(&self.config.output)?;
        if sink.is_stdout() {
            debug!("Holding the document in memory until it is committed to stdout");
        }

        let content_bytes = if self.config.dry_run {
            write_dry_run(&mut sink, &selection.files)?;
            0
        } else {
            let framer = DocumentFramer::new(
                self.config.format,
                FrameContext::from_config(&self.config),
            );
            let coordinator = Coordinator::new(
                self.config.render_options(),
                self.config.jobs,
                self.cancel.clone(),
                self.log.as_ref(),
            );
            debug!("Rendering with {} workers", coordinator.workers());

            framer.write_header(&mut sink)?;
            let rendered = coordinator.process(&selection.files, &mut sink)?;
            framer.write_footer(
                &mut sink,
                selection.counters.skipped_binary,
                selection.counters.skipped_secret,
            )?;
            rendered.bytes
        };

        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let committed = sink.commit()?;
        if let Some(path) = &committed {
            info!("Wrote {}", path.display());
        }

        let clipboard_source = if self.config.clipboard && !self.config.dry_run {
            self.copy_to_clipboard(committed.as_deref())
        } else {
            None
        };

        Ok(PipelineStats {
            files_rendered: selection.files.len(),
            content_bytes,
            skipped_binary: selection.counters.skipped_binary,
            skipped_secret: selection.counters.skipped_secret,
            total_bytes_scanned: selection.counters.total_bytes,
            truncated: selection.truncated,
            duration: start_time.elapsed(),
            clipboard_source,
        })
    }

    /// Copies the committed document; failures are only warnings.
    fn copy_to_clipboard(&self, path: Option<&std::path::Path>) -> Option<&'static str> {
        let mut clipboard = Clipboard::new();
        match clipboard.copy_file(path) {
            Ok(()) => {
                info!("Copied to clipboard via {}", clipboard.source());
                Some(clipboard.source())
            }
            Err(e) => {
                warn!("Clipboard copy failed: {}", e);
                None
            }
        }
    }
}

/// Lists the selection, one `  <path> (<size> bytes)` line per file.
fn write_dry_run<W: Write + ?Sized>(sink: &mut W, files: &[FileMeta]) -> Result<()> {
    for meta in files {
        writeln!(sink, "  {} ({} bytes)", meta.display_path(), meta.size)
            .map_err(|e| Error::sink_write(&e))?;
    }
    sink.flush().map_err(|e| Error::sink_write(&e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigBuilder, OutputFormat, OutputTarget};
    use crate::logging::NullLog;
    use assert_fs::prelude::*;
    use std::fs;

    fn fixture() -> assert_fs::TempDir {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("src/a.go").write_str("package a\n").unwrap();
        temp.child("src/b.go").write_str("package b\n").unwrap();
        temp.child("src/c.go").write_str("package c\n").unwrap();
        temp.child("src/blob.bin").write_binary(&[0, 1, 2]).unwrap();
        temp
    }

    fn run(builder: ConfigBuilder, out: &std::path::Path) -> (PipelineStats, String) {
        let config = builder
            .output(OutputTarget::File(out.to_path_buf()))
            .build()
            .unwrap();
        let stats = Pipeline::new(config)
            .unwrap()
            .with_log(Arc::new(NullLog))
            .run()
            .unwrap();
        (stats, fs::read_to_string(out).unwrap())
    }

    #[test]
    fn test_pipeline_plain_document() {
        let temp = fixture();
        let out = temp.path().join("out/context.out");

        let (stats, doc) = run(
            Config::builder().path(temp.path().join("src")).jobs(8),
            &out,
        );

        assert_eq!(stats.files_rendered, 3);
        assert_eq!(stats.skipped_binary, 1);
        assert_eq!(stats.content_bytes, 30);
        assert_eq!(stats.total_bytes_scanned, 33);
        assert!(!stats.truncated);

        assert!(doc.starts_with("# Code Context\n"));
        let a = doc.find("a.go\nSIZE:").unwrap();
        let b = doc.find("b.go\nSIZE:").unwrap();
        let c = doc.find("c.go\nSIZE:").unwrap();
        assert!(a < b && b < c);
        assert!(doc.ends_with("binaries_skipped=1 ; sensitive_skipped=0\n"));
    }

    #[test]
    fn test_pipeline_json_document_parses() {
        let temp = fixture();
        let out = temp.path().join("context.json");

        let (stats, doc) = run(
            Config::builder()
                .path(temp.path().join("src"))
                .format(OutputFormat::Json)
                .index_only(true),
            &out,
        );

        let records: Vec<serde_json::Value> = serde_json::from_str(&doc).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.get("content").is_none()));
        assert_eq!(stats.content_bytes, 0);
    }

    #[test]
    fn test_pipeline_empty_json_selection() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("src").create_dir_all().unwrap();
        let out = temp.path().join("context.json");

        let (stats, doc) = run(
            Config::builder()
                .path(temp.path().join("src"))
                .format(OutputFormat::Json),
            &out,
        );

        assert_eq!(stats.files_rendered, 0);
        let records: Vec<serde_json::Value> = serde_json::from_str(&doc).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_pipeline_dry_run_lists_files() {
        let temp = fixture();
        let out = temp.path().join("listing.txt");

        let (stats, doc) = run(
            Config::builder().path(temp.path().join("src")).dry_run(true),
            &out,
        );

        let lines: Vec<&str> = doc.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("  /"));
        assert!(lines[0].ends_with("/src/a.go (10 bytes)"));
        assert!(!doc.contains("# Code Context"));
        assert_eq!(stats.files_rendered, 3);
        assert_eq!(stats.content_bytes, 0);
    }

    #[test]
    fn test_pipeline_truncated_selection_succeeds() {
        let temp = fixture();
        let out = temp.path().join("context.out");

        let (stats, doc) = run(
            Config::builder().path(temp.path().join("src")).max_files(2),
            &out,
        );

        assert!(stats.truncated);
        assert_eq!(stats.files_rendered, 2);
        assert!(!doc.contains("c.go\nSIZE:"));
    }

    #[test]
    fn test_pipeline_cancelled_leaves_no_document() {
        let temp = fixture();
        let out = temp.path().join("context.out");
        let config = Config::builder()
            .path(temp.path().join("src"))
            .output(OutputTarget::File(out.clone()))
            .build()
            .unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = Pipeline::new(config)
            .unwrap()
            .with_cancel(cancel)
            .run()
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(!out.exists());
    }

    #[test]
    fn test_pipeline_invalid_config() {
        let temp = assert_fs::TempDir::new().unwrap();
        let result = Config::builder()
            .path(temp.path().join("missing"))
            .build();
        assert!(result.unwrap_err().is_config());
    }

    #[test]
    fn test_pipeline_throughput() {
        let stats = PipelineStats {
            files_rendered: 100,
            content_bytes: 0,
            skipped_binary: 0,
            skipped_secret: 0,
            total_bytes_scanned: 0,
            truncated: false,
            duration: Duration::from_secs(2),
            clipboard_source: None,
        };
        assert_eq!(stats.throughput_files_per_sec(), 50.0);

        let instant = PipelineStats {
            duration: Duration::ZERO,
            ..stats
        };
        assert_eq!(instant.throughput_files_per_sec(), 0.0);
    }
}
