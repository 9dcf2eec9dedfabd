use crate::config::{Config, OutputFormat};
use crate::error::{Error, Result};
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::io::Write;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// What the document header describes.
#[derive(Debug, Clone)]
pub struct FrameContext {
    /// Scanned roots as given on the command line
    pub paths: Vec<String>,
    /// Extension allow-list, if any
    pub extensions: Vec<String>,
    /// Depth limit (0 = unlimited)
    pub max_depth: usize,
    /// Generation timestamp
    pub generated_at: DateTime<Local>,
}

impl FrameContext {
    /// Captures the context of a run started now.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            paths: config
                .paths
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            extensions: config.extensions.clone(),
            max_depth: config.max_depth,
            generated_at: Local::now(),
        }
    }
}

/// Emits the opening and closing material around the ordered chunks.
#[derive(Debug, Clone)]
pub struct DocumentFramer {
    format: OutputFormat,
    context: FrameContext,
}

impl DocumentFramer {
    /// Creates a framer for `format`.
    #[must_use]
    pub const fn new(format: OutputFormat, context: FrameContext) -> Self {
        Self { format, context }
    }

    /// Writes the opening material.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SinkWrite`] if the sink rejects the write.
    pub fn write_header<W: Write + ?Sized>(&self, sink: &mut W) -> Result<()> {
        let header = self.header();
        sink.write_all(header.as_bytes())
            .map_err(|e| Error::sink_write(&e))
    }

    /// Writes the closing material with the skip counters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SinkWrite`] if the sink rejects the write.
    pub fn write_footer<W: Write + ?Sized>(
        &self,
        sink: &mut W,
        skipped_binary: usize,
        skipped_secret: usize,
    ) -> Result<()> {
        let footer = self.footer(skipped_binary, skipped_secret);
        sink.write_all(footer.as_bytes())
            .map_err(|e| Error::sink_write(&e))
    }

    fn header(&self) -> String {
        match self.format {
            OutputFormat::Json => "[\n".to_string(),
            OutputFormat::Ndjson => String::new(),
            OutputFormat::Plain | OutputFormat::Markdown | OutputFormat::Fenced => {
                let ctx = &self.context;
                let mut out = format!(
                    "# Code Context\n# Generated: {}\n# Paths: {}\n",
                    ctx.generated_at.format(TIMESTAMP_FORMAT),
                    ctx.paths.join(":")
                );
                if !ctx.extensions.is_empty() {
                    let _ = writeln!(out, "# Extensions: {}", ctx.extensions.join(","));
                }
                if ctx.max_depth > 0 {
                    let _ = writeln!(out, "# Max Depth: {}", ctx.max_depth);
                }
                out.push('\n');
                out
            }
        }
    }

    fn footer(&self, skipped_binary: usize, skipped_secret: usize) -> String {
        match self.format {
            OutputFormat::Json => "\n]\n".to_string(),
            OutputFormat::Ndjson => String::new(),
            OutputFormat::Markdown => format!(
                "\n---\n**Additional summary:** binaries skipped: {skipped_binary} · sensitive files skipped: {skipped_secret}\n"
            ),
            OutputFormat::Plain | OutputFormat::Fenced => format!(
                "\n---\nAdditional summary: binaries_skipped={skipped_binary} ; sensitive_skipped={skipped_secret}\n"
            ),
        }
    }
}
