//! Per-file rendering.
//!
//! A [`Renderer`] turns one [`FileMeta`] into one [`RenderedChunk`]. It holds no
//! mutable state, so a single instance is shared by reference across all workers.

use crate::config::{OutputFormat, RenderOptions};
use crate::error::{Error, Result};
use crate::file::{short_digest, FileMeta, RenderedChunk};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

const READ_BUFFER: usize = 64 * 1024;
const RULE_HEAVY: &str =
    "================================================================================";
const RULE_LIGHT: &str =
    "--------------------------------------------------------------------------------";
const TRUNCATION_MARKER: &str = "... [truncated]";

/// JSON record emitted for `json` and `ndjson` output.
#[derive(Debug, Serialize)]
struct FileRecord<'a> {
    path: String,
    size: u64,
    hash: &'a str,
    lines: usize,
    mtime: i64,
    ext: &'a str,
    index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
}

/// Kept body and fingerprint of one file, gathered in a single pass.
struct Scan {
    hash: String,
    lines: usize,
    body: String,
    written: u64,
}

/// Renders single files according to a format and its limits.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    opts: RenderOptions,
}

impl Renderer {
    /// Creates a renderer for the given options.
    #[must_use]
    pub const fn new(opts: RenderOptions) -> Self {
        Self { opts }
    }

    /// Returns the options this renderer applies.
    #[must_use]
    pub const fn options(&self) -> &RenderOptions {
        &self.opts
    }

    /// Renders one file.
    ///
    /// The file is streamed once. Only the kept lines are held in memory; the
    /// hash and line count always cover the whole original file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Render`] if the file cannot be read, and a serialization
    /// error if a JSON record cannot be encoded.
    pub fn render(&self, meta: &FileMeta) -> Result<RenderedChunk> {
        let scan = self
            .scan(&meta.path)
            .map_err(|e| Error::render(&meta.path, e.to_string()))?;

        let payload = if self.opts.format.is_structured() {
            let mut payload = self.render_record(meta, &scan)?;
            if self.opts.format == OutputFormat::Ndjson {
                payload.push(b'\n');
            }
            payload
        } else {
            self.render_text(meta, &scan)
        };

        Ok(RenderedChunk {
            index: meta.index,
            payload,
            bytes_written: scan.written,
        })
    }

    /// Hashes and counts every byte, keeping body lines up to `max_lines`.
    fn scan(&self, path: &Path) -> io::Result<Scan> {
        let mut reader = BufReader::with_capacity(READ_BUFFER, File::open(path)?);
        let mut hasher = Sha256::new();
        let mut newlines = 0usize;
        let mut last_byte = None;
        let mut body = String::new();
        let mut written = 0u64;

        if !self.opts.index_only {
            let mut line = Vec::new();
            let mut kept = 0usize;

            loop {
                line.clear();
                if reader.read_until(b'\n', &mut line)? == 0 {
                    break;
                }
                hasher.update(&line);
                last_byte = line.last().copied();
                if last_byte == Some(b'\n') {
                    newlines += 1;
                }

                if self.opts.max_lines > 0 && kept == self.opts.max_lines {
                    let _ = write!(body, "\n[... truncated at {kept} lines ...]\n");
                    break;
                }

                let raw = line.strip_suffix(b"\n").unwrap_or(&line[..]);
                let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
                let text = String::from_utf8_lossy(raw);
                let text = truncate_cols(&text, self.opts.max_cols);
                body.push_str(&text);
                body.push('\n');
                written += text.len() as u64 + 1;
                kept += 1;
            }
        }

        // The rest only feeds the hash and the line count.
        loop {
            let buf = reader.fill_buf()?;
            if buf.is_empty() {
                break;
            }
            hasher.update(buf);
            newlines += memchr::memchr_iter(b'\n', buf).count();
            last_byte = buf.last().copied();
            let consumed = buf.len();
            reader.consume(consumed);
        }

        // A final line without a terminator still counts.
        let unterminated = last_byte.is_some_and(|b| b != b'\n');

        Ok(Scan {
            hash: short_digest(hasher),
            lines: newlines + usize::from(unterminated),
            body,
            written,
        })
    }

    fn render_text(&self, meta: &FileMeta, scan: &Scan) -> Vec<u8> {
        let path = meta.display_path();
        let (hash, lines) = (&scan.hash, scan.lines);
        let mut out = String::with_capacity(scan.body.len() + 256);

        match self.opts.format {
            OutputFormat::Markdown => {
                let _ = write!(
                    out,
                    "\n## {path}\n\n - **Size:** {} bytes\n - **Hash:** {hash}\n - **Lines:** {lines}\n\n```\n",
                    meta.size
                );
            }
            OutputFormat::Fenced => {
                let _ = write!(
                    out,
                    "\n```{}\n# File: {path}\n# Size: {} bytes | Hash: {hash} | Lines: {lines}\n",
                    meta.ext, meta.size
                );
            }
            _ => {
                let _ = write!(
                    out,
                    "\n{RULE_HEAVY}\nFILE: {path}\nSIZE: {} bytes | HASH: {hash} | LINES: {lines}\n{RULE_LIGHT}\n",
                    meta.size
                );
            }
        }

        out.push_str(&scan.body);

        match self.opts.format {
            OutputFormat::Markdown | OutputFormat::Fenced => out.push_str("\n```\n"),
            _ => out.push('\n'),
        }

        out.into_bytes()
    }

    fn render_record(&self, meta: &FileMeta, scan: &Scan) -> Result<Vec<u8>> {
        let record = FileRecord {
            path: meta.display_path(),
            size: meta.size,
            hash: &scan.hash,
            lines: scan.lines,
            mtime: meta.mtime,
            ext: &meta.ext,
            index: meta.index,
            content: (!self.opts.index_only).then_some(scan.body.as_str()),
        };

        Ok(serde_json::to_vec(&record)?)
    }
}

/// Truncates `line` to `max_cols` characters, appending a marker when cut.
fn truncate_cols(line: &str, max_cols: usize) -> Cow<'_, str> {
    if max_cols == 0 {
        return Cow::Borrowed(line);
    }

    match line.char_indices().nth(max_cols) {
        Some((cut, _)) => Cow::Owned(format!("{}{TRUNCATION_MARKER}", &line[..cut])),
        None => Cow::Borrowed(line),
    }
}
