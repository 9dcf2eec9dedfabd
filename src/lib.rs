//! # codectx
//!
//! Bundles source files into a single context document, rendered concurrently
//! and reassembled in a deterministic order.
//!
//! ## Features
//!
//! - Git-aware file discovery with depth, extension, pattern and size filters
//! - Secret and binary detection, with skip counters in the document footer
//! - Five output formats (plain, Markdown, fenced, JSON, NDJSON)
//! - Parallel rendering whose output is byte-identical for any worker count
//! - Atomic file output and optional clipboard copy
//!
//! ## Quick Start
//!
//! ```no_run
//! use codectx::{Config, OutputFormat, Pipeline};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .path("./src")
//!     .extensions(["rs", "toml"])
//!     .format(OutputFormat::Markdown)
//!     .max_lines(400)
//!     .build()?;
//!
//! Pipeline::new(config)?.run()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library follows a pipeline architecture:
//! 1. **Scanner**: discovers, filters, sorts and indexes files
//! 2. **Coordinator**: fans files out to a worker pool of **Renderers** and
//!    writes the chunks back in index order
//! 3. **Framer**: wraps the chunks in a format-specific header and footer
//! 4. **Writer**: commits the document atomically

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod clipboard;
mod config;
mod coordinator;
mod error;
mod file;
mod filter;
mod frame;
mod logging;
mod pipeline;
mod render;
mod scanner;
mod writer;

pub use clipboard::Clipboard;
pub use config::{
    split_csv, Config, ConfigBuilder, OutputFormat, OutputTarget, RenderOptions, SortOrder,
};
pub use coordinator::{worker_count, CancelToken, Coordinator, RenderStats};
pub use error::{Error, Result};
pub use file::{FileMeta, RenderedChunk};
pub use filter::{Decision, InclusionPolicy, SkipReason};
pub use frame::{DocumentFramer, FrameContext};
pub use logging::{Log, NullLog, TracingLog};
pub use pipeline::{Pipeline, PipelineStats};
pub use render::Renderer;
pub use scanner::{Scanner, Selection, SelectionCounters};
pub use writer::OutputSink;

/// Runs the complete pipeline with the given configuration.
///
/// This is the main entry point for the library.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - A selected file cannot be read while rendering
/// - The output cannot be written or committed
///
/// # Examples
///
/// ```no_run
/// use codectx::{Config, run};
///
/// # fn main() -> anyhow::Result<()> {
/// let config = Config::builder()
///     .path(".")
///     .build()?;
///
/// let stats = run(config)?;
/// println!("{} files", stats.files_rendered);
/// # Ok(())
/// # }
/// ```
pub fn run(config: Config) -> Result<PipelineStats> {
    Pipeline::new(config)?.run()
}
