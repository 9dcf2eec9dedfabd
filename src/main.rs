use anyhow::Context;
use clap::Parser;
use codectx::{split_csv, CancelToken, Config, OutputFormat, OutputTarget, Pipeline, SortOrder};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Exit status when the selection was cut short by `--max-files`.
const EXIT_TRUNCATED: u8 = 3;

#[derive(Parser, Debug)]
#[command(
    name = "codectx",
    version,
    author,
    about = "Bundle source files into a single context document",
    long_about = "Bundle source files into a single context document.\n\n\
    Files are discovered (git-aware when inside a repository), filtered, sorted, \
    rendered in parallel and written back in a deterministic order. Secrets and \
    binaries are skipped by default.\n\n\
    USAGE EXAMPLES:\n  \
      # Bundle a source tree into context.out\n  \
      codectx -p ./src\n\n  \
      # Go and Markdown files only, as Markdown, to stdout\n  \
      codectx -p . -e go,md -F markdown -o -\n\n  \
      # JSON index without content, newest files last\n  \
      codectx -p . -F json --index-only -O mtime -o index.json\n\n  \
      # List what would be included\n  \
      codectx -p . -R -o -"
)]
struct Cli {
    /// Directory (or file) to scan; may be repeated
    #[arg(short, long = "path", value_name = "PATH", required = true)]
    paths: Vec<PathBuf>,

    /// Maximum directory depth (0 = unlimited)
    #[arg(short, long, default_value_t = 0, value_name = "N")]
    depth: usize,

    /// Allowed extensions, comma-separated; may be repeated
    #[arg(short, long, value_name = "EXTS")]
    ext: Vec<String>,

    /// Extra exclusion patterns (names, path fragments or globs), comma-separated
    #[arg(short = 'x', long, value_name = "PATTERNS")]
    exclude: Vec<String>,

    /// Only keep paths containing one of these substrings, comma-separated
    #[arg(short, long, value_name = "PATTERNS")]
    include: Vec<String>,

    /// Skip files larger than this many bytes (0 = unlimited)
    #[arg(short, long, default_value_t = 0, value_name = "BYTES")]
    max_bytes: u64,

    /// Truncate lines to this many characters (0 = unlimited)
    #[arg(long, default_value_t = 0, value_name = "N")]
    max_cols: usize,

    /// Keep at most this many lines per file (0 = unlimited)
    #[arg(short = 'l', long, default_value_t = 0, value_name = "N")]
    max_lines: usize,

    /// Output file, or `-` for stdout
    #[arg(short, long, default_value = "context.out", value_name = "FILE")]
    output: String,

    /// Copy the document to the clipboard (requires a file output)
    #[arg(short = 'c', short_alias = 'C', long)]
    clipboard: bool,

    /// Output format
    #[arg(short = 'F', long, value_enum, default_value = "plain")]
    format: CliFormat,

    /// Sort order of the files in the document
    #[arg(short = 'O', long, value_enum, default_value = "path")]
    order: CliOrder,

    /// Worker threads (0 = number of CPUs, at least 4)
    #[arg(short, long, default_value_t = 0, value_name = "N")]
    jobs: usize,

    /// Render at most this many files (0 = unlimited); exits with 3 when hit
    #[arg(short = 'N', long, default_value_t = 0, value_name = "N")]
    max_files: usize,

    /// Match include/exclude patterns case-insensitively
    #[arg(short = 'I', long)]
    ignore_case: bool,

    /// Emit metadata only, without file content
    #[arg(long)]
    index_only: bool,

    /// List the selected files instead of rendering them
    #[arg(short = 'R', long)]
    dry_run: bool,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Include files that look like credentials or secrets
    #[arg(long)]
    danger_include_secrets: bool,

    /// Include files that look binary
    #[arg(long)]
    include_binaries: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliFormat {
    Plain,
    Markdown,
    Fenced,
    Json,
    Ndjson,
}

impl From<CliFormat> for OutputFormat {
    fn from(f: CliFormat) -> Self {
        match f {
            CliFormat::Plain => Self::Plain,
            CliFormat::Markdown => Self::Markdown,
            CliFormat::Fenced => Self::Fenced,
            CliFormat::Json => Self::Json,
            CliFormat::Ndjson => Self::Ndjson,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOrder {
    Path,
    Ext,
    Size,
    Mtime,
}

impl From<CliOrder> for SortOrder {
    fn from(o: CliOrder) -> Self {
        match o {
            CliOrder::Path => Self::Path,
            CliOrder::Ext => Self::Ext,
            CliOrder::Size => Self::Size,
            CliOrder::Mtime => Self::Mtime,
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    setup_tracing(cli.quiet, cli.verbose)?;

    let mut builder = Config::builder()
        .max_depth(cli.depth)
        .extensions(flatten_csv(&cli.ext))
        .includes(flatten_csv(&cli.include))
        .max_bytes(cli.max_bytes)
        .max_lines(cli.max_lines)
        .max_cols(cli.max_cols)
        .output(OutputTarget::parse(&cli.output))
        .format(cli.format.into())
        .order(cli.order.into())
        .dry_run(cli.dry_run)
        .clipboard(cli.clipboard)
        .skip_secrets(!cli.danger_include_secrets)
        .skip_binaries(!cli.include_binaries)
        .index_only(cli.index_only)
        .jobs(cli.jobs)
        .case_insensitive(cli.ignore_case)
        .max_files(cli.max_files);

    for path in cli.paths {
        builder = builder.path(path);
    }
    for pattern in flatten_csv(&cli.exclude) {
        builder = builder.exclude(pattern);
    }

    let config = builder.build().context("Failed to build configuration")?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        warn!("Signal received, cancelling and discarding partial output");
        handler_token.cancel();
    }) {
        warn!("Failed to install signal handler: {}", e);
    }

    let stats = Pipeline::new(config)
        .context("Failed to create pipeline")?
        .with_cancel(cancel)
        .run()
        .context("Pipeline execution failed")?;

    info!(
        "Summary: files={} bytes={} | binaries_skipped={} | sensitive_skipped={} | in {:.2?} | rate={:.1} files/s",
        stats.files_rendered,
        stats.content_bytes,
        stats.skipped_binary,
        stats.skipped_secret,
        stats.duration,
        stats.throughput_files_per_sec()
    );
    if cli.verbose > 0 {
        stats.print_summary();
    }

    if stats.truncated {
        return Ok(ExitCode::from(EXIT_TRUNCATED));
    }
    Ok(ExitCode::SUCCESS)
}

/// Expands repeated comma-separated arguments into one list.
fn flatten_csv(values: &[String]) -> Vec<String> {
    values.iter().flat_map(|v| split_csv(v)).collect()
}

/// Logs go to stderr; stdout may carry the document.
fn setup_tracing(quiet: bool, verbosity: u8) -> anyhow::Result<()> {
    let filter = match std::env::var("CODECTX_LOG") {
        Ok(directives) if !directives.trim().is_empty() => {
            EnvFilter::try_new(directives).context("Invalid CODECTX_LOG directive")?
        }
        _ => EnvFilter::new(match (quiet, verbosity) {
            (true, _) => "codectx=warn",
            (false, 0) => "codectx=info",
            (false, 1) => "codectx=debug",
            _ => "codectx=trace",
        }),
    };

    let json = std::env::var("LOG_JSON").is_ok_and(|v| v == "1");
    let ansi = std::env::var_os("NO_COLOR").is_none();

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(ansi)
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    Ok(())
}
