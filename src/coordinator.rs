//! Concurrent, order-preserving render pipeline.
//!
//! A dispatcher thread feeds [`FileMeta`] entries in index order into a bounded
//! queue; a fixed pool of workers renders them; the caller collects results into
//! an index-keyed arena and, once every slot is filled, writes them to the sink in
//! ascending index order. Output is therefore independent of worker count and of
//! the order in which files finish.

use crate::config::RenderOptions;
use crate::error::{Error, Result};
use crate::file::{FileMeta, RenderedChunk};
use crate::logging::Log;
use crate::render::Renderer;
use crossbeam_channel::bounded;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

const MIN_AUTO_WORKERS: usize = 4;
const JSON_SEPARATOR: &[u8] = b",\n";

/// Shared cancellation flag.
///
/// Cancelling stops dispatch of new work; in-flight reads finish naturally.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Aggregate metrics of one render run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Files rendered
    pub files: usize,
    /// Content bytes written, excluding decorative framing
    pub bytes: u64,
}

/// Resolves the worker pool size: an explicit count wins, otherwise the host's
/// parallelism with a floor of four.
#[must_use]
pub fn worker_count(jobs: usize) -> usize {
    if jobs > 0 {
        jobs
    } else {
        num_cpus::get().max(MIN_AUTO_WORKERS)
    }
}

/// Owns the worker pool and reassembles rendered chunks in index order.
pub struct Coordinator<'a> {
    renderer: Renderer,
    workers: usize,
    cancel: CancelToken,
    log: &'a dyn Log,
}

impl<'a> Coordinator<'a> {
    /// Creates a coordinator. `jobs == 0` selects the automatic pool size.
    #[must_use]
    pub fn new(opts: RenderOptions, jobs: usize, cancel: CancelToken, log: &'a dyn Log) -> Self {
        Self {
            renderer: Renderer::new(opts),
            workers: worker_count(jobs),
            cancel,
            log,
        }
    }

    /// Returns the resolved worker pool size.
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Renders `files` concurrently and writes them to `sink` in index order.
    ///
    /// `files` must carry the dense indices `0..files.len()`. Nothing is written
    /// until every file has rendered; on any failure nothing is written at all.
    ///
    /// # Errors
    ///
    /// - [`Error::Render`] for the first file that fails to render
    /// - [`Error::SinkWrite`] for the first rejected write
    /// - [`Error::Cancelled`] if cancellation stopped dispatch early
    pub fn process<W: Write + ?Sized>(&self, files: &[FileMeta], sink: &mut W) -> Result<RenderStats> {
        let chunks = self.render_all(files)?;
        let stats = RenderStats {
            files: chunks.len(),
            bytes: chunks.iter().map(|c| c.bytes_written).sum(),
        };

        self.flush(&chunks, sink)?;

        self.log.debug(&format!(
            "rendered {} files ({} content bytes)",
            stats.files, stats.bytes
        ));
        Ok(stats)
    }

    /// Fans `files` out to the pool and returns the chunks ordered by index.
    fn render_all(&self, files: &[FileMeta]) -> Result<Vec<RenderedChunk>> {
        let total = files.len();
        if total == 0 {
            return Ok(Vec::new());
        }
        let workers = self.workers.min(total);

        self.log.debug(&format!(
            "dispatching {total} files to {workers} workers"
        ));

        let (job_tx, job_rx) = bounded::<&FileMeta>(workers);
        let (out_tx, out_rx) = bounded::<Result<RenderedChunk>>(workers);
        let abort = AtomicBool::new(false);
        let renderer = &self.renderer;
        let cancel = &self.cancel;
        let abort_flag = &abort;

        thread::scope(|scope| {
            scope.spawn(move || {
                for meta in files {
                    if cancel.is_cancelled() || abort_flag.load(Ordering::Relaxed) {
                        break;
                    }
                    if job_tx.send(meta).is_err() {
                        break;
                    }
                }
            });

            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let out_tx = out_tx.clone();
                scope.spawn(move || {
                    while let Ok(meta) = job_rx.recv() {
                        if out_tx.send(renderer.render(meta)).is_err() {
                            break;
                        }
                    }
                });
            }

            // Only the workers hold channel ends from here on.
            drop(job_rx);
            drop(out_tx);

            let result = self.collect(out_rx, total);
            if result.is_err() {
                abort.store(true, Ordering::Relaxed);
            }
            result
        })
    }

    /// Fills the index-keyed arena as results arrive, in any order.
    fn collect(
        &self,
        out_rx: crossbeam_channel::Receiver<Result<RenderedChunk>>,
        total: usize,
    ) -> Result<Vec<RenderedChunk>> {
        let mut slots: Vec<Option<RenderedChunk>> = vec![None; total];

        for result in &out_rx {
            let chunk = match result {
                Ok(chunk) => chunk,
                Err(e) => {
                    self.log.error(&e.to_string());
                    return Err(e);
                }
            };

            let Some(slot) = slots.get_mut(chunk.index).filter(|s| s.is_none()) else {
                let err = Error::Reassembly {
                    index: chunk.index,
                    total,
                };
                self.log.error(&err.to_string());
                return Err(err);
            };
            *slot = Some(chunk);
        }

        let filled = slots.iter().filter(|s| s.is_some()).count();
        if filled < total {
            self.log.warn(&format!(
                "cancelled after rendering {filled} of {total} files"
            ));
            return Err(Error::Cancelled);
        }

        Ok(slots.into_iter().flatten().collect())
    }

    /// Writes ordered chunks, joining JSON records with `,\n`.
    fn flush<W: Write + ?Sized>(&self, chunks: &[RenderedChunk], sink: &mut W) -> Result<()> {
        let joined = self.renderer.options().format.joins_records();
        let mut first = true;

        for chunk in chunks.iter().filter(|c| !c.payload.is_empty()) {
            if joined && !first {
                sink.write_all(JSON_SEPARATOR)
                    .map_err(|e| Error::sink_write(&e))?;
            }
            sink.write_all(&chunk.payload)
                .map_err(|e| Error::sink_write(&e))?;
            first = false;
        }

        sink.flush().map_err(|e| Error::sink_write(&e))
    }
}
