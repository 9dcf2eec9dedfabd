use crate::{
    config::OutputTarget,
    error::{Error, Result},
};
use std::{
    fs,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

const BUFFER_CAPACITY: usize = 64 * 1024;

enum Inner {
    Deferred {
        buffer: Vec<u8>,
        out: Box<dyn Write + Send>,
    },
    File {
        writer: BufWriter<fs::File>,
        temp_path: PathBuf,
        target: PathBuf,
    },
}

/// Destination of the generated document.
///
/// File output goes to a hidden temporary sibling of the target and only
/// replaces it on [`OutputSink::commit`]. Stdout output is held in memory and
/// written on commit. A sink dropped without committing discards its buffer or
/// removes its temporary file, so failed runs leave no partial document.
pub struct OutputSink {
    inner: Option<Inner>,
}

impl OutputSink {
    /// Opens the sink for `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the target directory cannot be created or the
    /// temporary file cannot be opened.
    pub fn open(target: &OutputTarget) -> Result<Self> {
        let inner = match target {
            OutputTarget::Stdout => return Ok(Self::deferred(Box::new(io::stdout()))),
            OutputTarget::File(path) => {
                let target = std::path::absolute(path).map_err(|e| Error::io(path, e))?;
                let dir = target
                    .parent()
                    .ok_or_else(|| Error::config("Invalid output path"))?;
                fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

                let temp_path = temp_path_for(&target)?;
                let file = fs::File::create(&temp_path).map_err(|e| Error::io(&temp_path, e))?;
                debug!("Writing to temporary file {}", temp_path.display());

                Inner::File {
                    writer: BufWriter::with_capacity(BUFFER_CAPACITY, file),
                    temp_path,
                    target,
                }
            }
        };

        Ok(Self { inner: Some(inner) })
    }

    /// Buffers everything in memory and hands it to `out` on commit.
    #[must_use]
    pub(crate) fn deferred(out: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Some(Inner::Deferred {
                buffer: Vec::with_capacity(BUFFER_CAPACITY),
                out,
            }),
        }
    }

    /// Returns true if the document is held in memory until commit.
    #[must_use]
    pub fn is_stdout(&self) -> bool {
        matches!(self.inner, Some(Inner::Deferred { .. }))
    }

    /// Finishes the document.
    ///
    /// Buffered stdout output is written out and flushed. File output is
    /// flushed, synced to disk and atomically renamed over the target; the
    /// final path is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing, syncing or renaming fails.
    pub fn commit(mut self) -> Result<Option<PathBuf>> {
        match self.inner.take() {
            None => Ok(None),
            Some(Inner::Deferred { buffer, mut out }) => {
                out.write_all(&buffer)
                    .and_then(|()| out.flush())
                    .map_err(|e| Error::sink_write(&e))?;
                debug!("Committed {} bytes to stdout", buffer.len());
                Ok(None)
            }
            Some(Inner::File {
                writer,
                temp_path,
                target,
            }) => {
                let result = finish_file(writer, &temp_path, &target);
                if result.is_err() {
                    let _ = fs::remove_file(&temp_path);
                }
                result.map(|()| Some(target))
            }
        }
    }

    fn writer(&mut self) -> io::Result<&mut dyn Write> {
        match self.inner.as_mut() {
            Some(Inner::Deferred { buffer, .. }) => Ok(buffer as &mut dyn Write),
            Some(Inner::File { writer, .. }) => Ok(writer as &mut dyn Write),
            None => Err(io::Error::other("output sink already committed")),
        }
    }
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer()?.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.writer()?.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer()?.flush()
    }
}

impl Drop for OutputSink {
    fn drop(&mut self) {
        match self.inner.take() {
            Some(Inner::File { writer, temp_path, .. }) => {
                drop(writer);
                if let Err(e) = fs::remove_file(&temp_path) {
                    warn!("Failed to remove {}: {}", temp_path.display(), e);
                } else {
                    debug!("Discarded uncommitted output {}", temp_path.display());
                }
            }
            Some(Inner::Deferred { buffer, .. }) => {
                debug!("Discarded {} bytes of uncommitted stdout output", buffer.len());
            }
            None => {}
        }
    }
}

/// Flushes, syncs and renames the temporary file over `target`.
fn finish_file(writer: BufWriter<fs::File>, temp_path: &Path, target: &Path) -> Result<()> {
    let file = writer
        .into_inner()
        .map_err(|e| Error::sink_write(e.error()))?;

    file.sync_all().map_err(|e| Error::io(temp_path, e))?;
    drop(file);

    fs::rename(temp_path, target).map_err(|e| Error::io(target, e))?;
    debug!("Committed output to {}", target.display());
    Ok(())
}

/// Hidden temporary sibling of `target`, unique per process.
fn temp_path_for(target: &Path) -> Result<PathBuf> {
    let name = target
        .file_name()
        .ok_or_else(|| Error::config("Invalid output path"))?
        .to_string_lossy();
    let dir = target
        .parent()
        .ok_or_else(|| Error::config("Invalid output path"))?;

    Ok(dir.join(format!(".{}.{}.tmp", name, std::process::id())))
}
