use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

const BINARY_SNIFF_BYTES: usize = 4096;
const SHORT_HASH_LEN: usize = 8;

/// Metadata for one selected file.
///
/// Captured once at selection time and never re-read while rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// Absolute path to the file
    pub path: PathBuf,

    /// Size in bytes at selection time
    pub size: u64,

    /// Modification time in seconds since the Unix epoch
    pub mtime: i64,

    /// Lowercase extension without the leading dot
    pub ext: String,

    /// Dense position in the selection order; the sole reassembly key
    pub index: usize,
}

impl FileMeta {
    /// Creates file metadata by querying the filesystem.
    ///
    /// # Errors
    ///
    /// Returns an error if the file's metadata cannot be read.
    pub fn from_path(path: impl Into<PathBuf>, index: usize) -> Result<Self> {
        let path = path.into();
        let metadata = fs::metadata(&path).map_err(|e| Error::io(&path, e))?;
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .and_then(|d| i64::try_from(d.as_secs()).ok())
            .unwrap_or(0);

        Ok(Self {
            ext: extension_lower(&path),
            size: metadata.len(),
            mtime,
            index,
            path,
        })
    }

    /// Returns the path with `/` separators, as shown in the document.
    #[must_use]
    pub fn display_path(&self) -> String {
        to_slash(&self.path)
    }
}

/// One file's fully formatted output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedChunk {
    /// Index copied from the source [`FileMeta`]
    pub index: usize,

    /// Formatted bytes for this file
    pub payload: Vec<u8>,

    /// Content bytes emitted, excluding decorative header and footer
    pub bytes_written: u64,
}

/// Normalizes a path to forward slashes.
#[must_use]
pub(crate) fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Returns the lowercase extension of `path` without the leading dot.
#[must_use]
pub(crate) fn extension_lower(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Returns the first eight hex characters of the digest fed into `hasher`.
#[must_use]
pub(crate) fn short_digest(hasher: Sha256) -> String {
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(SHORT_HASH_LEN);
    hex
}

/// Determines if a file is likely binary.
///
/// A NUL byte within the first 4 KiB marks the file as binary; empty files are text.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub(crate) fn is_likely_binary(path: &Path) -> Result<bool> {
    let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut buffer = [0u8; BINARY_SNIFF_BYTES];
    let mut filled = 0;

    while filled < BINARY_SNIFF_BYTES {
        let n = file
            .read(&mut buffer[filled..])
            .map_err(|e| Error::io(path, e))?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    Ok(memchr::memchr(0, &buffer[..filled]).is_some())
}
