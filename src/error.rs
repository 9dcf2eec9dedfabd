use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for the codectx library.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// IO error with context about the file path.
    #[error("IO error accessing '{path}': {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// Invalid include/exclude pattern.
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The invalid pattern
        pattern: String,
        /// Reason why it's invalid
        reason: String,
    },

    /// A selected file could not be read or hashed while rendering.
    #[error("Failed to render '{path}': {message}")]
    Render {
        /// Path of the file being rendered
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// The output sink rejected a write.
    #[error("Failed to write output: {message}")]
    SinkWrite {
        /// Error message
        message: String,
    },

    /// Selection stopped at the configured file ceiling.
    ///
    /// Never returned as `Err` from selection; the partial selection is still valid.
    #[error("Selection truncated at {limit} files ({kept} kept)")]
    SelectionTruncated {
        /// Configured maximum file count
        limit: usize,
        /// Number of files kept
        kept: usize,
    },

    /// The run was cancelled before every file was rendered.
    #[error("Operation cancelled")]
    Cancelled,

    /// A rendered chunk did not map to exactly one slot of the selection.
    #[error("Internal error: rendered chunk index {index} is out of range or repeated ({total} files selected)")]
    Reassembly {
        /// Index carried by the offending chunk
        index: usize,
        /// Number of files in the selection
        total: usize,
    },

    /// Clipboard copy failed.
    #[error("Clipboard error: {message}")]
    Clipboard {
        /// Error message
        message: String,
    },

    /// JSON serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },
}

impl Error {
    /// Creates an IO error with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid pattern error.
    #[must_use]
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// Creates a render failure for a single file.
    #[must_use]
    pub fn render(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Render {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a sink write failure.
    #[must_use]
    pub fn sink_write(source: &std::io::Error) -> Self {
        Self::SinkWrite {
            message: source.to_string(),
        }
    }

    /// Creates a clipboard error.
    #[must_use]
    pub fn clipboard(message: impl Into<String>) -> Self {
        Self::Clipboard {
            message: message.into(),
        }
    }

    /// Returns true if this is an IO error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::InvalidPattern { .. })
    }

    /// Returns true if a file failed to render.
    #[must_use]
    pub const fn is_render(&self) -> bool {
        matches!(self, Self::Render { .. })
    }

    /// Returns true if the output sink rejected a write.
    #[must_use]
    pub const fn is_sink_write(&self) -> bool {
        matches!(self, Self::SinkWrite { .. })
    }

    /// Returns true if ordered reassembly hit an inconsistent chunk index.
    #[must_use]
    pub const fn is_reassembly(&self) -> bool {
        matches!(self, Self::Reassembly { .. })
    }

    /// Returns true if the run was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("test message");
        assert!(err.is_config());
        assert!(err.to_string().contains("test message"));
    }

    #[test]
    fn test_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::io("/tmp/test.txt", io_err);
        assert!(err.is_io());
        assert!(err.to_string().contains("/tmp/test.txt"));
    }

    #[test]
    fn test_render_error_names_file() {
        let err = Error::render("/src/a.rs", "permission denied");
        assert!(err.is_render());
        assert!(err.to_string().contains("/src/a.rs"));
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn test_sink_write_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err = Error::sink_write(&io_err);
        assert!(err.is_sink_write());
        assert!(err.to_string().contains("pipe closed"));
    }

    #[test]
    fn test_truncation_message() {
        let err = Error::SelectionTruncated { limit: 2, kept: 2 };
        assert_eq!(err.to_string(), "Selection truncated at 2 files (2 kept)");
    }

    #[test]
    fn test_reassembly_error_is_not_config() {
        let err = Error::Reassembly { index: 7, total: 3 };
        assert!(err.is_reassembly());
        assert!(!err.is_config());
        assert!(err.to_string().starts_with("Internal error"));
    }

    #[test]
    fn test_serialization_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(err.to_string().contains("Serialization error"));
    }
}
