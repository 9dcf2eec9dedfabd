//! Leveled logging capability passed explicitly into the render pipeline.

/// Minimal leveled logger.
///
/// Implementations must be thread-safe; the coordinator logs from its collector loop.
pub trait Log: Send + Sync {
    /// Logs an error.
    fn error(&self, message: &str);

    /// Logs a warning.
    fn warn(&self, message: &str);

    /// Logs an informational message.
    fn info(&self, message: &str);

    /// Logs a debug message.
    fn debug(&self, message: &str);
}

/// Forwards to the `tracing` macros.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl Log for TracingLog {
    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }

    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn debug(&self, message: &str) {
        tracing::debug!("{message}");
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLog;

impl Log for NullLog {
    fn error(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
    fn debug(&self, _message: &str) {}
}
