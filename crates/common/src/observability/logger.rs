use std::fmt;

/// Formatted-line logger.
///
/// Implementations must be cheap to call from many concurrent requests.
pub trait Logger: Send + Sync {
    fn printf(&self, args: fmt::Arguments<'_>);
}

/// Forwards every line to `tracing` at debug level under the
/// `zsdk::transport` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn printf(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(target: "zsdk::transport", "{}", args);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn printf(&self, _args: fmt::Arguments<'_>) {}
}
