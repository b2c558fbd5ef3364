//! Optional log hook. Callers may plug in their own sink; without one, the
//! same messages go to `tracing` under this crate's target.

use std::sync::Arc;
use std::time::Duration;

use tracing::Level;

pub trait LogSink: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

impl<F> LogSink for F
where
    F: Fn(Level, &str) + Send + Sync,
{
    fn log(&self, level: Level, message: &str) {
        self(level, message);
    }
}

/// Forwards to the `tracing` macros.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!("{message}"),
            Level::WARN => tracing::warn!("{message}"),
            Level::INFO => tracing::info!("{message}"),
            Level::DEBUG => tracing::debug!("{message}"),
            _ => tracing::trace!("{message}"),
        }
    }
}

#[derive(Clone)]
pub(crate) struct Logger {
    sink: Arc<dyn LogSink>,
}

impl Default for Logger {
    fn default() -> Self {
        Self {
            sink: Arc::new(TracingSink),
        }
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger").field("sink", &"<LogSink>").finish()
    }
}

impl Logger {
    pub(crate) fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    pub(crate) fn log(&self, level: Level, message: &str) {
        self.sink.log(level, message);
    }

    pub(crate) fn info(&self, message: &str) {
        self.log(Level::INFO, message);
    }

    pub(crate) fn debug(&self, message: &str) {
        self.log(Level::DEBUG, message);
    }

    pub(crate) fn warn(&self, message: &str) {
        self.log(Level::WARN, message);
    }

    pub(crate) fn error(&self, message: &str) {
        self.log(Level::ERROR, message);
    }
}

pub(crate) fn elapsed_ms(elapsed: Duration) -> String {
    format!("{:.3}ms", elapsed.as_secs_f64() * 1000.0)
}
