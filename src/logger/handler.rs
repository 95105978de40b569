use crate::logger::{Handler, LogLevel};

/// Destination for fully formatted log lines.
pub trait LineSink: Send + Sync {
    fn write_line(&self, line: &str);

    fn flush(&self) {}
}

impl<F> LineSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn write_line(&self, line: &str) {
        self(line)
    }
}

/// Formats a message the way every handler emits it: `[LEVEL] message`.
///
/// Log file readers parse this prefix, so it must stay stable.
pub fn format_line(level: LogLevel, message: &str) -> String {
    format!("[{}] {}", level.as_str(), message)
}

/// Adapts a [`LineSink`] into a [`Handler`] with its own minimum severity.
#[derive(Debug)]
pub struct LogHandler<S> {
    sink: S,
    min_level: LogLevel,
}

impl<S: LineSink> LogHandler<S> {
    pub fn new(sink: S, min_level: LogLevel) -> Self {
        Self { sink, min_level }
    }

    /// Creates a handler accepting `INFO` and above.
    pub fn with_default_level(sink: S) -> Self {
        Self::new(sink, LogLevel::Info)
    }

    pub fn set_min_log_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    pub fn min_log_level(&self) -> LogLevel {
        self.min_level
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<S: LineSink> Handler for LogHandler<S> {
    fn handle_log(&self, level: LogLevel, message: &str) {
        if level < self.min_level {
            return;
        }

        self.sink.write_line(&format_line(level, message));
    }

    fn flush(&self) {
        self.sink.flush();
    }
}
