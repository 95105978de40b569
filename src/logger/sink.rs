use std::{
    mem,
    sync::{Arc, Mutex, PoisonError},
};

use crate::{logger::LineSink, storage::Storage, telemetry::Publisher};

/// Echoes lines to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl LineSink for ConsoleSink {
    fn write_line(&self, line: &str) {
        eprintln!("{line}");
    }
}

/// Buffers lines in memory and appends them to a file in [`Storage`].
///
/// The buffer is written out on `flush()` or as soon as it holds `max_buffered` lines.
pub struct StorageSink {
    storage: Arc<dyn Storage>,
    path: String,
    max_buffered: usize,
    buffer: Mutex<Vec<String>>,
}

impl StorageSink {
    pub fn new(storage: Arc<dyn Storage>, path: impl Into<String>, max_buffered: usize) -> Self {
        Self {
            storage,
            path: path.into(),
            max_buffered: max_buffered.max(1),
            buffer: Mutex::new(Vec::new()),
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn write_out(&self, lines: Vec<String>) {
        if lines.is_empty() {
            return;
        }

        let mut data = lines.join("\n");
        data.push('\n');

        if let Err(err) = self.storage.append(&self.path, &data) {
            eprintln!(
                "failed to write {} log lines to {}: {err:#}",
                lines.len(),
                self.path
            );
        }
    }
}

impl LineSink for StorageSink {
    fn write_line(&self, line: &str) {
        let full = {
            let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
            buffer.push(line.to_string());
            if buffer.len() >= self.max_buffered {
                Some(mem::take(&mut *buffer))
            } else {
                None
            }
        };

        if let Some(lines) = full {
            self.write_out(lines);
        }
    }

    fn flush(&self) {
        let lines = mem::take(&mut *self.buffer.lock().unwrap_or_else(PoisonError::into_inner));
        self.write_out(lines);
    }
}

/// Forwards lines to a messaging topic. Delivery is best effort.
pub struct PublishSink {
    publisher: Arc<dyn Publisher>,
    topic: String,
}

impl PublishSink {
    pub fn new(publisher: Arc<dyn Publisher>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
        }
    }
}

impl LineSink for PublishSink {
    fn write_line(&self, line: &str) {
        if let Err(err) = self.publisher.publish(&self.topic, line) {
            eprintln!("failed to publish log line to {}: {err:#}", self.topic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        logger::{LogHandler, LogLevel, Logger},
        storage::MemoryStorage,
        telemetry::RecordingPublisher,
    };

    #[test]
    fn storage_sink_holds_lines_until_flush() {
        let storage = Arc::new(MemoryStorage::default());
        let logger = Logger::new();
        logger.add_handler_with_id(
            "file",
            LogHandler::with_default_level(StorageSink::new(storage.clone(), "/log.txt", 8)),
            0,
        );

        logger.info("first");
        logger.warning("second");
        assert!(!storage.exists("/log.txt"));

        logger.flush();

        assert_eq!(
            storage.read("/log.txt").unwrap(),
            "[INFO] first\n[WARNING] second\n"
        );
    }

    #[test]
    fn storage_sink_writes_when_buffer_fills() {
        let storage = Arc::new(MemoryStorage::default());
        let sink = StorageSink::new(storage.clone(), "log.txt", 2);

        sink.write_line("a");
        assert_eq!(sink.buffered(), 1);
        sink.write_line("b");
        sink.write_line("c");

        assert_eq!(storage.read("log.txt").unwrap(), "a\nb\n");
        assert_eq!(sink.buffered(), 1);
    }

    #[test]
    fn storage_failures_stay_inside_the_sink() {
        let storage = Arc::new(MemoryStorage::default());
        storage.fail_writes(true);
        let logger = Logger::new();
        logger.add_handler(
            LogHandler::with_default_level(StorageSink::new(storage.clone(), "log.txt", 1)),
            0,
        );

        logger.error("disk full");
        logger.flush();

        assert!(!storage.exists("log.txt"));
    }

    #[test]
    fn publish_sink_forwards_formatted_line() {
        let publisher = Arc::new(RecordingPublisher::default());
        let logger = Logger::new();
        logger.add_handler(
            LogHandler::new(
                PublishSink::new(publisher.clone(), "temperature/greenhouse/error"),
                LogLevel::Error,
            ),
            0,
        );

        logger.warning("ignored");
        logger.critical("sensor poller stopped");

        assert_eq!(
            publisher.messages(),
            vec![(
                "temperature/greenhouse/error".to_string(),
                "[CRITICAL] sensor poller stopped".to_string()
            )]
        );
    }

    #[test]
    fn publish_failures_do_not_reach_the_caller() {
        let publisher = Arc::new(RecordingPublisher::default());
        publisher.fail(true);
        let sink = PublishSink::new(publisher.clone(), "t");

        sink.write_line("lost");

        assert!(publisher.messages().is_empty());
    }
}
