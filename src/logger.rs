//! Severity-routed logging shared by every part of the node.
//!
//! A [`Logger`] fans each message out to its registered handlers in descending priority order.
//! Messages below the global threshold are dropped before any handler sees them; each handler may
//! then apply its own minimum severity (see [`LogHandler`]).

mod handler;
mod level;
mod sink;

pub use handler::*;
pub use level::*;
pub use sink::*;

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// Receives every message that passes the logger's global threshold.
///
/// Closures taking `(LogLevel, &str)` implement this trait, which makes ad hoc handlers cheap to
/// register.
pub trait Handler: Send + Sync {
    fn handle_log(&self, level: LogLevel, message: &str);

    /// Persists buffered output. Handlers that write through immediately ignore this.
    fn flush(&self) {}
}

impl<F> Handler for F
where
    F: Fn(LogLevel, &str) + Send + Sync,
{
    fn handle_log(&self, level: LogLevel, message: &str) {
        self(level, message)
    }
}

struct HandlerWrapper {
    handler: Arc<dyn Handler>,
    id: String,
    priority: i32,
}

struct State {
    global_level: LogLevel,
    handlers: Vec<HandlerWrapper>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            global_level: LogLevel::Info,
            handlers: Vec::new(),
        }
    }
}

/// Cloneable handle to one logging context. Clones share handlers and threshold.
#[derive(Clone, Default)]
pub struct Logger {
    state: Arc<Mutex<State>>,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler without an identifier.
    ///
    /// Such handlers can only be removed together with every other handler that has an empty
    /// identifier, via `remove_handler("")`.
    pub fn add_handler(&self, handler: impl Handler + 'static, priority: i32) {
        self.add_handler_with_id("", handler, priority);
    }

    pub fn add_handler_with_id(
        &self,
        id: impl Into<String>,
        handler: impl Handler + 'static,
        priority: i32,
    ) {
        let mut state = self.lock();
        state.handlers.push(HandlerWrapper {
            handler: Arc::new(handler),
            id: id.into(),
            priority,
        });
        // `sort_by` is stable, so equal priorities keep their current relative order.
        state.handlers.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Removes every handler registered under `id`. Unknown identifiers are ignored.
    pub fn remove_handler(&self, id: &str) {
        self.lock().handlers.retain(|wrapper| wrapper.id != id);
    }

    /// Delivers `message` to every handler in priority order.
    ///
    /// A panicking handler is reported on stderr and skipped; the remaining handlers still run.
    pub fn log(&self, level: LogLevel, message: &str) {
        // Handlers run outside the lock so they are free to log themselves.
        let handlers: Vec<Arc<dyn Handler>> = {
            let state = self.lock();
            if level < state.global_level {
                return;
            }
            state.handlers.iter().map(|w| Arc::clone(&w.handler)).collect()
        };

        for handler in handlers {
            let delivered =
                panic::catch_unwind(AssertUnwindSafe(|| handler.handle_log(level, message)));
            if delivered.is_err() {
                eprintln!("log handler panicked while handling a {level} message");
            }
        }
    }

    pub fn setup(&self, message: &str) {
        self.log(LogLevel::Setup, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    pub fn critical(&self, message: &str) {
        self.log(LogLevel::Critical, message);
    }

    pub fn set_global_log_level(&self, level: LogLevel) {
        self.lock().global_level = level;
    }

    pub fn global_log_level(&self) -> LogLevel {
        self.lock().global_level
    }

    pub fn flush(&self) {
        let handlers: Vec<Arc<dyn Handler>> = self
            .lock()
            .handlers
            .iter()
            .map(|w| Arc::clone(&w.handler))
            .collect();

        for handler in handlers {
            if panic::catch_unwind(AssertUnwindSafe(|| handler.flush())).is_err() {
                eprintln!("log handler panicked while flushing");
            }
        }
    }

    pub fn handler_count(&self) -> usize {
        self.lock().handlers.len()
    }

    /// Drops all handlers and restores the default threshold (`INFO`).
    pub fn reset(&self) {
        *self.lock() = State::default();
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A handler panicking elsewhere must not take logging down with it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    type Calls = Arc<Mutex<Vec<(String, LogLevel, String)>>>;

    fn recorder(calls: &Calls, name: &str) -> impl Handler + 'static {
        let calls = Arc::clone(calls);
        let name = name.to_string();
        move |level: LogLevel, message: &str| {
            calls
                .lock()
                .unwrap()
                .push((name.clone(), level, message.to_string()));
        }
    }

    fn names(calls: &Calls) -> Vec<String> {
        calls.lock().unwrap().iter().map(|c| c.0.clone()).collect()
    }

    #[test]
    fn global_threshold_drops_lower_levels_before_handlers() {
        let levels = [
            LogLevel::Setup,
            LogLevel::Info,
            LogLevel::Warning,
            LogLevel::Error,
            LogLevel::Critical,
        ];

        for threshold in levels {
            let logger = Logger::new();
            let calls = Calls::default();
            logger.add_handler(recorder(&calls, "a"), 0);
            logger.set_global_log_level(threshold);

            for level in levels {
                logger.log(level, "m");
            }

            let seen: Vec<LogLevel> = calls.lock().unwrap().iter().map(|c| c.1).collect();
            let expected: Vec<LogLevel> = levels.into_iter().filter(|l| *l >= threshold).collect();
            assert_eq!(seen, expected);
        }
    }

    #[test]
    fn message_passing_global_gate_reaches_only_handlers_that_accept_it() {
        let logger = Logger::new();
        logger.set_global_log_level(LogLevel::Warning);

        let lines = Arc::new(Mutex::new(Vec::new()));
        for (name, min) in [("warn", LogLevel::Warning), ("crit", LogLevel::Critical)] {
            let lines = Arc::clone(&lines);
            let name = name.to_string();
            logger.add_handler(
                LogHandler::new(
                    move |line: &str| lines.lock().unwrap().push(format!("{name} {line}")),
                    min,
                ),
                0,
            );
        }

        logger.log(LogLevel::Info, "dropped globally");
        logger.log(LogLevel::Warning, "low battery");

        assert_eq!(
            *lines.lock().unwrap(),
            vec!["warn [WARNING] low battery".to_string()]
        );
    }

    #[test]
    fn handlers_run_in_descending_priority_with_stable_ties() {
        let logger = Logger::new();
        let calls = Calls::default();
        logger.add_handler(recorder(&calls, "low"), -1);
        logger.add_handler(recorder(&calls, "first-zero"), 0);
        logger.add_handler(recorder(&calls, "high"), 10);
        logger.add_handler(recorder(&calls, "second-zero"), 0);
        logger.add_handler(recorder(&calls, "mid"), 5);

        logger.info("hello");

        assert_eq!(
            names(&calls),
            vec!["high", "mid", "first-zero", "second-zero", "low"]
        );
    }

    #[test]
    fn remove_handler_stops_delivery_to_that_id() {
        let logger = Logger::new();
        let calls = Calls::default();
        logger.add_handler_with_id("file", recorder(&calls, "file"), 1);
        logger.add_handler_with_id("console", recorder(&calls, "console"), 0);
        logger.add_handler_with_id("file", recorder(&calls, "file-2"), 0);

        logger.remove_handler("file");
        logger.remove_handler("missing");
        logger.info("after removal");

        assert_eq!(names(&calls), vec!["console"]);
        assert_eq!(logger.handler_count(), 1);
    }

    #[test]
    fn anonymous_handlers_are_only_removable_all_at_once() {
        let logger = Logger::new();
        let calls = Calls::default();
        logger.add_handler(recorder(&calls, "anon-1"), 0);
        logger.add_handler(recorder(&calls, "anon-2"), 0);
        logger.add_handler_with_id("named", recorder(&calls, "named"), 0);

        logger.remove_handler("");
        logger.info("m");

        assert_eq!(names(&calls), vec!["named"]);
    }

    #[test]
    fn threshold_change_applies_to_next_message() {
        let logger = Logger::new();
        let calls = Calls::default();
        logger.add_handler(recorder(&calls, "a"), 0);

        logger.setup("boot");
        logger.set_global_log_level(LogLevel::Setup);
        logger.setup("boot");

        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn handler_may_log_through_the_same_logger() {
        let logger = Logger::new();
        let calls = Calls::default();
        logger.add_handler(recorder(&calls, "sink"), 0);

        let inner = logger.clone();
        logger.add_handler(
            move |level: LogLevel, message: &str| {
                if level == LogLevel::Critical {
                    inner.error(&format!("escalated: {message}"));
                }
            },
            1,
        );

        logger.critical("overheat");

        let messages: Vec<String> = calls.lock().unwrap().iter().map(|c| c.2.clone()).collect();
        assert_eq!(messages, vec!["escalated: overheat", "overheat"]);
    }

    #[test]
    fn reset_restores_a_fresh_context() {
        let logger = Logger::new();
        logger.add_handler(|_: LogLevel, _: &str| {}, 0);
        logger.set_global_log_level(LogLevel::Critical);

        logger.reset();

        assert_eq!(logger.handler_count(), 0);
        assert_eq!(logger.global_log_level(), LogLevel::Info);
    }

    struct BrokenSink;

    impl Handler for BrokenSink {
        fn handle_log(&self, _level: LogLevel, _message: &str) {
            panic!("sink unavailable");
        }

        fn flush(&self) {
            panic!("sink unavailable");
        }
    }

    #[test]
    fn panicking_handler_does_not_stop_delivery() {
        let logger = Logger::new();
        let calls = Calls::default();
        logger.add_handler_with_id("broken", BrokenSink, 10);
        logger.add_handler(recorder(&calls, "after"), 0);

        logger.error("pin 26 timed out");
        logger.flush();

        assert_eq!(names(&calls), vec!["after".to_string()]);
        assert_eq!(logger.handler_count(), 2);
    }
}
