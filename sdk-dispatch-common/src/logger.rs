//! Client-configurable logging sink.
//!
//! The runtime's own diagnostics always go through the [`log`] facade. The
//! [`Logger`] trait is the sink a client is *configured* with and hands to
//! middleware, so applications can route per-client request logs separately or
//! silence them entirely.

use std::fmt;

use log::Level;

/// Leveled logging sink handed to middleware through the handler context.
pub trait Logger: Send + Sync + fmt::Debug {
    /// Emit `message` at `level`.
    fn log(&self, level: Level, message: &str);

    fn trace(&self, message: &str) {
        self.log(Level::Trace, message);
    }

    fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }
}

/// Discards everything. The default for new clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn log(&self, _level: Level, _message: &str) {}
}

/// Forwards to the [`log`] facade under a fixed target.
#[derive(Debug, Clone)]
pub struct LogFacadeLogger {
    target: String,
}

impl LogFacadeLogger {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

impl Default for LogFacadeLogger {
    fn default() -> Self {
        Self::new("sdk_dispatch")
    }
}

impl Logger for LogFacadeLogger {
    fn log(&self, level: Level, message: &str) {
        log::log!(target: self.target.as_str(), level, "{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Recording(Mutex<Vec<(Level, String)>>);

    impl Logger for Recording {
        fn log(&self, level: Level, message: &str) {
            self.0.lock().unwrap().push((level, message.to_string()));
        }
    }

    #[test]
    fn test_default_methods_dispatch_levels() {
        let logger = Recording::default();
        logger.trace("t");
        logger.debug("d");
        logger.info("i");
        logger.warn("w");
        logger.error("e");
        let levels: Vec<Level> = logger.0.lock().unwrap().iter().map(|(l, _)| *l).collect();
        assert_eq!(
            levels,
            vec![Level::Trace, Level::Debug, Level::Info, Level::Warn, Level::Error]
        );
    }

    #[test_log::test]
    fn test_facade_logger_does_not_panic() {
        let logger = LogFacadeLogger::default();
        logger.info("hello");
        NoOpLogger.error("ignored");
    }
}
