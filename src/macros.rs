//! Logging macros for ergonomic log message formatting.
//!
//! These macros provide a convenient interface for logging with automatic
//! string formatting, similar to `println!` and `format!`. Muted levels and
//! levels without writers still pay for the formatting; call the `Logger`
//! methods directly on hot paths.
//!
//! # Examples
//!
//! ```
//! use rust_logging_core::prelude::*;
//! use rust_logging_core::info;
//!
//! let session = LoggingSession::start(ConsoleWriter::new())?;
//! let logger = session.logger();
//!
//! // Basic logging
//! info!(logger, "Server started");
//!
//! // With format arguments
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//! # Ok::<(), LoggerError>(())
//! ```

/// Log a message at the given level.
///
/// # Examples
///
/// ```
/// # use rust_logging_core::prelude::*;
/// # let session = LoggingSession::start(ConsoleWriter::new())?;
/// # let logger = session.logger();
/// use rust_logging_core::log;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, "Error code: {}", 500);
/// # Ok::<(), LoggerError>(())
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log($level, format!($($arg)+))
    };
}

/// Log a trace-level message.
#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Trace, $($arg)+)
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level message.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
///
/// # Examples
///
/// ```
/// # use rust_logging_core::prelude::*;
/// # let session = LoggingSession::start(ConsoleWriter::new())?;
/// # let logger = session.logger();
/// use rust_logging_core::warn;
/// warn!(logger, "Retry attempt {} of {}", 3, 5);
/// # Ok::<(), LoggerError>(())
/// ```
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warning, $($arg)+)
    };
}

/// Log an error-level message.
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a fatal-level message and terminate the process.
///
/// Evaluates to `!`, so it can end a function returning any type.
///
/// ```no_run
/// # use rust_logging_core::prelude::*;
/// # let session = LoggingSession::start(ConsoleWriter::new())?;
/// # let logger = session.logger();
/// use rust_logging_core::fatal;
/// # #[allow(unreachable_code)]
/// # {
/// fatal!(logger, "Unable to recover from error: {}", "disk full");
/// # }
/// # Ok::<(), LoggerError>(())
/// ```
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $logger.fatal(format!($($arg)+))
    };
}

#[cfg(test)]
mod tests {
    use crate::core::{Dispatcher, LogLevel, Logger};
    use crate::writers::CallbackWriter;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recording_logger() -> (Logger, Arc<Mutex<Vec<(LogLevel, String)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let writer = CallbackWriter::new(move |record| {
            sink.lock()
                .push((record.level(), record.message().to_string()));
            Ok(())
        });
        let dispatcher = Dispatcher::new(Some(Arc::new(writer))).expect("dispatcher");
        let logger = Logger::new(Arc::new(dispatcher));
        logger.mute(LogLevel::Debug, false);
        logger.mute(LogLevel::Trace, false);
        (logger, seen)
    }

    #[allow(dead_code)]
    fn fatal_is_diverging(logger: &Logger) -> u32 {
        fatal!(logger, "cannot continue: {}", 42)
    }

    #[test]
    fn test_log_macro() {
        let (logger, seen) = recording_logger();
        log!(logger, LogLevel::Info, "Test message");
        log!(logger, LogLevel::Info, "Formatted: {}", 42);

        let seen = seen.lock();
        assert_eq!(seen[0], (LogLevel::Info, "Test message".to_string()));
        assert_eq!(seen[1], (LogLevel::Info, "Formatted: 42".to_string()));
    }

    #[test]
    fn test_level_macros() {
        let (logger, seen) = recording_logger();
        trace!(logger, "t {}", 1);
        debug!(logger, "d {}", 2);
        info!(logger, "i {}", 3);
        warn!(logger, "w {}", 4);
        error!(logger, "e {}", 5);

        let levels: Vec<LogLevel> = seen.lock().iter().map(|(level, _)| *level).collect();
        assert_eq!(
            levels,
            vec![
                LogLevel::Trace,
                LogLevel::Debug,
                LogLevel::Info,
                LogLevel::Warning,
                LogLevel::Error
            ]
        );
        assert_eq!(seen.lock()[4].1, "e 5");
    }
}
