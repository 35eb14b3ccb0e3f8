//! Scoped logging lifecycle
//!
//! A `LoggingSession` owns the root dispatcher and root logger of a process
//! or test. It is created at start-up and closes the dispatcher when closed
//! explicitly or dropped, on every exit path.

use crate::core::{Dispatcher, Logger, Result, Writer};
use std::sync::Arc;

/// Root dispatcher and logger pair with guaranteed release.
///
/// # Example
///
/// ```
/// use rust_logging_core::prelude::*;
/// use rust_logging_core::info;
///
/// let session = LoggingSession::start(ConsoleWriter::new()).unwrap();
/// let logger = session.logger();
/// info!(logger, "listening on {}", 8080);
/// session.close();
/// ```
pub struct LoggingSession {
    logger: Logger,
}

impl LoggingSession {
    /// Default dispatcher with `default_writer` on every level.
    pub fn start<W: Writer + 'static>(default_writer: W) -> Result<Self> {
        let dispatcher = Dispatcher::new(Some(Arc::new(default_writer)))?;
        Ok(Self::with_dispatcher(dispatcher))
    }

    /// Session over a dispatcher configured by the caller.
    pub fn with_dispatcher(dispatcher: Dispatcher) -> Self {
        Self {
            logger: Logger::new(Arc::new(dispatcher)),
        }
    }

    /// The root logger.
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        self.logger.dispatcher()
    }

    /// Close the dispatcher and end the session.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for LoggingSession {
    fn drop(&mut self) {
        self.logger.close();
    }
}
