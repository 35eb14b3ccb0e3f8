//! Writers forwarding records to a closure
//!
//! Useful as stub writers in tests and as adapters for custom sinks.

use super::base::{FeedbackSlot, Lifecycle};
use crate::core::{
    FeedbackSender, LogRecord, LoggerError, Result, Worker, Writer, DEFAULT_WORKER_CAPACITY,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a writer callback. Errors become feedback records.
pub type CallbackResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

const ASYNC_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Calls the closure synchronously, one record at a time.
///
/// # Example
///
/// ```
/// use rust_logging_core::writers::CallbackWriter;
///
/// let writer = CallbackWriter::new(|record| {
///     if record.message().is_empty() {
///         return Err("empty message".into());
///     }
///     Ok(())
/// });
/// ```
pub struct CallbackWriter {
    callback: Mutex<Box<dyn FnMut(&LogRecord) -> CallbackResult + Send>>,
    lifecycle: Lifecycle,
    feedback: FeedbackSlot,
}

impl CallbackWriter {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnMut(&LogRecord) -> CallbackResult + Send + 'static,
    {
        let lifecycle = Lifecycle::new();
        lifecycle.open();
        Self {
            callback: Mutex::new(Box::new(callback)),
            lifecycle,
            feedback: FeedbackSlot::new(),
        }
    }
}

impl Writer for CallbackWriter {
    fn write(&self, record: &Arc<LogRecord>) {
        if !self.lifecycle.is_open() {
            return;
        }

        let result = {
            let mut callback = self.callback.lock();
            (*callback)(record.as_ref())
        };
        if let Err(e) = result {
            self.feedback
                .report_failure(record, LoggerError::Callback(e.to_string()));
        }
    }

    fn close(&self) {
        self.lifecycle.close();
    }

    fn set_feedback(&self, feedback: FeedbackSender) {
        self.feedback.set(feedback);
    }

    fn name(&self) -> &str {
        "callback"
    }
}

/// Calls the closure on its own worker thread.
pub struct AsyncCallbackWriter {
    worker: Worker<Arc<LogRecord>>,
    lifecycle: Lifecycle,
    feedback: Arc<FeedbackSlot>,
}

impl AsyncCallbackWriter {
    pub fn new<F>(callback: F) -> Result<Self>
    where
        F: FnMut(&LogRecord) -> CallbackResult + Send + 'static,
    {
        Self::with_capacity(DEFAULT_WORKER_CAPACITY, callback)
    }

    pub fn with_capacity<F>(capacity: usize, mut callback: F) -> Result<Self>
    where
        F: FnMut(&LogRecord) -> CallbackResult + Send + 'static,
    {
        let feedback = Arc::new(FeedbackSlot::new());
        let worker_feedback = Arc::clone(&feedback);

        let worker = Worker::new("logger-callback", capacity, move |record: Arc<LogRecord>| {
            if let Err(e) = callback(record.as_ref()) {
                worker_feedback.report_failure(&record, LoggerError::Callback(e.to_string()));
            }
        })?;

        let lifecycle = Lifecycle::new();
        lifecycle.open();

        Ok(Self {
            worker,
            lifecycle,
            feedback,
        })
    }

    /// Records queued but not yet handed to the callback.
    pub fn pending(&self) -> usize {
        self.worker.pending()
    }
}

impl Writer for AsyncCallbackWriter {
    fn write(&self, record: &Arc<LogRecord>) {
        if self.lifecycle.is_open() {
            self.worker.enqueue(Arc::clone(record));
        }
    }

    fn close(&self) {
        if self.lifecycle.close() {
            self.worker.close(ASYNC_CLOSE_TIMEOUT);
        }
    }

    fn set_feedback(&self, feedback: FeedbackSender) {
        self.feedback.set(feedback);
    }

    fn name(&self) -> &str {
        "async-callback"
    }
}
