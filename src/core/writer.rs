//! Writer contract
//!
//! Every sink implements [`Writer`]. Writers are shared between levels as
//! `Arc<dyn Writer>`, so all methods take `&self`. Delivery failures never
//! travel back through `write`; they go to the dispatcher through the
//! [`FeedbackSender`] assigned at registration.

use super::log_record::LogRecord;
use super::metrics::DispatchMetrics;
use super::worker::WorkerSender;
use std::sync::Arc;

/// Identifier of a writer within one level.
pub type WriterId = String;

/// Reserved identifier of the writer that receives feedback records.
pub const DEFAULT_WRITER_ID: &str = "default";

pub trait Writer: Send + Sync {
    /// Deliver one record. Called concurrently by producers.
    fn write(&self, record: &Arc<LogRecord>);

    /// Flush and release resources. The dispatcher calls it once.
    fn close(&self);

    /// Assigned by the dispatcher when the writer is registered.
    fn set_feedback(&self, feedback: FeedbackSender);

    fn name(&self) -> &str {
        "writer"
    }
}

/// Producer side of the dispatcher feedback queue.
#[derive(Clone)]
pub struct FeedbackSender {
    queue: WorkerSender<LogRecord>,
    metrics: Arc<DispatchMetrics>,
}

impl FeedbackSender {
    pub(crate) fn new(queue: WorkerSender<LogRecord>, metrics: Arc<DispatchMetrics>) -> Self {
        Self { queue, metrics }
    }

    /// Push a failure record to the dispatcher, blocking while the queue is
    /// full.
    ///
    /// Returns `false` once the dispatcher has closed the queue; the record is
    /// dropped with a stderr diagnostic.
    pub fn send(&self, record: LogRecord) -> bool {
        let record = record.into_feedback();
        let message = record.message().to_string();

        if self.queue.send(record) {
            return true;
        }

        self.metrics.record_feedback_dropped();
        eprintln!(
            "[LOGGER WARNING] Feedback reported after close, dropped: {}",
            message
        );
        false
    }

    pub fn is_open(&self) -> bool {
        self.queue.is_open()
    }
}

impl std::fmt::Debug for FeedbackSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackSender")
            .field("open", &self.queue.is_open())
            .field("pending", &self.queue.pending())
            .finish()
    }
}
