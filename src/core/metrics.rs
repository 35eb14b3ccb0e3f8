//! Dispatcher metrics for observability
//!
//! Counters describing how records moved through the dispatcher and how many
//! writer failures reached a default writer.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of one dispatcher.
///
/// # Example
///
/// ```
/// use rust_logging_core::core::DispatchMetrics;
///
/// let metrics = DispatchMetrics::new();
/// metrics.record_dispatched();
/// metrics.record_delivered(2);
///
/// assert_eq!(metrics.dispatched(), 1);
/// assert_eq!(metrics.delivered(), 2);
/// ```
#[derive(Debug)]
pub struct DispatchMetrics {
    /// Records handed to `dispatch`
    dispatched: AtomicU64,

    /// Writer `write` calls made for dispatched records
    delivered: AtomicU64,

    /// Feedback records delivered to a default writer
    feedback_routed: AtomicU64,

    /// Feedback records whose level had no default writer
    feedback_unrouted: AtomicU64,

    /// Feedback records reported after the feedback queue closed
    feedback_dropped: AtomicU64,

    /// Records dispatched after close
    rejected_after_close: AtomicU64,
}

impl DispatchMetrics {
    pub const fn new() -> Self {
        Self {
            dispatched: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            feedback_routed: AtomicU64::new(0),
            feedback_unrouted: AtomicU64::new(0),
            feedback_dropped: AtomicU64::new(0),
            rejected_after_close: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn feedback_routed(&self) -> u64 {
        self.feedback_routed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn feedback_unrouted(&self) -> u64 {
        self.feedback_unrouted.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn feedback_dropped(&self) -> u64 {
        self.feedback_dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rejected_after_close(&self) -> u64 {
        self.rejected_after_close.load(Ordering::Relaxed)
    }

    /// Returns the previous value, like every `record_*` method.
    #[inline]
    pub fn record_dispatched(&self) -> u64 {
        self.dispatched.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_delivered(&self, writers: u64) -> u64 {
        self.delivered.fetch_add(writers, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_feedback_routed(&self) -> u64 {
        self.feedback_routed.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_feedback_unrouted(&self) -> u64 {
        self.feedback_unrouted.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_feedback_dropped(&self) -> u64 {
        self.feedback_dropped.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_rejected_after_close(&self) -> u64 {
        self.rejected_after_close.fetch_add(1, Ordering::Relaxed)
    }

    /// Feedback records that did not reach a default writer.
    pub fn feedback_lost(&self) -> u64 {
        self.feedback_unrouted() + self.feedback_dropped()
    }

    /// Reset all counters to zero
    pub fn reset(&self) {
        self.dispatched.store(0, Ordering::Relaxed);
        self.delivered.store(0, Ordering::Relaxed);
        self.feedback_routed.store(0, Ordering::Relaxed);
        self.feedback_unrouted.store(0, Ordering::Relaxed);
        self.feedback_dropped.store(0, Ordering::Relaxed);
        self.rejected_after_close.store(0, Ordering::Relaxed);
    }
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for DispatchMetrics {
    /// Snapshot of the current values
    fn clone(&self) -> Self {
        Self {
            dispatched: AtomicU64::new(self.dispatched()),
            delivered: AtomicU64::new(self.delivered()),
            feedback_routed: AtomicU64::new(self.feedback_routed()),
            feedback_unrouted: AtomicU64::new(self.feedback_unrouted()),
            feedback_dropped: AtomicU64::new(self.feedback_dropped()),
            rejected_after_close: AtomicU64::new(self.rejected_after_close()),
        }
    }
}
