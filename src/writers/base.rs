//! Helpers shared by the concrete writers
//!
//! Writers compose these by delegation: a [`Lifecycle`] for the
//! Unopened → Open → Closed state machine and a [`FeedbackSlot`] holding the
//! dispatcher-assigned feedback channel.

use crate::core::{FeedbackSender, LogRecord};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

const UNOPENED: u8 = 0;
const OPEN: u8 = 1;
const CLOSED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Unopened,
    Open,
    Closed,
}

/// Atomic writer state. `Closed` is terminal.
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Lifecycle {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(UNOPENED),
        }
    }

    /// Unopened → Open. Returns `false` in any other state.
    pub fn open(&self) -> bool {
        self.state
            .compare_exchange(UNOPENED, OPEN, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Move to Closed. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        self.state.swap(CLOSED, Ordering::AcqRel) != CLOSED
    }

    pub fn state(&self) -> WriterState {
        match self.state.load(Ordering::Acquire) {
            UNOPENED => WriterState::Unopened,
            OPEN => WriterState::Open,
            _ => WriterState::Closed,
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.state.load(Ordering::Acquire) == OPEN
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Feedback channel assigned by the dispatcher.
#[derive(Debug, Default)]
pub struct FeedbackSlot {
    sender: RwLock<Option<FeedbackSender>>,
}

impl FeedbackSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, sender: FeedbackSender) {
        *self.sender.write() = Some(sender);
    }

    pub fn is_set(&self) -> bool {
        self.sender.read().is_some()
    }

    /// Report that `record` could not be delivered.
    ///
    /// Pushes an Error record describing `err`, with the stack of the caller,
    /// to the dispatcher. Failures on feedback records and failures of writers
    /// without a channel go to stderr instead.
    pub fn report_failure(&self, record: &LogRecord, err: impl fmt::Display) {
        if record.is_feedback() {
            eprintln!(
                "[LOGGER ERROR] Failed to write feedback record '{}': {}",
                record.message(),
                err
            );
            return;
        }

        let sender = self.sender.read().clone();
        match sender {
            Some(sender) => {
                sender.send(LogRecord::error(err));
            }
            None => {
                eprintln!("[LOGGER ERROR] Writer failed: {}", err);
            }
        }
    }
}
