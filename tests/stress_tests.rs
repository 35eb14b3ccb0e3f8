//! Stress tests for concurrent dispatch and shutdown
//!
//! These tests verify:
//! - No record is lost through an async writer under concurrent producers
//! - Every failure of a busy writer is accounted for as feedback
//! - Closing while producers are running neither panics nor deadlocks
//! - Writers registered while closing are still closed exactly once

use parking_lot::Mutex;
use rust_logging_core::prelude::*;
use rust_logging_core::writers::RotationStrategy;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const PRODUCERS: usize = 8;

fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn test_concurrent_producers_lose_nothing() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("concurrent.log");

    let policy = RotationPolicy::new().with_strategy(RotationStrategy::Never);
    let writer = RotatingFileWriter::with_layout(&log_file, policy, TextLayout::plain())
        .expect("Failed to create writer");
    let session = LoggingSession::start(writer).expect("Failed to start session");

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let logger = session.logger().child();
            thread::spawn(move || {
                logger.set_tag("producer", producer.to_string());
                for i in 0..500 {
                    logger.info(format!("producer {} message {}", producer, i));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("producer panicked");
    }
    session.close();

    let content = std::fs::read_to_string(&log_file).expect("Failed to read log file");
    assert_eq!(content.lines().count(), PRODUCERS * 500);
    for producer in 0..PRODUCERS {
        let last = format!("INFO: producer {} message 499", producer);
        assert!(content.contains(&last), "missing {:?}", last);
    }
}

#[test]
fn test_feedback_storm_is_accounted() {
    let feedback_seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&feedback_seen);
    let default = CallbackWriter::new(move |record| {
        if record.is_feedback() {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    });
    let failing = CallbackWriter::new(|_record| Err("backend overloaded".into()));

    let dispatcher = Arc::new(Dispatcher::new(Some(Arc::new(default))).expect("dispatcher"));
    dispatcher
        .add_level_writer(LogLevel::Info, Arc::new(failing), Some("failing"))
        .expect("add writer");

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|_| {
            let dispatcher = Arc::clone(&dispatcher);
            thread::spawn(move || {
                for i in 0..200 {
                    dispatcher.dispatch(LogRecord::new(LogLevel::Info, format!("request {}", i)));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("producer panicked");
    }

    let total = (PRODUCERS * 200) as u64;
    let metrics = dispatcher.metrics();
    assert!(wait_until(Duration::from_secs(10), || {
        metrics.feedback_routed() + metrics.feedback_lost() == total
    }));
    assert_eq!(feedback_seen.load(Ordering::SeqCst) as u64, metrics.feedback_routed());

    dispatcher.close();
}

#[test]
fn test_close_during_dispatch() {
    let delivered = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&delivered);
    let writer = AsyncCallbackWriter::with_capacity(16, move |_record| {
        *sink.lock() += 1;
        Ok(())
    })
    .expect("async writer");

    let dispatcher = Arc::new(Dispatcher::new(None).expect("dispatcher"));
    dispatcher
        .add_writer(Arc::new(writer), Some("async"))
        .expect("add writer");

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|_| {
            let dispatcher = Arc::clone(&dispatcher);
            thread::spawn(move || {
                for i in 0..1_000 {
                    dispatcher.dispatch(LogRecord::new(LogLevel::Info, format!("tick {}", i)));
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(5));
    dispatcher.close();

    for handle in handles {
        handle.join().expect("producer panicked");
    }

    let metrics = dispatcher.metrics();
    assert_eq!(
        metrics.dispatched() + metrics.rejected_after_close(),
        (PRODUCERS * 1_000) as u64
    );
    assert!(*delivered.lock() as u64 <= metrics.dispatched());
}

#[test]
fn test_writers_added_during_close_are_closed() {
    #[derive(Default)]
    struct Closing {
        closes: AtomicUsize,
    }

    impl Writer for Closing {
        fn write(&self, _record: &Arc<LogRecord>) {}

        fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }

        fn set_feedback(&self, _feedback: FeedbackSender) {}
    }

    for _ in 0..20 {
        let dispatcher = Arc::new(Dispatcher::new(None).expect("dispatcher"));

        let handles: Vec<_> = (0..PRODUCERS)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                thread::spawn(move || {
                    let mut accepted = Vec::new();
                    for _ in 0..50 {
                        let writer = Arc::new(Closing::default());
                        if dispatcher.add_writer(writer.clone(), None).is_ok() {
                            accepted.push(writer);
                        }
                    }
                    accepted
                })
            })
            .collect();

        thread::sleep(Duration::from_micros(200));
        dispatcher.close();

        for handle in handles {
            for writer in handle.join().expect("registering thread panicked") {
                assert_eq!(writer.closes.load(Ordering::SeqCst), 1);
            }
        }
    }
}
