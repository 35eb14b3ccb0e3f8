//! Integration tests for the dispatch engine
//!
//! These tests verify:
//! - Per-writer delivery order
//! - Feedback routing to the default writer only
//! - Feedback backpressure without loss
//! - Idempotent close with single writer close
//! - Rendered output end to end
//! - Root-only registration

use parking_lot::Mutex;
use rust_logging_core::prelude::*;
use rust_logging_core::writers::{AsyncCallbackWriter, CallbackWriter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Writer keeping every record and counting close calls.
#[derive(Default)]
struct Recording {
    records: Mutex<Vec<Arc<LogRecord>>>,
    closes: AtomicUsize,
}

impl Recording {
    fn messages(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .map(|record| record.message().to_string())
            .collect()
    }
}

impl Writer for Recording {
    fn write(&self, record: &Arc<LogRecord>) {
        self.records.lock().push(Arc::clone(record));
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn set_feedback(&self, _feedback: FeedbackSender) {}

    fn name(&self) -> &str {
        "recording"
    }
}

fn wait_until(condition: impl Fn() -> bool) -> bool {
    wait_within(Duration::from_secs(5), condition)
}

fn wait_within(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

fn rendering_writer(layout: TextLayout) -> (CallbackWriter, Arc<Mutex<Vec<String>>>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lines);
    let writer = CallbackWriter::new(move |record| {
        sink.lock().push(record.to_text(&layout));
        Ok(())
    });
    (writer, lines)
}

#[test]
fn test_records_delivered_in_dispatch_order() -> Result<()> {
    let dispatcher = Dispatcher::new(None)?;
    let writer = Arc::new(Recording::default());
    dispatcher.add_level_writer(LogLevel::Info, writer.clone(), Some("recording"))?;

    for i in 0..500 {
        dispatcher.dispatch(LogRecord::new(LogLevel::Info, format!("record {}", i)));
    }

    let messages = writer.messages();
    assert_eq!(messages.len(), 500);
    for (i, message) in messages.iter().enumerate() {
        assert_eq!(message, &format!("record {}", i));
    }
    assert_eq!(dispatcher.metrics().dispatched(), 500);
    Ok(())
}

#[test]
fn test_async_writer_keeps_order_across_producers() -> Result<()> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let writer = AsyncCallbackWriter::with_capacity(8, move |record| {
        let producer = record.tag("producer").unwrap_or_default();
        sink.lock().push((producer, record.message().to_string()));
        Ok(())
    })?;

    let dispatcher = Arc::new(Dispatcher::new(None)?);
    dispatcher.add_level_writer(LogLevel::Info, Arc::new(writer), None)?;

    let handles: Vec<_> = (0..4)
        .map(|producer| {
            let dispatcher = Arc::clone(&dispatcher);
            thread::spawn(move || {
                for i in 0..100 {
                    let mut record = LogRecord::new(LogLevel::Info, i.to_string());
                    record.set_tag("producer", producer.to_string());
                    dispatcher.dispatch(record);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("producer panicked");
    }
    dispatcher.close();

    let seen = seen.lock();
    assert_eq!(seen.len(), 400);
    for producer in 0..4 {
        let sequence: Vec<u32> = seen
            .iter()
            .filter(|(tag, _)| *tag == producer.to_string())
            .map(|(_, message)| message.parse().expect("numeric message"))
            .collect();
        assert_eq!(sequence, (0..100).collect::<Vec<u32>>());
    }
    Ok(())
}

#[test]
fn test_failing_writer_feeds_back_to_default_only() -> Result<()> {
    let default = Arc::new(Recording::default());
    let bystander = Arc::new(Recording::default());
    let failing = AsyncCallbackWriter::new(|_record| Err("sink unavailable".into()))?;

    let dispatcher = Arc::new(Dispatcher::new(Some(default.clone()))?);
    dispatcher.add_level_writer(LogLevel::Error, bystander.clone(), Some("bystander"))?;
    dispatcher.add_level_writer(LogLevel::Error, Arc::new(failing), Some("failing"))?;

    let logger = Logger::new(Arc::clone(&dispatcher));
    logger.error("payment failed");

    assert!(wait_until(|| dispatcher.metrics().feedback_routed() == 1));
    thread::sleep(Duration::from_millis(50));

    let feedback: Vec<Arc<LogRecord>> = default
        .records
        .lock()
        .iter()
        .filter(|record| record.is_feedback())
        .cloned()
        .collect();
    assert_eq!(feedback.len(), 1);
    assert_eq!(feedback[0].level(), LogLevel::Error);
    assert!(feedback[0].message().contains("sink unavailable"));
    assert!(feedback[0].stack_trace().is_some());

    assert_eq!(bystander.messages(), vec!["payment failed"]);
    assert_eq!(dispatcher.metrics().feedback_routed(), 1);

    dispatcher.close();
    Ok(())
}

#[test]
fn test_feedback_on_muted_default_is_unrouted() -> Result<()> {
    let default = Arc::new(Recording::default());
    let failing = CallbackWriter::new(|_record| Err("disk full".into()));

    let dispatcher = Dispatcher::new(Some(default.clone()))?;
    dispatcher.add_level_writer(LogLevel::Error, Arc::new(failing), None)?;
    dispatcher.mute(LogLevel::Error, true);

    dispatcher.dispatch(LogRecord::new(LogLevel::Error, "write me"));
    assert!(wait_until(|| dispatcher.metrics().feedback_unrouted() == 1));

    assert!(default.records.lock().iter().all(|record| !record.is_feedback()));
    Ok(())
}

#[test]
fn test_slow_default_writer_loses_no_feedback() -> Result<()> {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let slow_default = CallbackWriter::new(move |record| {
        if record.is_feedback() {
            thread::sleep(Duration::from_millis(1_100));
            counter.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    });
    let failing = CallbackWriter::new(|_record| Err("sink down".into()));

    let dispatcher = Dispatcher::builder()
        .default_writer(slow_default)
        .feedback_capacity(1)
        .build()?;
    dispatcher.register_default(LogLevel::Info, None);
    dispatcher.add_level_writer(LogLevel::Info, Arc::new(failing), Some("failing"))?;

    // Each failing write waits for room instead of dropping its feedback
    for i in 0..4 {
        dispatcher.dispatch(LogRecord::new(LogLevel::Info, format!("request {}", i)));
    }

    assert!(wait_within(Duration::from_secs(10), || {
        seen.load(Ordering::SeqCst) == 4
    }));
    assert_eq!(dispatcher.metrics().feedback_routed(), 4);
    assert_eq!(dispatcher.metrics().feedback_dropped(), 0);

    dispatcher.close();
    Ok(())
}

#[test]
fn test_feedback_after_close_is_counted_as_dropped() -> Result<()> {
    let dispatcher = Dispatcher::new(Some(Arc::new(Recording::default())))?;
    let feedback = dispatcher.feedback_sender();
    dispatcher.close();

    assert!(!feedback.send(LogRecord::new(LogLevel::Error, "too late")));
    assert_eq!(dispatcher.metrics().feedback_dropped(), 1);
    Ok(())
}

#[test]
fn test_default_instance_gets_no_feedback_channel() -> Result<()> {
    #[derive(Default)]
    struct Wired {
        feedback: Mutex<Option<FeedbackSender>>,
    }

    impl Writer for Wired {
        fn write(&self, _record: &Arc<LogRecord>) {}

        fn close(&self) {}

        fn set_feedback(&self, feedback: FeedbackSender) {
            *self.feedback.lock() = Some(feedback);
        }
    }

    let shared = Arc::new(Wired::default());
    let dispatcher = Dispatcher::new(Some(shared.clone()))?;
    dispatcher.add_levels_writer(&LogLevel::CRITICAL, shared.clone(), Some("critical"))?;
    assert!(shared.feedback.lock().is_none());

    let other = Arc::new(Wired::default());
    dispatcher.add_level_writer(LogLevel::Info, other.clone(), Some("other"))?;
    assert!(other.feedback.lock().is_some());

    dispatcher.close();
    Ok(())
}

#[test]
fn test_close_twice_closes_each_writer_once() -> Result<()> {
    let shared = Arc::new(Recording::default());
    let dispatcher = Dispatcher::new(Some(shared.clone()))?;
    dispatcher.add_writer(shared.clone(), Some("again"))?;
    dispatcher.add_levels_writer(&LogLevel::CRITICAL, shared.clone(), Some("critical"))?;

    dispatcher.close();
    dispatcher.close();

    assert_eq!(shared.closes.load(Ordering::SeqCst), 1);
    assert!(dispatcher.is_closed());
    Ok(())
}

#[test]
fn test_closed_dispatcher_rejects_work() -> Result<()> {
    let writer = Arc::new(Recording::default());
    let dispatcher = Dispatcher::new(Some(writer.clone()))?;
    dispatcher.close();

    dispatcher.dispatch(LogRecord::new(LogLevel::Info, "late"));
    assert!(writer.records.lock().is_empty());
    assert_eq!(dispatcher.metrics().rejected_after_close(), 1);

    let result = dispatcher.add_writer(Arc::new(Recording::default()), None);
    assert!(matches!(result, Err(LoggerError::DispatcherClosed)));
    assert!(dispatcher.level_state(LogLevel::Info).muted);
    Ok(())
}

#[test]
fn test_default_writer_id_is_reserved() -> Result<()> {
    let dispatcher = Dispatcher::new(None)?;
    let result = dispatcher.add_writer(Arc::new(Recording::default()), Some(DEFAULT_WRITER_ID));
    assert!(matches!(result, Err(LoggerError::ReservedWriterId(_))));
    assert!(dispatcher.level_state(LogLevel::Info).no_writers);
    Ok(())
}

#[test]
fn test_generated_ids_are_unique() -> Result<()> {
    let dispatcher = Dispatcher::new(None)?;
    let first = dispatcher.add_level_writer(LogLevel::Info, Arc::new(Recording::default()), None)?;
    let second = dispatcher.add_writer(Arc::new(Recording::default()), None)?;
    let third = dispatcher.add_level_writer(LogLevel::Info, Arc::new(Recording::default()), None)?;

    assert_ne!(first, second);
    assert_ne!(second, third);
    assert_ne!(first, third);
    assert_eq!(dispatcher.writer_ids(LogLevel::Info).len(), 3);
    Ok(())
}

#[test]
fn test_info_hello_renders_plain_line() -> Result<()> {
    let (writer, lines) = rendering_writer(TextLayout::plain());
    let session = LoggingSession::start(writer)?;

    session.logger().info("hello");

    assert_eq!(*lines.lock(), vec!["INFO: hello"]);
    session.close();
    Ok(())
}

#[test]
fn test_prefix_rendered_from_tags() -> Result<()> {
    let (writer, lines) = rendering_writer(TextLayout::plain());
    let session = LoggingSession::start(writer)?;
    let logger = session.logger();

    logger.set_prefix("%s: %s", ["a", "b"]);
    logger.set_tag("a", "x");
    logger.set_tag("b", "y");
    assert_eq!(logger.context().render_prefix(), "x: y");

    logger.warn("slow response");
    assert_eq!(*lines.lock(), vec!["WARNING [x: y]: slow response"]);
    Ok(())
}

#[test]
fn test_muted_and_empty_levels_skip_delivery() -> Result<()> {
    let writer = Arc::new(Recording::default());
    let dispatcher = Arc::new(Dispatcher::new(None)?);
    dispatcher.add_levels_writer(&[LogLevel::Info, LogLevel::Debug], writer.clone(), None)?;
    let logger = Logger::new(Arc::clone(&dispatcher));

    logger.debug("muted by default");
    logger.warn("no writers");
    logger.info("delivered");

    assert_eq!(writer.messages(), vec!["delivered"]);
    assert_eq!(dispatcher.metrics().dispatched(), 1);
    Ok(())
}

#[test]
fn test_child_logger_cannot_reconfigure() -> Result<()> {
    let writer = Arc::new(Recording::default());
    let dispatcher = Arc::new(Dispatcher::new(Some(writer.clone()))?);
    let root = Logger::new(Arc::clone(&dispatcher));
    let child = root.child();

    assert_eq!(child.add_writer(Arc::new(Recording::default()), None)?, None);
    child.mute(LogLevel::Info, true);
    assert!(!dispatcher.level_state(LogLevel::Info).muted);

    child.set_tag("module", "child");
    child.info("from child");
    assert_eq!(root.context().tag("module"), None);

    let records = writer.records.lock();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].tag("module"), Some("child".to_string()));
    Ok(())
}

#[test]
fn test_retained_record_is_logged_later() -> Result<()> {
    let writer = Arc::new(Recording::default());
    let dispatcher = Arc::new(Dispatcher::new(Some(writer.clone()))?);
    let logger = Logger::new(Arc::clone(&dispatcher));
    logger.set_tag("request", "r-1");

    let mut record = logger.new_record(LogLevel::Info, "checkout");
    record.set_tag("request", "r-2");
    record.set_payload("items", 3);
    record.log();

    assert_eq!(logger.context().tag("request"), Some("r-1".to_string()));
    let records = writer.records.lock();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].tag("request"), Some("r-2".to_string()));
    assert_eq!(records[0].payload_value("items"), Some(serde_json::json!(3)));
    Ok(())
}
