//! Level-keyed dispatch engine
//!
//! The dispatcher owns, per level, the registered writers, the reserved
//! default writer and the level state. It fans records out to the writers of
//! their level, routes writer failures to the default writer of the failing
//! record's level only, and sequences shutdown.

use super::error::{LoggerError, Result};
use super::log_level::{LogLevel, LEVELS_COUNT};
use super::log_record::LogRecord;
use super::metrics::DispatchMetrics;
use super::worker::{panic_message, Worker};
use super::writer::{FeedbackSender, Writer, WriterId, DEFAULT_WRITER_ID};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Exit code used after a Fatal record when none is configured.
pub const DEFAULT_FATAL_EXIT_CODE: i32 = 1;

/// Capacity of the feedback queue.
pub const DEFAULT_FEEDBACK_CAPACITY: usize = 64;

/// How long `close` waits for the feedback queue to drain.
pub const FEEDBACK_DRAIN_TIMEOUT: Duration = Duration::from_secs(3);

/// Snapshot of one level's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LevelState {
    pub muted: bool,
    pub stack_trace: bool,
    pub no_writers: bool,
}

struct LevelSlot {
    writers: HashMap<WriterId, Arc<dyn Writer>>,
    muted: bool,
    stack_trace: bool,
    no_writers: bool,
    next_id: u64,
}

impl LevelSlot {
    fn new(muted: bool, stack_trace: bool) -> Self {
        Self {
            writers: HashMap::new(),
            muted,
            stack_trace,
            no_writers: true,
            next_id: 0,
        }
    }

    fn refresh_no_writers(&mut self) {
        self.no_writers = self.writers.is_empty();
    }
}

type LevelTable = [LevelSlot; LEVELS_COUNT];

/// Dispatcher configuration
///
/// # Example
///
/// ```
/// use rust_logging_core::core::{DispatcherConfig, LogLevel};
///
/// let config: DispatcherConfig =
///     serde_json::from_str(r#"{"fatal_exit_code": 3, "muted_levels": ["Trace"]}"#).unwrap();
///
/// assert_eq!(config.fatal_exit_code, 3);
/// assert_eq!(config.muted_levels, vec![LogLevel::Trace]);
/// assert_eq!(config.feedback_capacity, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Process exit code after a Fatal record
    pub fatal_exit_code: i32,
    /// Bounded capacity of the feedback queue
    pub feedback_capacity: usize,
    /// Wait bound for the feedback queue on close
    pub feedback_drain_timeout: Duration,
    /// Levels muted at start
    pub muted_levels: Vec<LogLevel>,
    /// Levels capturing stack traces at start
    pub stack_trace_levels: Vec<LogLevel>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            fatal_exit_code: DEFAULT_FATAL_EXIT_CODE,
            feedback_capacity: DEFAULT_FEEDBACK_CAPACITY,
            feedback_drain_timeout: FEEDBACK_DRAIN_TIMEOUT,
            muted_levels: LogLevel::DEBUGGING.to_vec(),
            stack_trace_levels: vec![LogLevel::Fatal, LogLevel::Error],
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.feedback_capacity == 0 {
            return Err(LoggerError::config(
                "dispatcher",
                "feedback_capacity must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Routes records to the writers registered for their level.
///
/// # Example
///
/// ```
/// use rust_logging_core::core::{Dispatcher, LogLevel, LogRecord};
/// use rust_logging_core::writers::CallbackWriter;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let count = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&count);
/// let writer = CallbackWriter::new(move |_record| {
///     counter.fetch_add(1, Ordering::SeqCst);
///     Ok(())
/// });
///
/// let dispatcher = Dispatcher::new(Some(Arc::new(writer))).unwrap();
/// dispatcher.dispatch(LogRecord::new(LogLevel::Info, "hello"));
/// dispatcher.close();
///
/// assert_eq!(count.load(Ordering::SeqCst), 1);
/// ```
pub struct Dispatcher {
    levels: Arc<RwLock<LevelTable>>,
    feedback: Worker<LogRecord>,
    feedback_sender: FeedbackSender,
    metrics: Arc<DispatchMetrics>,
    closed: AtomicBool,
    fatal_exit_code: AtomicI32,
    feedback_drain_timeout: Duration,
}

impl Dispatcher {
    /// Dispatcher with the default configuration.
    ///
    /// `default_writer` is installed on every level.
    pub fn new(default_writer: Option<Arc<dyn Writer>>) -> Result<Self> {
        Self::with_config(DispatcherConfig::default(), default_writer)
    }

    pub fn with_config(
        config: DispatcherConfig,
        default_writer: Option<Arc<dyn Writer>>,
    ) -> Result<Self> {
        config.validate()?;

        let levels: LevelTable = std::array::from_fn(|idx| {
            let level = LogLevel::ALL[idx];
            LevelSlot::new(
                config.muted_levels.contains(&level),
                config.stack_trace_levels.contains(&level),
            )
        });
        let levels = Arc::new(RwLock::new(levels));
        let metrics = Arc::new(DispatchMetrics::new());

        let feedback_levels = Arc::clone(&levels);
        let feedback_metrics = Arc::clone(&metrics);
        let feedback = Worker::new(
            "logger-feedback",
            config.feedback_capacity,
            move |record: LogRecord| {
                route_feedback(&feedback_levels, &feedback_metrics, record);
            },
        )?;
        let feedback_sender = FeedbackSender::new(feedback.sender(), Arc::clone(&metrics));

        let dispatcher = Self {
            levels,
            feedback,
            feedback_sender,
            metrics,
            closed: AtomicBool::new(false),
            fatal_exit_code: AtomicI32::new(config.fatal_exit_code),
            feedback_drain_timeout: config.feedback_drain_timeout,
        };
        dispatcher.register_default_all(default_writer);

        Ok(dispatcher)
    }

    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Clear the writers of `level` and install `writer` as its default.
    ///
    /// Removed writers are not closed.
    pub fn register_default(&self, level: LogLevel, writer: Option<Arc<dyn Writer>>) {
        let mut levels = self.levels.write();
        let slot = &mut levels[level.index()];
        slot.writers.clear();
        if let Some(writer) = writer {
            slot.writers.insert(DEFAULT_WRITER_ID.to_string(), writer);
        }
        slot.refresh_no_writers();
    }

    /// [`Dispatcher::register_default`] on every level.
    pub fn register_default_all(&self, writer: Option<Arc<dyn Writer>>) {
        for level in LogLevel::ALL {
            self.register_default(level, writer.clone());
        }
    }

    /// Register `writer` on every level.
    pub fn add_writer(&self, writer: Arc<dyn Writer>, id: Option<&str>) -> Result<WriterId> {
        self.add_levels_writer(&LogLevel::ALL, writer, id)
    }

    pub fn add_level_writer(
        &self,
        level: LogLevel,
        writer: Arc<dyn Writer>,
        id: Option<&str>,
    ) -> Result<WriterId> {
        self.add_levels_writer(&[level], writer, id)
    }

    /// Register `writer` on each of `levels` under one identifier.
    ///
    /// Without `id` a sequence-based identifier unique in every target level
    /// is generated. An existing writer with the same identifier is replaced.
    pub fn add_levels_writer(
        &self,
        levels: &[LogLevel],
        writer: Arc<dyn Writer>,
        id: Option<&str>,
    ) -> Result<WriterId> {
        if id == Some(DEFAULT_WRITER_ID) {
            return Err(LoggerError::ReservedWriterId(DEFAULT_WRITER_ID.to_string()));
        }

        let (id, is_default) = {
            let mut table = self.levels.write();
            // `close` snapshots the writers after setting the flag
            if self.is_closed() {
                return Err(LoggerError::DispatcherClosed);
            }

            let id = match id.filter(|id| !id.is_empty()) {
                Some(id) => id.to_string(),
                None => next_writer_id(&mut table, levels),
            };

            for level in levels {
                let slot = &mut table[level.index()];
                slot.writers.insert(id.clone(), Arc::clone(&writer));
                slot.refresh_no_writers();
            }

            let is_default = table.iter().any(|slot| {
                slot.writers
                    .get(DEFAULT_WRITER_ID)
                    .is_some_and(|default| same_writer(default, &writer))
            });
            (id, is_default)
        };

        // A default writer never reports into the queue it consumes from
        if !is_default {
            writer.set_feedback(self.feedback_sender.clone());
        }
        Ok(id)
    }

    /// Unregister a writer from `level`, returning it.
    pub fn remove_writer(&self, level: LogLevel, id: &str) -> Option<Arc<dyn Writer>> {
        let mut levels = self.levels.write();
        let slot = &mut levels[level.index()];
        let removed = slot.writers.remove(id);
        slot.refresh_no_writers();
        removed
    }

    pub fn mute(&self, level: LogLevel, muted: bool) {
        self.levels.write()[level.index()].muted = muted;
    }

    pub fn enable_stack_trace(&self, level: LogLevel, enabled: bool) {
        self.levels.write()[level.index()].stack_trace = enabled;
    }

    /// State of `level`. Every level reads as muted once closed.
    pub fn level_state(&self, level: LogLevel) -> LevelState {
        let levels = self.levels.read();
        let slot = &levels[level.index()];
        LevelState {
            muted: slot.muted || self.is_closed(),
            stack_trace: slot.stack_trace,
            no_writers: slot.no_writers,
        }
    }

    /// Identifiers registered on `level`.
    pub fn writer_ids(&self, level: LogLevel) -> Vec<WriterId> {
        self.levels.read()[level.index()].writers.keys().cloned().collect()
    }

    /// Deliver `record` to every writer of its level.
    ///
    /// A Fatal record is delivered, then the dispatcher closes and the
    /// process exits with the configured exit code.
    pub fn dispatch(&self, record: LogRecord) {
        if record.level() == LogLevel::Fatal {
            self.dispatch_fatal(record);
        }

        if self.is_closed() {
            self.metrics.record_rejected_after_close();
            return;
        }

        self.deliver(&Arc::new(record));
    }

    /// Deliver a Fatal record, close, and exit the process.
    pub fn dispatch_fatal(&self, record: LogRecord) -> ! {
        if !self.is_closed() {
            self.deliver(&Arc::new(record));
        }
        self.terminate()
    }

    /// Close and exit the process with the fatal exit code.
    pub fn terminate(&self) -> ! {
        self.close();
        std::process::exit(self.fatal_exit_code())
    }

    /// Entry point of a process supervisor reporting an uncaught fault.
    pub fn log_fatal_trace(&self, text: impl Into<String>, stack_trace: impl Into<String>) -> ! {
        let record =
            LogRecord::new(LogLevel::Fatal, text).with_stack_trace(Some(stack_trace.into()));
        self.dispatch_fatal(record)
    }

    fn deliver(&self, record: &Arc<LogRecord>) {
        self.metrics.record_dispatched();

        let writers: Vec<(bool, Arc<dyn Writer>)> = {
            let levels = self.levels.read();
            levels[record.level().index()]
                .writers
                .iter()
                .map(|(id, writer)| (id == DEFAULT_WRITER_ID, Arc::clone(writer)))
                .collect()
        };

        for (is_default, writer) in &writers {
            let result =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| writer.write(record)));

            if let Err(panic_info) = result {
                let message = format!(
                    "Writer '{}' panicked: {}",
                    writer.name(),
                    panic_message(panic_info.as_ref())
                );

                if *is_default || record.is_feedback() {
                    eprintln!("[LOGGER CRITICAL] {}", message);
                } else {
                    self.feedback_sender.send(LogRecord::error(message));
                }
            }
        }

        self.metrics.record_delivered(writers.len() as u64);
    }

    /// Close feedback, then every distinct writer once. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.feedback.close(self.feedback_drain_timeout);

        let writers: Vec<Arc<dyn Writer>> = {
            let levels = self.levels.read();
            let mut seen = HashSet::new();
            levels
                .iter()
                .flat_map(|slot| slot.writers.values())
                .filter(|writer| seen.insert(writer_addr(writer)))
                .cloned()
                .collect()
        };

        for writer in writers {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| writer.close()));
            if let Err(panic_info) = result {
                eprintln!(
                    "[LOGGER CRITICAL] Writer '{}' panicked during close: {}",
                    writer.name(),
                    panic_message(panic_info.as_ref())
                );
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn fatal_exit_code(&self) -> i32 {
        self.fatal_exit_code.load(Ordering::Relaxed)
    }

    pub fn set_fatal_exit_code(&self, code: i32) {
        self.fatal_exit_code.store(code, Ordering::Relaxed);
    }

    /// Producer handle on the feedback queue, for writers managed outside
    /// the dispatcher.
    pub fn feedback_sender(&self) -> FeedbackSender {
        self.feedback_sender.clone()
    }

    pub fn metrics(&self) -> &DispatchMetrics {
        &self.metrics
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.close();
    }
}

fn writer_addr(writer: &Arc<dyn Writer>) -> usize {
    Arc::as_ptr(writer) as *const () as usize
}

fn same_writer(a: &Arc<dyn Writer>, b: &Arc<dyn Writer>) -> bool {
    writer_addr(a) == writer_addr(b)
}

fn next_writer_id(table: &mut LevelTable, levels: &[LogLevel]) -> WriterId {
    let first = levels.first().map(|level| level.index()).unwrap_or(0);

    loop {
        let slot = &mut table[first];
        let id = format!("writer-{}", slot.next_id);
        slot.next_id += 1;

        if levels
            .iter()
            .all(|level| !table[level.index()].writers.contains_key(&id))
        {
            return id;
        }
    }
}

/// Deliver a feedback record to the default writer of its level only.
fn route_feedback(levels: &RwLock<LevelTable>, metrics: &DispatchMetrics, record: LogRecord) {
    let writer = {
        let levels = levels.read();
        let slot = &levels[record.level().index()];
        if slot.muted {
            None
        } else {
            slot.writers.get(DEFAULT_WRITER_ID).cloned()
        }
    };

    let writer = match writer {
        Some(writer) => writer,
        None => {
            metrics.record_feedback_unrouted();
            return;
        }
    };

    let record = Arc::new(record);
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| writer.write(&record)));
    match result {
        Ok(()) => {
            metrics.record_feedback_routed();
        }
        Err(panic_info) => {
            eprintln!(
                "[LOGGER CRITICAL] Default writer '{}' panicked on feedback record: {}",
                writer.name(),
                panic_message(panic_info.as_ref())
            );
        }
    }
}

/// Builder for constructing a Dispatcher with a fluent API
///
/// # Example
///
/// ```
/// use rust_logging_core::core::{Dispatcher, LogLevel};
/// use rust_logging_core::writers::ConsoleWriter;
///
/// let dispatcher = Dispatcher::builder()
///     .default_writer(ConsoleWriter::new())
///     .mute(LogLevel::Debug, false)
///     .stack_trace(LogLevel::Warning, true)
///     .fatal_exit_code(2)
///     .build()
///     .unwrap();
///
/// assert!(!dispatcher.level_state(LogLevel::Debug).muted);
/// assert_eq!(dispatcher.fatal_exit_code(), 2);
/// ```
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    default_writer: Option<Arc<dyn Writer>>,
    writers: Vec<(Vec<LogLevel>, Arc<dyn Writer>, Option<String>)>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            config: DispatcherConfig::default(),
            default_writer: None,
            writers: Vec::new(),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn default_writer<W: Writer + 'static>(mut self, writer: W) -> Self {
        self.default_writer = Some(Arc::new(writer));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn shared_default_writer(mut self, writer: Arc<dyn Writer>) -> Self {
        self.default_writer = Some(writer);
        self
    }

    /// Register a writer on `levels` with a generated identifier.
    #[must_use = "builder methods return a new value"]
    pub fn writer<W: Writer + 'static>(mut self, levels: &[LogLevel], writer: W) -> Self {
        self.writers.push((levels.to_vec(), Arc::new(writer), None));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn shared_writer(
        mut self,
        levels: &[LogLevel],
        writer: Arc<dyn Writer>,
        id: impl Into<String>,
    ) -> Self {
        self.writers.push((levels.to_vec(), writer, Some(id.into())));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn fatal_exit_code(mut self, code: i32) -> Self {
        self.config.fatal_exit_code = code;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn feedback_capacity(mut self, capacity: usize) -> Self {
        self.config.feedback_capacity = capacity;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn mute(mut self, level: LogLevel, muted: bool) -> Self {
        toggle(&mut self.config.muted_levels, level, muted);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn stack_trace(mut self, level: LogLevel, enabled: bool) -> Self {
        toggle(&mut self.config.stack_trace_levels, level, enabled);
        self
    }

    pub fn build(self) -> Result<Dispatcher> {
        let dispatcher = Dispatcher::with_config(self.config, self.default_writer)?;
        for (levels, writer, id) in self.writers {
            dispatcher.add_levels_writer(&levels, writer, id.as_deref())?;
        }
        Ok(dispatcher)
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn toggle(levels: &mut Vec<LogLevel>, level: LogLevel, on: bool) {
    levels.retain(|l| *l != level);
    if on {
        levels.push(level);
    }
}
