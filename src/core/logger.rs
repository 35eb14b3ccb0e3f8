//! Context-bearing logger facade over a dispatcher

use super::dispatcher::{Dispatcher, LevelState};
use super::error::Result;
use super::log_context::LogContext;
use super::log_level::LogLevel;
use super::log_record::LogRecord;
use super::stack::{capture_stack_trace, STACK_SKIP_FRAMES};
use super::writer::{Writer, WriterId};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Emits records through a shared [`Dispatcher`].
///
/// The root logger may reconfigure writers and level state. Loggers derived
/// with [`Logger::child`] or [`Logger::alias`] share the dispatcher but their
/// configuration calls are no-ops; emitting and context changes stay local.
///
/// # Example
///
/// ```
/// use rust_logging_core::prelude::*;
/// use std::sync::Arc;
///
/// let dispatcher = Arc::new(Dispatcher::new(Some(Arc::new(ConsoleWriter::new()))).unwrap());
/// let logger = Logger::new(Arc::clone(&dispatcher));
///
/// let db = logger.child();
/// db.set_prefix("db %s", ["peer"]);
/// db.set_tag("peer", "10.0.0.7");
/// db.warn("slow query");
///
/// dispatcher.close();
/// ```
pub struct Logger {
    dispatcher: Arc<Dispatcher>,
    context: LogContext,
    root: bool,
}

impl Logger {
    /// Root logger of `dispatcher`.
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            context: LogContext::new(),
            root: true,
        }
    }

    /// Child with a deep copy of this logger's context.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            context: self.context.detached(),
            root: false,
        }
    }

    /// Child sharing this logger's context.
    #[must_use]
    pub fn alias(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            context: self.context.alias(),
            root: false,
        }
    }

    pub fn is_root(&self) -> bool {
        self.root
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn level_state(&self, level: LogLevel) -> LevelState {
        self.dispatcher.level_state(level)
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(level, None, message);
    }

    /// Log with a stack trace captured elsewhere.
    pub fn log_with_stack_trace(
        &self,
        level: LogLevel,
        stack_trace: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.emit(level, Some(stack_trace.into()), message);
    }

    #[inline]
    pub fn error(&self, message: impl Into<String>) {
        self.emit(LogLevel::Error, None, message);
    }

    #[inline]
    pub fn warn(&self, message: impl Into<String>) {
        self.emit(LogLevel::Warning, None, message);
    }

    #[inline]
    pub fn info(&self, message: impl Into<String>) {
        self.emit(LogLevel::Info, None, message);
    }

    #[inline]
    pub fn debug(&self, message: impl Into<String>) {
        self.emit(LogLevel::Debug, None, message);
    }

    #[inline]
    pub fn trace(&self, message: impl Into<String>) {
        self.emit(LogLevel::Trace, None, message);
    }

    /// Log at Fatal level and exit the process.
    ///
    /// The process exits even when the Fatal level is muted.
    pub fn fatal(&self, message: impl Into<String>) -> ! {
        self.emit_fatal(None, message)
    }

    /// Log an uncaught fault reported by a process supervisor and exit.
    pub fn fatal_trace(&self, message: impl Into<String>, stack_trace: impl Into<String>) -> ! {
        self.emit_fatal(Some(stack_trace.into()), message)
    }

    fn emit(&self, level: LogLevel, stack_trace: Option<String>, message: impl Into<String>) {
        if level == LogLevel::Fatal {
            self.emit_fatal(stack_trace, message);
        }

        let state = self.dispatcher.level_state(level);
        if state.muted || state.no_writers {
            return;
        }

        let record = self.build_record(level, state, stack_trace, message);
        self.dispatcher.dispatch(record);
    }

    fn emit_fatal(&self, stack_trace: Option<String>, message: impl Into<String>) -> ! {
        let state = self.dispatcher.level_state(LogLevel::Fatal);
        if state.muted || state.no_writers {
            self.dispatcher.terminate();
        }

        let record = self.build_record(LogLevel::Fatal, state, stack_trace, message);
        self.dispatcher.dispatch_fatal(record)
    }

    fn build_record(
        &self,
        level: LogLevel,
        state: LevelState,
        stack_trace: Option<String>,
        message: impl Into<String>,
    ) -> LogRecord {
        let stack_trace = stack_trace.or_else(|| {
            state
                .stack_trace
                .then(|| capture_stack_trace(STACK_SKIP_FRAMES))
        });

        let mut record = LogRecord::new(level, message)
            .with_stack_trace(stack_trace)
            .with_context(self.context.alias());

        let prefix = self.context.render_prefix();
        if !prefix.is_empty() {
            record = record.with_prefix(prefix);
        }
        record
    }

    /// A record carrying its own copy of the context, to be enriched and
    /// submitted later with [`LogRecord::log`].
    pub fn new_record(&self, level: LogLevel, message: impl Into<String>) -> LogRecord {
        let stack_trace = self
            .dispatcher
            .level_state(level)
            .stack_trace
            .then(|| capture_stack_trace(STACK_SKIP_FRAMES));

        LogRecord::new(level, message)
            .with_stack_trace(stack_trace)
            .with_context(self.context.detached())
            .with_logger(self.handle())
    }

    /// Error-level record describing `err`, to be submitted later.
    pub fn new_error(&self, err: impl fmt::Display) -> LogRecord {
        LogRecord::error_with_stack(err, STACK_SKIP_FRAMES)
            .with_context(self.context.detached())
            .with_logger(self.handle())
    }

    /// Submit a record built earlier.
    pub fn log_record(&self, record: LogRecord) {
        if record.level() == LogLevel::Fatal {
            self.dispatcher.dispatch_fatal(record);
        }

        let state = self.dispatcher.level_state(record.level());
        if state.muted || state.no_writers {
            return;
        }
        self.dispatcher.dispatch(record);
    }

    fn handle(&self) -> Logger {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            context: self.context.alias(),
            root: false,
        }
    }

    pub fn context(&self) -> &LogContext {
        &self.context
    }

    pub fn set_tag(&self, name: impl Into<String>, value: impl Into<String>) {
        self.context.set_tag(name, value);
    }

    pub fn remove_tag(&self, name: &str) {
        self.context.remove_tag(name);
    }

    pub fn set_payload(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.context.set_payload(key, value);
    }

    pub fn remove_payload(&self, key: &str) {
        self.context.remove_payload(key);
    }

    /// Set the prefix template and the tag names filling its placeholders.
    pub fn set_prefix<I, S>(&self, format: impl Into<String>, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context.set_prefix(format, tags);
    }

    /// Register `writer` on every level. `Ok(None)` on non-root loggers.
    pub fn add_writer(&self, writer: Arc<dyn Writer>, id: Option<&str>) -> Result<Option<WriterId>> {
        if !self.root {
            return Ok(None);
        }
        self.dispatcher.add_writer(writer, id).map(Some)
    }

    pub fn add_level_writer(
        &self,
        level: LogLevel,
        writer: Arc<dyn Writer>,
        id: Option<&str>,
    ) -> Result<Option<WriterId>> {
        if !self.root {
            return Ok(None);
        }
        self.dispatcher.add_level_writer(level, writer, id).map(Some)
    }

    pub fn add_levels_writer(
        &self,
        levels: &[LogLevel],
        writer: Arc<dyn Writer>,
        id: Option<&str>,
    ) -> Result<Option<WriterId>> {
        if !self.root {
            return Ok(None);
        }
        self.dispatcher.add_levels_writer(levels, writer, id).map(Some)
    }

    pub fn remove_writer(&self, level: LogLevel, id: &str) -> Option<Arc<dyn Writer>> {
        if !self.root {
            return None;
        }
        self.dispatcher.remove_writer(level, id)
    }

    pub fn register_default(&self, level: LogLevel, writer: Option<Arc<dyn Writer>>) {
        if self.root {
            self.dispatcher.register_default(level, writer);
        }
    }

    pub fn register_default_all(&self, writer: Option<Arc<dyn Writer>>) {
        if self.root {
            self.dispatcher.register_default_all(writer);
        }
    }

    pub fn mute(&self, level: LogLevel, muted: bool) {
        if self.root {
            self.dispatcher.mute(level, muted);
        }
    }

    pub fn enable_stack_trace(&self, level: LogLevel, enabled: bool) {
        if self.root {
            self.dispatcher.enable_stack_trace(level, enabled);
        }
    }

    /// Close the dispatcher. No-op on non-root loggers.
    pub fn close(&self) {
        if self.root {
            self.dispatcher.close();
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("root", &self.root)
            .field("context", &self.context)
            .finish()
    }
}
