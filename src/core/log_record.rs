//! Log record structure

use super::log_context::LogContext;
use super::log_level::LogLevel;
use super::logger::Logger;
use super::output_format::TextLayout;
use super::stack::{capture_stack_trace, first_frame};
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// One log entry.
///
/// Records handed to writers are never mutated again. Records obtained from
/// `Logger::new_record` carry their own detached context and a handle on the
/// logger, so the caller can enrich them and submit them later with
/// [`LogRecord::log`].
pub struct LogRecord {
    timestamp: DateTime<Utc>,
    level: LogLevel,
    message: String,
    stack_trace: Option<String>,
    prefix: Option<String>,
    context: LogContext,
    fingerprint_data: String,
    fingerprint: OnceLock<String>,
    feedback: bool,
    logger: Option<Logger>,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            stack_trace: None,
            prefix: None,
            context: LogContext::new(),
            fingerprint_data: String::new(),
            fingerprint: OnceLock::new(),
            feedback: false,
            logger: None,
        }
    }

    /// Error-level record describing `err`, with the stack of the caller.
    pub fn error(err: impl fmt::Display) -> Self {
        Self::error_with_stack(err, 0)
    }

    /// Like [`LogRecord::error`], skipping `skip` more frames of the caller.
    pub fn error_with_stack(err: impl fmt::Display, skip: usize) -> Self {
        let mut record = Self::new(LogLevel::Error, err.to_string());
        record.stack_trace = Some(capture_stack_trace(skip));
        record
    }

    #[must_use]
    pub fn with_stack_trace(mut self, stack_trace: Option<String>) -> Self {
        self.stack_trace = stack_trace;
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: LogContext) -> Self {
        self.context = context;
        self
    }

    /// Use a fixed, already rendered prefix instead of the context template.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub(crate) fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub(crate) fn into_feedback(mut self) -> Self {
        self.feedback = true;
        self.logger = None;
        self
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stack_trace(&self) -> Option<&str> {
        self.stack_trace.as_deref()
    }

    /// The injected prefix, or the context template rendered now.
    pub fn prefix(&self) -> String {
        match &self.prefix {
            Some(prefix) => prefix.clone(),
            None => self.context.render_prefix(),
        }
    }

    pub fn tag(&self, name: &str) -> Option<String> {
        self.context.tag(name)
    }

    pub fn tags(&self) -> HashMap<String, String> {
        self.context.tags()
    }

    pub fn payload_value(&self, key: &str) -> Option<Value> {
        self.context.payload_value(key)
    }

    pub fn payload(&self) -> HashMap<String, Value> {
        self.context.payload()
    }

    pub fn context(&self) -> &LogContext {
        &self.context
    }

    /// Whether the record reports a writer failure.
    pub fn is_feedback(&self) -> bool {
        self.feedback
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    pub fn set_stack_trace(&mut self, stack_trace: impl Into<String>) {
        self.stack_trace = Some(stack_trace.into());
        self.fingerprint = OnceLock::new();
    }

    /// Replace the stack trace with the stack of the caller.
    pub fn generate_stack_trace(&mut self, skip: usize) {
        self.set_stack_trace(capture_stack_trace(skip));
    }

    pub fn set_tag(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.context.set_tag(name, value);
    }

    pub fn set_payload(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.context.set_payload(key, value);
    }

    pub fn set_prefix<I, S>(&mut self, format: impl Into<String>, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefix = None;
        self.context.set_prefix(format, tags);
    }

    /// Add data to the fingerprint computation.
    pub fn update_fingerprint(&mut self, data: impl fmt::Display) {
        if !self.fingerprint_data.is_empty() {
            self.fingerprint_data.push(' ');
        }
        self.fingerprint_data.push_str(&data.to_string());
        self.fingerprint = OnceLock::new();
    }

    /// MD5 of the first stack frame plus the data added with
    /// [`LogRecord::update_fingerprint`], as lowercase hex.
    ///
    /// Empty when there is neither a stack trace nor fingerprint data. The
    /// hash is computed once and cached.
    pub fn fingerprint(&self) -> &str {
        self.fingerprint.get_or_init(|| {
            compute_fingerprint(self.stack_trace.as_deref(), &self.fingerprint_data)
        })
    }

    /// Submit the record through the logger that created it.
    ///
    /// Does nothing for records that were not created by a logger.
    pub fn log(mut self) {
        if let Some(logger) = self.logger.take() {
            logger.log_record(self);
        }
    }

    /// Render as `[timestamp ]LEVEL [prefix]: message[\nstack trace\n]`.
    pub fn to_text(&self, layout: &TextLayout) -> String {
        let mut text = String::with_capacity(self.message.len() + 48);

        if let Some(format) = &layout.timestamp {
            text.push_str(&format.format(&self.timestamp));
            text.push(' ');
        }

        text.push_str(self.level.to_str());

        let prefix = self.prefix();
        if !prefix.is_empty() {
            text.push_str(" [");
            text.push_str(&prefix);
            text.push(']');
        }

        text.push_str(": ");
        text.push_str(&self.message);

        if layout.stack_trace {
            if let Some(stack_trace) = &self.stack_trace {
                text.push('\n');
                text.push_str(stack_trace);
                text.push('\n');
            }
        }

        text
    }
}

fn compute_fingerprint(stack_trace: Option<&str>, data: &str) -> String {
    let raw = match stack_trace.and_then(first_frame) {
        Some(frame) => format!("{} {}", frame, data),
        None => data.to_string(),
    };

    if raw.is_empty() {
        return String::new();
    }

    format!("{:x}", Md5::digest(raw.as_bytes()))
}

impl fmt::Debug for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogRecord")
            .field("timestamp", &self.timestamp)
            .field("level", &self.level)
            .field("message", &self.message)
            .field("stack_trace", &self.stack_trace)
            .field("prefix", &self.prefix)
            .field("context", &self.context)
            .field("feedback", &self.feedback)
            .finish()
    }
}

impl Serialize for LogRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("LogRecord", 8)?;
        state.serialize_field("timestamp", &self.timestamp)?;
        state.serialize_field("level", &self.level)?;
        state.serialize_field("message", &self.message)?;
        state.serialize_field("prefix", &self.prefix())?;
        state.serialize_field("stack_trace", &self.stack_trace)?;
        state.serialize_field("tags", &self.tags())?;
        state.serialize_field("payload", &self.payload())?;
        state.serialize_field("fingerprint", self.fingerprint())?;
        state.end()
    }
}
