//! Console writer implementation

use super::base::{FeedbackSlot, Lifecycle};
use crate::core::{FeedbackSender, LogRecord, OutputFormat, TextLayout, TimestampFormat, Writer};
use colored::Colorize;
use std::io::Write;
use std::sync::Arc;

/// Synchronous writer to the standard streams.
///
/// Fatal, Error and Warning records go to stderr, the others to stdout.
pub struct ConsoleWriter {
    use_colors: bool,
    output_format: OutputFormat,
    lifecycle: Lifecycle,
    feedback: FeedbackSlot,
}

impl ConsoleWriter {
    pub fn new() -> Self {
        let lifecycle = Lifecycle::new();
        lifecycle.open();
        Self {
            use_colors: true,
            output_format: OutputFormat::default(),
            lifecycle,
            feedback: FeedbackSlot::new(),
        }
    }

    #[must_use]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    /// Set the output format for this writer
    ///
    /// # Example
    ///
    /// ```
    /// use rust_logging_core::writers::ConsoleWriter;
    /// use rust_logging_core::core::{OutputFormat, TextLayout};
    ///
    /// let writer = ConsoleWriter::new()
    ///     .with_output_format(OutputFormat::Text(TextLayout::plain()));
    /// ```
    #[must_use]
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Set the timestamp format of text lines
    ///
    /// # Examples
    ///
    /// ```
    /// use rust_logging_core::writers::ConsoleWriter;
    /// use rust_logging_core::core::TimestampFormat;
    ///
    /// let writer = ConsoleWriter::new()
    ///     .with_timestamp_format(TimestampFormat::Iso8601);
    /// ```
    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        if let OutputFormat::Text(layout) = &mut self.output_format {
            layout.timestamp = Some(format);
        }
        self
    }

    /// Text lines without timestamps
    #[must_use]
    pub fn without_timestamp(mut self) -> Self {
        if let OutputFormat::Text(layout) = &mut self.output_format {
            layout.timestamp = None;
        }
        self
    }

    fn format_record(&self, record: &LogRecord) -> String {
        match &self.output_format {
            OutputFormat::Text(layout) if self.use_colors => format_colored(record, layout),
            format => format.format(record),
        }
    }
}

/// Same layout as `LogRecord::to_text` with a colored level name.
fn format_colored(record: &LogRecord, layout: &TextLayout) -> String {
    let level = record.level().to_str();
    let plain = record.to_text(layout);

    let level_start = layout
        .timestamp
        .as_ref()
        .map(|format| format.format(&record.timestamp()).len() + 1)
        .unwrap_or(0);

    match plain.get(level_start..level_start + level.len()) {
        Some(found) if found == level => format!(
            "{}{}{}",
            &plain[..level_start],
            level.color(record.level().color_code()),
            &plain[level_start + level.len()..]
        ),
        _ => plain,
    }
}

impl Default for ConsoleWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer for ConsoleWriter {
    fn write(&self, record: &Arc<LogRecord>) {
        if !self.lifecycle.is_open() {
            return;
        }

        let output = self.format_record(record);

        let result = if record.level().is_critical() {
            writeln!(std::io::stderr().lock(), "{}", output)
        } else {
            writeln!(std::io::stdout().lock(), "{}", output)
        };

        if let Err(e) = result {
            self.feedback.report_failure(record, e);
        }
    }

    fn close(&self) {
        if self.lifecycle.close() {
            let _ = std::io::stdout().flush();
            let _ = std::io::stderr().flush();
        }
    }

    fn set_feedback(&self, feedback: FeedbackSender) {
        self.feedback.set(feedback);
    }

    fn name(&self) -> &str {
        "console"
    }
}
