//! Output format configuration for writers
//!
//! Provides the two renderings writers can choose from:
//! - Text: `[timestamp ]LEVEL [prefix]: message[\nstack trace\n]`
//! - Json: one JSON object per line

use super::log_record::LogRecord;
use super::timestamp::TimestampFormat;
use serde::{Deserialize, Serialize};

/// Which optional parts a text line carries.
///
/// # Examples
///
/// ```
/// use rust_logging_core::core::{LogLevel, LogRecord, TextLayout};
///
/// let record = LogRecord::new(LogLevel::Info, "hello");
/// assert_eq!(record.to_text(&TextLayout::plain()), "INFO: hello");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextLayout {
    /// Leading timestamp, omitted when `None`
    pub timestamp: Option<TimestampFormat>,
    /// Append the stack trace of records that carry one
    pub stack_trace: bool,
}

impl Default for TextLayout {
    fn default() -> Self {
        Self {
            timestamp: Some(TimestampFormat::Classic),
            stack_trace: true,
        }
    }
}

impl TextLayout {
    /// Level, prefix and message only.
    pub fn plain() -> Self {
        Self {
            timestamp: None,
            stack_trace: false,
        }
    }

    #[must_use]
    pub fn with_timestamp(mut self, format: TimestampFormat) -> Self {
        self.timestamp = Some(format);
        self
    }

    #[must_use]
    pub fn without_timestamp(mut self) -> Self {
        self.timestamp = None;
        self
    }

    #[must_use]
    pub fn with_stack_trace(mut self, enabled: bool) -> Self {
        self.stack_trace = enabled;
        self
    }
}

/// Output format for writers that support both renderings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text line
    Text(TextLayout),

    /// JSON object per line
    ///
    /// Example: `{"timestamp":"2025-01-08T10:30:45Z","level":"Info","message":"Request processed",...}`
    Json,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Text(TextLayout::default())
    }
}

impl OutputFormat {
    /// Render a record without the trailing newline.
    pub fn format(&self, record: &LogRecord) -> String {
        match self {
            OutputFormat::Text(layout) => record.to_text(layout),
            OutputFormat::Json => Self::format_json(record),
        }
    }

    fn format_json(record: &LogRecord) -> String {
        match serde_json::to_string(record) {
            Ok(json) => json,
            Err(e) => {
                // Serializing owned strings and JSON values cannot normally fail
                eprintln!("[LOGGER ERROR] Failed to serialize record: {}", e);
                record.to_text(&TextLayout::default())
            }
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}
