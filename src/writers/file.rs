//! File writer implementation

use super::base::{FeedbackSlot, Lifecycle};
use crate::core::{
    FeedbackSender, LogRecord, LoggerError, OutputFormat, Result, TimestampFormat, Writer,
};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Synchronous append-only file writer.
pub struct FileWriter {
    path: PathBuf,
    file: Mutex<Option<BufWriter<File>>>,
    output_format: OutputFormat,
    lifecycle: Lifecycle,
    feedback: FeedbackSlot,
}

impl FileWriter {
    /// Open (or create) `path` for appending.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = open_append(&path)?;

        let lifecycle = Lifecycle::new();
        lifecycle.open();

        Ok(Self {
            path,
            file: Mutex::new(Some(BufWriter::new(file))),
            output_format: OutputFormat::default(),
            lifecycle,
            feedback: FeedbackSlot::new(),
        })
    }

    /// Set the output format for this writer
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rust_logging_core::writers::FileWriter;
    /// use rust_logging_core::core::OutputFormat;
    ///
    /// let writer = FileWriter::new("/var/log/app.log")
    ///     .unwrap()
    ///     .with_output_format(OutputFormat::Json);
    /// ```
    #[must_use]
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        if let OutputFormat::Text(layout) = &mut self.output_format {
            layout.timestamp = Some(format);
        }
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, record: &LogRecord) -> Result<()> {
        let mut guard = self.file.lock();
        let file = guard
            .as_mut()
            .ok_or_else(|| LoggerError::file_writer(self.path.display().to_string(), "file closed"))?;

        let mut line = self.output_format.format(record);
        line.push('\n');
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

pub(crate) fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| LoggerError::file_writer(path.display().to_string(), e.to_string()))
}

impl Writer for FileWriter {
    fn write(&self, record: &Arc<LogRecord>) {
        if !self.lifecycle.is_open() {
            return;
        }
        if let Err(e) = self.append(record) {
            self.feedback.report_failure(record, e);
        }
    }

    fn close(&self) {
        if !self.lifecycle.close() {
            return;
        }
        if let Some(mut file) = self.file.lock().take() {
            if let Err(e) = file.flush() {
                eprintln!(
                    "[LOGGER ERROR] Failed to flush '{}' on close: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }

    fn set_feedback(&self, feedback: FeedbackSender) {
        self.feedback.set(feedback);
    }

    fn name(&self) -> &str {
        "file"
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        self.close();
    }
}
