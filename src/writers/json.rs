//! JSON writer for structured logging

use super::file::FileWriter;
use crate::core::{FeedbackSender, LogRecord, OutputFormat, Result, Writer};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// JSON file writer for structured logging
///
/// Writes each record as a single-line JSON object (JSONL format) with its
/// tags, payload and fingerprint. Compatible with log aggregation tools like
/// ELK or Loki.
pub struct JsonWriter {
    file: FileWriter,
}

impl JsonWriter {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            file: FileWriter::new(path)?.with_output_format(OutputFormat::Json),
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl Writer for JsonWriter {
    fn write(&self, record: &Arc<LogRecord>) {
        self.file.write(record);
    }

    fn close(&self) {
        self.file.close();
    }

    fn set_feedback(&self, feedback: FeedbackSender) {
        self.file.set_feedback(feedback);
    }

    fn name(&self) -> &str {
        "json"
    }
}
