//! Syslog writer (unix only)
//!
//! Sends every record, rendered as text without a timestamp, to syslog with
//! a severity derived from the record level. The local daemon socket is used
//! by default; a custom unix socket or a UDP collector can be chosen instead.

use super::base::{FeedbackSlot, Lifecycle};
use crate::core::{FeedbackSender, LogLevel, LogRecord, LoggerError, Result, TextLayout, Writer};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use ::syslog::{Formatter3164, Logger, LoggerBackend};

pub use ::syslog::Facility;

/// Where syslog messages are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyslogTransport {
    /// The local daemon (`/dev/log` or the platform equivalent)
    Local,
    /// A unix datagram socket at the given path
    Socket(PathBuf),
    /// A remote collector over UDP, sent from `local`
    Udp { local: SocketAddr, server: SocketAddr },
}

/// Syslog severity of `level`.
pub fn severity(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Fatal => "crit",
        LogLevel::Error => "err",
        LogLevel::Warning => "warning",
        LogLevel::Info => "info",
        LogLevel::Debug | LogLevel::Trace => "debug",
    }
}

/// Synchronous syslog writer.
///
/// # Example
///
/// ```no_run
/// use rust_logging_core::writers::SyslogWriter;
///
/// let writer = SyslogWriter::new("billing").expect("syslog unavailable");
/// ```
pub struct SyslogWriter {
    logger: Mutex<Logger<LoggerBackend, Formatter3164>>,
    layout: TextLayout,
    lifecycle: Lifecycle,
    feedback: FeedbackSlot,
}

impl SyslogWriter {
    /// Connect to the local syslog daemon with the `user` facility.
    ///
    /// An empty `tag` uses the program name.
    pub fn new(tag: &str) -> Result<Self> {
        Self::connect(tag, Facility::LOG_USER, SyslogTransport::Local)
    }

    pub fn connect(tag: &str, facility: Facility, transport: SyslogTransport) -> Result<Self> {
        let formatter = Formatter3164 {
            facility,
            hostname: None,
            process: process_tag(tag),
            pid: std::process::id(),
        };

        let connected = match &transport {
            SyslogTransport::Local => ::syslog::unix(formatter),
            SyslogTransport::Socket(path) => ::syslog::unix_custom(formatter, path),
            SyslogTransport::Udp { local, server } => {
                ::syslog::udp(formatter, *local, *server)
            }
        };
        let logger = connected.map_err(|e| {
            LoggerError::writer(format!("syslog connection {:?} failed: {}", transport, e))
        })?;

        let lifecycle = Lifecycle::new();
        lifecycle.open();

        Ok(Self {
            logger: Mutex::new(logger),
            layout: TextLayout::default().without_timestamp(),
            lifecycle,
            feedback: FeedbackSlot::new(),
        })
    }

    fn send(&self, record: &LogRecord) -> Result<()> {
        let text = record.to_text(&self.layout);
        let mut logger = self.logger.lock();

        let sent = match record.level() {
            LogLevel::Fatal => logger.crit(text),
            LogLevel::Error => logger.err(text),
            LogLevel::Warning => logger.warning(text),
            LogLevel::Info => logger.info(text),
            LogLevel::Debug | LogLevel::Trace => logger.debug(text),
        };
        sent.map_err(|e| {
            LoggerError::writer(format!(
                "syslog {} message not sent: {}",
                severity(record.level()),
                e
            ))
        })
    }
}

fn process_tag(tag: &str) -> String {
    if !tag.is_empty() {
        return tag.to_string();
    }
    std::env::args_os()
        .next()
        .and_then(|program| {
            std::path::Path::new(&program)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "rust-logging-core".to_string())
}

impl Writer for SyslogWriter {
    fn write(&self, record: &Arc<LogRecord>) {
        if !self.lifecycle.is_open() {
            return;
        }
        if let Err(e) = self.send(record) {
            self.feedback.report_failure(record, e);
        }
    }

    fn close(&self) {
        self.lifecycle.close();
    }

    fn set_feedback(&self, feedback: FeedbackSender) {
        self.feedback.set(feedback);
    }

    fn name(&self) -> &str {
        "syslog"
    }
}
