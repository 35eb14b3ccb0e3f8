//! # Rust Logging Core
//!
//! A level-keyed structured logging core: loggers build records, a dispatcher
//! routes them to per-level sets of pluggable writers, and writer failures are
//! fed back as records to each level's default writer instead of being lost
//! or looping.
//!
//! ## Features
//!
//! - **Per-level routing**: every level has its own writer set, mute flag and
//!   stack trace flag
//! - **Asynchronous writers**: a generic bounded worker turns any synchronous
//!   sink into a non-blocking one with bounded shutdown
//! - **Feedback-safe errors**: delivery failures become Error records routed
//!   only to the level's default writer
//! - **Structured context**: tags, payload and prefixes shared between loggers
//!   by alias or copied by clone
//!
//! ## Example
//!
//! ```
//! use rust_logging_core::prelude::*;
//!
//! let session = LoggingSession::start(ConsoleWriter::new().with_colors(false))?;
//! let logger = session.logger();
//!
//! logger.set_tag("component", "api");
//! logger.set_prefix("%s", ["component"]);
//! logger.info("server started");
//!
//! session.close();
//! # Ok::<(), LoggerError>(())
//! ```

pub mod core;
pub mod macros;
pub mod session;
pub mod writers;

pub mod prelude {
    pub use crate::core::{
        ContextMode, Dispatcher, DispatcherBuilder, DispatcherConfig, FeedbackSender,
        LevelState, LogContext, LogLevel, LogRecord, Logger, LoggerError, OutputFormat, Result,
        TextLayout, TimestampFormat, Writer, WriterId, DEFAULT_FATAL_EXIT_CODE,
        DEFAULT_WRITER_ID,
    };
    pub use crate::session::LoggingSession;
    pub use crate::writers::{AsyncCallbackWriter, CallbackWriter};
    #[cfg(feature = "console")]
    pub use crate::writers::ConsoleWriter;
    #[cfg(feature = "file")]
    pub use crate::writers::{FileWriter, JsonWriter, RotatingFileWriter, RotationPolicy};
    #[cfg(all(unix, feature = "syslog"))]
    pub use crate::writers::SyslogWriter;
}

pub use core::{
    ContextMode, DispatchMetrics, Dispatcher, DispatcherBuilder, DispatcherConfig,
    FeedbackSender, LevelState, LogContext, LogLevel, LogRecord, Logger, LoggerError,
    OutputFormat, Result, TextLayout, TimestampFormat, Worker, Writer, WriterId,
    DEFAULT_FATAL_EXIT_CODE, DEFAULT_WRITER_ID,
};
pub use session::LoggingSession;
