//! Core logging types: records, context, dispatch engine and logger

pub mod dispatcher;
pub mod error;
pub mod log_context;
pub mod log_level;
pub mod log_record;
pub mod logger;
pub mod metrics;
pub mod output_format;
pub mod stack;
pub mod timestamp;
pub mod worker;
pub mod writer;

pub use dispatcher::{
    Dispatcher, DispatcherBuilder, DispatcherConfig, LevelState, DEFAULT_FATAL_EXIT_CODE,
    DEFAULT_FEEDBACK_CAPACITY, FEEDBACK_DRAIN_TIMEOUT,
};
pub use error::{LoggerError, Result};
pub use log_context::{ContextMode, LogContext};
pub use log_level::{LogLevel, LEVELS_COUNT};
pub use log_record::LogRecord;
pub use logger::Logger;
pub use metrics::DispatchMetrics;
pub use output_format::{OutputFormat, TextLayout};
pub use stack::{capture_stack_trace, first_frame, STACK_SKIP_FRAMES};
pub use timestamp::TimestampFormat;
pub use worker::{Worker, WorkerSender, DEFAULT_CLOSE_TIMEOUT, DEFAULT_WORKER_CAPACITY};
pub use writer::{FeedbackSender, Writer, WriterId, DEFAULT_WRITER_ID};
