//! Log level definitions
//!
//! Levels are ordered most-severe first. The ordering is only used for
//! grouping; every level is muted and routed independently.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of distinct levels.
pub const LEVELS_COUNT: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
pub enum LogLevel {
    /// Shutdown of the application to prevent (further) data loss.
    Fatal = 0,
    /// Failure of an operation, not of the application.
    Error = 1,
    /// Something odd that was automatically recovered.
    Warning = 2,
    /// General operational entries.
    #[default]
    Info = 3,
    /// Very verbose, usually enabled only while debugging.
    Debug = 4,
    /// Tracing of a specific code path.
    Trace = 5,
}

impl LogLevel {
    /// All levels, most severe first.
    pub const ALL: [LogLevel; LEVELS_COUNT] = [
        LogLevel::Fatal,
        LogLevel::Error,
        LogLevel::Warning,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    /// Levels worth waking somebody up for.
    pub const CRITICAL: [LogLevel; 3] = [LogLevel::Fatal, LogLevel::Error, LogLevel::Warning];

    /// Levels meant for debugging sessions only.
    pub const DEBUGGING: [LogLevel; 2] = [LogLevel::Debug, LogLevel::Trace];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            LogLevel::Fatal => "FATAL",
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    #[inline]
    pub fn is_critical(&self) -> bool {
        matches!(self, LogLevel::Fatal | LogLevel::Error | LogLevel::Warning)
    }

    #[cfg(feature = "console")]
    pub fn color_code(&self) -> colored::Color {
        use colored::Color::*;
        match self {
            LogLevel::Fatal => BrightRed,
            LogLevel::Error => Red,
            LogLevel::Warning => Yellow,
            LogLevel::Info => Green,
            LogLevel::Debug => Blue,
            LogLevel::Trace => BrightBlack,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "FATAL" => Ok(LogLevel::Fatal),
            "ERROR" => Ok(LogLevel::Error),
            "WARN" | "WARNING" => Ok(LogLevel::Warning),
            "INFO" => Ok(LogLevel::Info),
            "DEBUG" => Ok(LogLevel::Debug),
            "TRACE" => Ok(LogLevel::Trace),
            _ => Err(format!("Invalid log level: '{}'", s)),
        }
    }
}
