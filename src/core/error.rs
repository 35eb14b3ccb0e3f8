//! Error types for the logging core

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// File writer error with path
    #[error("File writer error for '{path}': {message}")]
    FileWriterError { path: String, message: String },

    /// File rotation error
    #[error("File rotation failed for '{path}': {message}")]
    FileRotationError { path: String, message: String },

    /// Listener could not be bound
    #[error("Failed to listen on '{address}': {source}")]
    BindError {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The default writer identifier cannot be used for regular writers
    #[error("Writer id '{0}' is reserved for the default writer")]
    ReservedWriterId(String),

    /// Dispatcher already closed
    #[error("Dispatcher already closed")]
    DispatcherClosed,

    /// Writer error (generic)
    #[error("Writer error: {0}")]
    WriterError(String),

    /// Failure reported by a callback writer
    #[error("{0}")]
    Callback(String),
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a file writer error
    pub fn file_writer(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileWriterError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a file rotation error
    pub fn file_rotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileRotationError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a listener bind error
    pub fn bind(address: impl Into<String>, source: std::io::Error) -> Self {
        LoggerError::BindError {
            address: address.into(),
            source,
        }
    }

    /// Create a writer error (generic)
    pub fn writer<S: Into<String>>(msg: S) -> Self {
        LoggerError::WriterError(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = LoggerError::config("Dispatcher", "feedback capacity must be positive");
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));

        let err = LoggerError::file_writer("/var/log/app.log", "Permission denied");
        assert!(matches!(err, LoggerError::FileWriterError { .. }));

        let err = LoggerError::ReservedWriterId("default".to_string());
        assert!(matches!(err, LoggerError::ReservedWriterId(_)));
    }

    #[test]
    fn test_error_display() {
        let err = LoggerError::file_rotation("/var/log/app.log", "Disk full");
        assert_eq!(
            err.to_string(),
            "File rotation failed for '/var/log/app.log': Disk full"
        );

        let err = LoggerError::ReservedWriterId("default".to_string());
        assert_eq!(
            err.to_string(),
            "Writer id 'default' is reserved for the default writer"
        );

        let err = LoggerError::Callback("feedback error".to_string());
        assert_eq!(err.to_string(), "feedback error");
    }

    #[test]
    fn test_io_operation_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = LoggerError::io_operation("writing log file", "cannot write to file", io_err);

        assert!(matches!(err, LoggerError::IoOperation { .. }));
        assert!(err.to_string().contains("writing log file"));
        assert!(err.to_string().contains("cannot write to file"));
    }

    #[test]
    fn test_bind_error_keeps_source() {
        use std::error::Error;

        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use");
        let err = LoggerError::bind("127.0.0.1:9000", io_err);
        assert!(err.to_string().contains("127.0.0.1:9000"));
        assert!(err.source().is_some());
    }
}
