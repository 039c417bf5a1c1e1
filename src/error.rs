//! Error types for rfid-capture.
//!
//! [`RfidError`] covers the reader itself; [`Error`] is what a capture run
//! reports at the process boundary.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::RfidError;

/// The main error type for capture operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The reader could not be initialized or failed during the read.
    #[error("RFID reader unavailable: {0}")]
    PeripheralUnavailable(#[source] RfidError),

    /// The output record could not be created, written or closed.
    #[error("failed to write {path}: {source}")]
    Io {
        /// Path of the output record.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The wait for a tag was cancelled before one was presented.
    #[error("cancelled while waiting for a tag")]
    Cancelled,

    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    Config(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// The configured reader backend was not compiled in.
    #[error("reader backend '{0}' is not enabled in this build")]
    BackendDisabled(&'static str),

    /// The logger could not be started.
    #[error("failed to start logger: {0}")]
    Logging(#[from] flexi_logger::FlexiLoggerError),
}

/// A specialized Result type for capture operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<RfidError> for Error {
    fn from(err: RfidError) -> Self {
        match err {
            RfidError::Cancelled => Self::Cancelled,
            other => Self::PeripheralUnavailable(other),
        }
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl Error {
    /// Create an I/O error for `path`.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Check if the reader was the cause.
    #[must_use]
    pub fn is_peripheral_error(&self) -> bool {
        matches!(self, Self::PeripheralUnavailable(_))
    }

    /// Check if writing the output record was the cause.
    #[must_use]
    pub fn is_io_error(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfid_error_becomes_peripheral_unavailable() {
        let err: Error = RfidError::NotDetected(0x00).into();
        assert!(err.is_peripheral_error());
        assert!(err.to_string().contains("RFID reader unavailable"));
    }

    #[test]
    fn test_cancelled_is_not_a_peripheral_error() {
        let err: Error = RfidError::Cancelled.into();
        assert!(matches!(err, Error::Cancelled));
        assert!(!err.is_peripheral_error());
    }

    #[test]
    fn test_io_error_display() {
        let source = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::io("/root/forbidden/rfid_data.txt", source);
        assert!(err.is_io_error());
        let msg = err.to_string();
        assert!(msg.contains("/root/forbidden/rfid_data.txt"));
        assert!(msg.contains("access denied"));
    }

    #[test]
    fn test_config_validation_display() {
        let err = Error::config_validation("poll interval must be positive");
        assert_eq!(
            err.to_string(),
            "invalid configuration: poll interval must be positive"
        );
    }

    #[test]
    fn test_backend_disabled_display() {
        let err = Error::BackendDisabled("serial");
        assert!(err.to_string().contains("'serial'"));
    }
}
