//! Error types for Capstan
//!
//! One unified [`Error`] enum is used across the workspace. We use
//! `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Absence is not an error: `get` returns `Option` and `delete` returns a
//! `bool`, so there is no "not found" variant here.

use std::io;
use thiserror::Error;

/// Result type alias for Capstan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the Capstan store and cluster layers.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (WAL append, fsync, file open).
    ///
    /// The failed mutation was not applied in memory; the engine remains
    /// usable and the caller may retry.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A non-trailing WAL line failed to parse at open.
    ///
    /// Fatal to the store instance: the log prefix can no longer be trusted.
    /// A torn *trailing* line is expected after a crash and is handled by
    /// truncation instead.
    #[error("corrupt log at line {line}: {reason}")]
    CorruptLog {
        /// 1-based line number of the offending record.
        line: usize,
        /// Parser diagnostic for the offending record.
        reason: String,
    },

    /// Fewer than the required number of nodes were alive at dispatch time,
    /// or fewer than the required number of acknowledgments arrived.
    #[error("no quorum: {acked} of {required} required acks")]
    NoQuorum {
        /// Acks needed for the operation to commit.
        required: usize,
        /// Acks actually received.
        acked: usize,
    },

    /// Malformed wire request at the adapter boundary.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Key failed validation (see [`crate::key`]).
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Invalid cluster topology or store configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Unexpected internal failure (a bug, not an operational condition).
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl Error {
    /// Create a `CorruptLog` error.
    pub fn corrupt_log(line: usize, reason: impl Into<String>) -> Self {
        Error::CorruptLog {
            line,
            reason: reason.into(),
        }
    }

    /// Create a `NoQuorum` error.
    pub fn no_quorum(required: usize, acked: usize) -> Self {
        Error::NoQuorum { required, acked }
    }

    /// Create a `Protocol` error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol(message.into())
    }

    /// Create a `Config` error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// Create an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }

    /// Check if this is a quorum failure.
    ///
    /// Quorum failures are retryable once enough nodes are back up.
    pub fn is_no_quorum(&self) -> bool {
        matches!(self, Error::NoQuorum { .. })
    }

    /// Check if this is a log corruption error.
    ///
    /// Corruption is fatal to the store instance that detected it.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::CorruptLog { .. })
    }

    /// Check if this error came from the I/O layer.
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_io() {
        let err = Error::Io(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_error_display_corrupt_log() {
        let err = Error::corrupt_log(3, "expected value at line 1 column 12");
        let msg = err.to_string();
        assert!(msg.contains("corrupt log at line 3"));
        assert!(msg.contains("column 12"));
    }

    #[test]
    fn test_error_display_no_quorum() {
        let err = Error::no_quorum(2, 1);
        let msg = err.to_string();
        assert!(msg.contains("no quorum"));
        assert!(msg.contains("1 of 2"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(err.is_io());
    }

    #[test]
    fn test_error_from_serde_json() {
        let result: std::result::Result<u64, serde_json::Error> =
            serde_json::from_str("not-json");
        let err: Error = result.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_classification() {
        assert!(Error::no_quorum(2, 0).is_no_quorum());
        assert!(!Error::no_quorum(2, 0).is_corruption());
        assert!(Error::corrupt_log(1, "bad").is_corruption());
        assert!(!Error::protocol("bad frame").is_io());
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);
    }
}
