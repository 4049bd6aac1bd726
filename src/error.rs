//! Error types for the medir crate.

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, MedirError>;

/// Errors produced while preparing or running a benchmark
#[derive(Debug, Error)]
pub enum MedirError {
    /// File system operation failed
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the failed operation
        message: String,
    },

    /// Input data could not be parsed or rendered
    #[error("Format error: {reason}")]
    FormatError {
        /// Description of the malformed input
        reason: String,
    },

    /// HTTP request to a backend failed
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Backend accepted the request but generation failed
    #[error("Inference error: {0}")]
    InferenceError(String),

    /// Configuration values are inconsistent or out of range
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Description of the invalid setting
        reason: String,
    },

    /// Requested operation is not supported
    #[error("Unsupported operation '{operation}': {reason}")]
    UnsupportedOperation {
        /// The operation that was requested
        operation: String,
        /// Why it is unsupported
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_context() {
        let err = MedirError::IoError {
            message: "missing file".to_string(),
        };
        assert!(err.to_string().contains("missing file"));

        let err = MedirError::UnsupportedOperation {
            operation: "benchmark".to_string(),
            reason: "unknown backend".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("benchmark"));
        assert!(msg.contains("unknown backend"));
    }

    #[test]
    fn test_connection_error_display() {
        let err = MedirError::ConnectionError("HTTP 503 from server".to_string());
        assert!(err.to_string().contains("503"));
    }
}
