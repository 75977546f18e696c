//! Error types for the JNRRD library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for JNRRD operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Header stream contains bytes that are not valid UTF-8 text
    #[error("Malformed header stream: {0}")]
    MalformedStream(#[from] std::str::Utf8Error),

    /// End of stream before the header terminated
    #[error("Unterminated header: end of stream at offset {0}")]
    UnterminatedHeader(u64),

    /// A required core field is absent at header end
    #[error("Missing required header field: {0}")]
    MissingRequiredField(&'static str),

    /// Per-axis field length disagrees with the declared dimension
    #[error("Dimension mismatch: {field} has {actual} entries, dimension is {expected}")]
    DimensionMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Declared encoding is unknown or not compiled into this build
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// Declared element type is unknown or unusable in this context
    #[error("Unsupported element type: {0}")]
    UnsupportedType(String),

    /// Payload is shorter or longer than the header promises
    #[error("Payload length mismatch: expected {expected} bytes, got {actual}")]
    PayloadLengthMismatch { expected: usize, actual: usize },

    /// Zero-length or parallel basis vectors where a cross product is required
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// Detached payload resource could not be reached or read
    #[error("Unresolved payload: {0}")]
    UnresolvedPayload(String),

    /// A core field holds a value of the wrong shape or type
    #[error("Invalid value for field '{field}': {msg}")]
    InvalidField { field: String, msg: String },

    /// Compression or decompression failed
    #[error("Compression error: {0}")]
    Compression(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid-field error.
    pub fn field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            msg: msg.into(),
        }
    }
}

/// Result type alias for JNRRD operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::MissingRequiredField("sizes");
        assert!(e.to_string().contains("sizes"));

        let e = Error::PayloadLengthMismatch {
            expected: 128,
            actual: 96,
        };
        assert!(e.to_string().contains("128"));
        assert!(e.to_string().contains("96"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
