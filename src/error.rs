//! Error types for the embroidery format engine

use std::io;
use thiserror::Error;

/// Main error type for pattern load/save operations
#[derive(Debug, Error)]
pub enum EmbroideryError {
    /// No registered format adapter recognized the input
    #[error("Unrecognized format: {0}")]
    UnrecognizedFormat(String),

    /// Compound container directory or allocation tables are corrupt
    #[error("Malformed container: {0}")]
    MalformedContainer(String),

    /// A field or bitstream inside a format decodes to an impossible value
    #[error("Corrupt data: {0}")]
    CorruptData(String),

    /// A stream, bitstream or header ended before its declared length
    #[error("Truncated data: {0}")]
    Truncated(String),

    /// The pattern uses something the target format cannot encode
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// Non-finite coordinates, dangling thread references or empty required fields
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Named stream is not present in a compound container
    #[error("Stream not found: {0}")]
    StreamNotFound(String),

    /// Underlying byte source/sink failure, passed through unchanged
    #[error("IO error: {0}")]
    Io(io::Error),
}

/// Result type alias for embroidery operations
pub type Result<T> = std::result::Result<T, EmbroideryError>;

impl EmbroideryError {
    /// Shorthand for a truncation error at a named location
    pub fn truncated(what: impl Into<String>) -> Self {
        EmbroideryError::Truncated(what.into())
    }

    /// Shorthand for a container corruption error
    pub fn malformed(what: impl Into<String>) -> Self {
        EmbroideryError::MalformedContainer(what.into())
    }

    /// Shorthand for a bad value inside a format or codec stream
    pub fn corrupt(what: impl Into<String>) -> Self {
        EmbroideryError::CorruptData(what.into())
    }
}

impl From<io::Error> for EmbroideryError {
    /// In-memory parsing reports short buffers as `UnexpectedEof`; those are
    /// truncation, everything else is a genuine I/O failure.
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            EmbroideryError::Truncated(err.to_string())
        } else {
            EmbroideryError::Io(err)
        }
    }
}

impl From<String> for EmbroideryError {
    fn from(s: String) -> Self {
        EmbroideryError::InvalidGeometry(s)
    }
}

impl From<&str> for EmbroideryError {
    fn from(s: &str) -> Self {
        EmbroideryError::InvalidGeometry(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EmbroideryError::UnrecognizedFormat("no adapter matched".to_string());
        assert_eq!(err.to_string(), "Unrecognized format: no adapter matched");
    }

    #[test]
    fn test_corrupt_is_distinct_from_container_damage() {
        let err = EmbroideryError::corrupt("code length 17");
        assert!(matches!(err, EmbroideryError::CorruptData(_)));
        assert_eq!(err.to_string(), "Corrupt data: code length 17");
    }

    #[test]
    fn test_eof_maps_to_truncated() {
        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "failed to fill whole buffer");
        let err: EmbroideryError = io_err.into();
        assert!(matches!(err, EmbroideryError::Truncated(_)));
    }

    #[test]
    fn test_io_error_passthrough() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: EmbroideryError = io_err.into();
        match err {
            EmbroideryError::Io(inner) => assert_eq!(inner.kind(), io::ErrorKind::NotFound),
            other => panic!("expected Io, got {other:?}"),
        }
    }
}
