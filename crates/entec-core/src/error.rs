//! Unified error types for the entec ecosystem
//!
//! This module provides a common error type [`EntecError`] that can represent
//! errors from any part of the system. Domain-specific error types can be
//! converted to `EntecError` for uniform error handling at API boundaries.
//!
//! Fatal errors abort construction of the enclosing technology, never the
//! whole model; the message always names the offending technology (and, where
//! applicable, the carrier or timestep).

use thiserror::Error;

/// Unified error type for all entec operations.
///
/// Construction of a technology's constraint set is aborted on the first
/// fatal error. Advisory conditions are not errors; they are logged and
/// construction proceeds.
#[derive(Error, Debug)]
pub enum EntecError {
    /// I/O errors (file access, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Missing or contradictory technology configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Fitting cannot produce the requested segment count
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// A technology variant that is intentionally not modelled
    #[error("Unsupported variant: {0}")]
    UnsupportedVariant(String),

    /// Data validation errors (bounds, invariants)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using EntecError.
pub type EntecResult<T> = Result<T, EntecError>;

// Conversion from anyhow::Error
impl From<anyhow::Error> for EntecError {
    fn from(err: anyhow::Error) -> Self {
        EntecError::Other(err.to_string())
    }
}

// Conversion from string-like types for convenience
impl From<String> for EntecError {
    fn from(s: String) -> Self {
        EntecError::Other(s)
    }
}

impl From<&str> for EntecError {
    fn from(s: &str) -> Self {
        EntecError::Other(s.to_string())
    }
}

// JSON parsing errors
impl From<serde_json::Error> for EntecError {
    fn from(err: serde_json::Error) -> Self {
        EntecError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EntecError::Config("technology 'dac' has no input_ratios".into());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("dac"));
    }

    #[test]
    fn test_insufficient_data_display() {
        let err = EntecError::InsufficientData("3 distinct x-values, 4 segments requested".into());
        assert!(err.to_string().contains("Insufficient data"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: EntecError = io_err.into();
        assert!(matches!(err, EntecError::Io(_)));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> EntecResult<()> {
            Err(EntecError::Validation("test".into()))
        }

        fn outer() -> EntecResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
