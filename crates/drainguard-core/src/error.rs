// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Core error type for drainguard operations
#[derive(Error, Debug, Diagnostic)]
pub enum DrainguardError {
    /// Serialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(
        code(drainguard::serialization_error),
        help("Ensure the snapshot is valid YAML or JSON: a sequence of objects or a List with `items`")
    )]
    SerializationError {
        #[allow(unused)]
        message: String,
        #[source]
        #[allow(unused)]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Snapshot file could not be read
    #[error("Failed to read {path}: {source}")]
    #[diagnostic(
        code(drainguard::io_error),
        help("Check that the file exists and is readable")
    )]
    Io {
        #[allow(unused)]
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for drainguard core operations
pub type Result<T> = std::result::Result<T, DrainguardError>;

impl DrainguardError {
    /// Create a SerializationError
    pub fn serialization_error(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::SerializationError {
            message: message.into(),
            source,
        }
    }

    /// Create an Io error for the given path
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = DrainguardError::serialization_error("expected a sequence", None);
        assert!(matches!(err, DrainguardError::SerializationError { .. }));
        assert_eq!(err.to_string(), "Serialization error: expected a sequence");

        let err = DrainguardError::io(
            "pods.yaml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.to_string().contains("pods.yaml"));
    }
}
