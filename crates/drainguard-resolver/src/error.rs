// Allow unused assignments for diagnostic fields - they're used by the thiserror/miette macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Resolver error type for controller lookups
#[derive(Error, Debug, Diagnostic)]
pub enum ResolverError {
    /// The lookup itself failed (transport error, unexpected status, bad body)
    #[error("Lookup of {controller} failed: {message}")]
    #[diagnostic(
        code(drainguard::resolver::lookup_failed),
        help("Check API server connectivity and credentials. This is not a statement about whether the controller exists")
    )]
    LookupFailed {
        #[allow(unused)]
        controller: String,
        #[allow(unused)]
        message: String,
    },

    /// The controller kind has no known collection to look it up in
    #[error("Unsupported controller kind: {kind}")]
    #[diagnostic(
        code(drainguard::resolver::unsupported_kind),
        help("Supported kinds: ReplicationController, ReplicaSet, Job, DaemonSet, StatefulSet")
    )]
    UnsupportedKind {
        #[allow(unused)]
        kind: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(drainguard::resolver::invalid_config), help("{suggestion}"))]
    InvalidConfig {
        #[allow(unused)]
        message: String,
        #[allow(unused)]
        suggestion: String,
    },
}

/// Result type for resolver operations
pub type Result<T> = std::result::Result<T, ResolverError>;

impl ResolverError {
    /// Create a LookupFailed error
    pub fn lookup_failed(controller: impl ToString, message: impl Into<String>) -> Self {
        Self::LookupFailed {
            controller: controller.to_string(),
            message: message.into(),
        }
    }

    /// Create an UnsupportedKind error
    pub fn unsupported_kind(kind: impl Into<String>) -> Self {
        Self::UnsupportedKind { kind: kind.into() }
    }

    /// Create an InvalidConfig error
    pub fn invalid_config(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }
}
