// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use crate::types::BlockReason;
use drainguard_core::PodKey;
use miette::Diagnostic;
use thiserror::Error;

/// Drain evaluation error type
#[derive(Error, Debug, Diagnostic)]
pub enum DrainError {
    /// A pod's classification aborts the drain
    #[error("Pod {pod} blocks the drain: {reason}")]
    #[diagnostic(
        code(drainguard::drain::policy_blocked),
        help("Fix the pod's ownership, storage or disruption budget, or annotate it with cluster-autoscaler.kubernetes.io/safe-to-evict=true")
    )]
    PolicyBlocked { pod: PodKey, reason: BlockReason },

    /// A controller lookup failed for reasons other than not-found
    #[error("Could not confirm the controller of pod {pod}: {message}")]
    #[diagnostic(
        code(drainguard::drain::lookup_failed),
        help("This is an environmental failure. Retry the evaluation once the API server is reachable")
    )]
    LookupFailed {
        #[allow(unused)]
        pod: PodKey,
        #[allow(unused)]
        message: String,
    },

    /// The caller cancelled the evaluation or its deadline passed
    #[error("Drain evaluation cancelled: {reason}")]
    #[diagnostic(
        code(drainguard::drain::cancelled),
        help("No pod was judged unsafe; the evaluation did not finish")
    )]
    Cancelled {
        #[allow(unused)]
        reason: String,
    },

    /// A disruption budget carries a selector that cannot be evaluated
    #[error("Invalid disruption budget {budget}: {message}")]
    #[diagnostic(
        code(drainguard::drain::invalid_budget),
        help("Use operators In, NotIn, Exists or DoesNotExist; In/NotIn need values, Exists/DoesNotExist must have none")
    )]
    InvalidBudget {
        #[allow(unused)]
        budget: String,
        #[allow(unused)]
        message: String,
    },

    /// Internal error
    #[error("Internal error: {message}")]
    #[diagnostic(
        code(drainguard::drain::internal_error),
        help("This is likely a bug. Please report it")
    )]
    InternalError {
        #[allow(unused)]
        message: String,
    },
}

/// Result type for drain operations
pub type Result<T> = std::result::Result<T, DrainError>;

impl DrainError {
    /// Create a PolicyBlocked error
    pub fn policy_blocked(pod: PodKey, reason: BlockReason) -> Self {
        Self::PolicyBlocked { pod, reason }
    }

    /// Create a LookupFailed error
    pub fn lookup_failed(pod: PodKey, message: impl Into<String>) -> Self {
        Self::LookupFailed {
            pod,
            message: message.into(),
        }
    }

    /// Create a Cancelled error
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// Create an InvalidBudget error
    pub fn invalid_budget(budget: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidBudget {
            budget: budget.into(),
            message: message.into(),
        }
    }

    /// Create an InternalError
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Whether the error is a policy decision (as opposed to an environmental failure)
    pub fn is_policy(&self) -> bool {
        matches!(self, Self::PolicyBlocked { .. })
    }

    /// Whether retrying the evaluation later may give a different answer
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LookupFailed { .. } | Self::Cancelled { .. })
    }
}
