//! Drainguard Core - Shared types for the drain eligibility engine
//!
//! This crate provides:
//! - Pod and controller identities
//! - Read-only pod inspection helpers
//! - Error types with miette diagnostics
//! - Snapshot loading from YAML/JSON files

pub mod error;
pub mod pod;
pub mod snapshot;
pub mod types;

// Re-export commonly used types
pub use error::{DrainguardError, Result};
pub use pod::SafeToEvict;
pub use snapshot::{load_items, parse_items};
pub use types::{
    ControllerInfo, ControllerKind, ControllerRef, PodKey, DEFAULT_NAMESPACE, SYSTEM_NAMESPACE,
};

// Re-export k8s-openapi types for convenience
pub use k8s_openapi;
pub use k8s_openapi::api::core::v1::Pod;
pub use k8s_openapi::api::policy::v1::PodDisruptionBudget;
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
