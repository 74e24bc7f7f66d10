//! Drainguard Resolver - confirms that a pod's controller still exists
//!
//! This crate provides:
//! - The `ControllerLookup` capability trait
//! - `ControllerResolver`, mapping pods to controller resolutions
//! - `ApiClient`, an HTTP lookup against the Kubernetes API server
//! - `MockLookup`, an in-memory lookup for tests

pub mod api_client;
pub mod error;
pub mod mock;
pub mod resolver;
pub mod traits;

// Re-export primary types
pub use api_client::{ApiClient, ApiClientConfig};
pub use error::{ResolverError, Result};
pub use mock::MockLookup;
pub use resolver::{ControllerResolver, Resolution};
pub use traits::ControllerLookup;
