use crate::error::Result;
use async_trait::async_trait;
use drainguard_core::{ControllerInfo, ControllerRef};

/// Capability to ask the cluster whether a workload controller exists
///
/// Implemented by `ApiClient` against a live API server and by `MockLookup`
/// for tests. Implementations must return `Ok(None)` only when the API
/// reports the object as not found; every other failure is an `Err`.
#[async_trait]
pub trait ControllerLookup: Send + Sync {
    /// Point lookup of a controller by kind, namespace and name
    async fn get_controller(&self, controller: &ControllerRef) -> Result<Option<ControllerInfo>>;
}
