use crate::error::{ResolverError, Result};
use crate::traits::ControllerLookup;
use drainguard_core::pod::controller_ref;
use drainguard_core::{ControllerInfo, ControllerKind, ControllerRef, Pod};
use std::sync::Arc;
use tracing::debug;

/// Outcome of resolving a pod's controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The pod has no controlling owner reference
    NoController,
    /// The controller exists
    Found {
        reference: ControllerRef,
        info: ControllerInfo,
    },
    /// The API reported the controller as not found
    Missing { reference: ControllerRef },
}

impl Resolution {
    pub fn kind(&self) -> Option<&ControllerKind> {
        match self {
            Self::NoController => None,
            Self::Found { reference, .. } | Self::Missing { reference } => Some(&reference.kind),
        }
    }

    pub fn exists(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

/// Resolves pod owner references to live controllers
///
/// The lookup capability is injected so tests can supply `MockLookup` and the
/// binary can supply `ApiClient`. No caching happens here; callers that want
/// to collapse repeated lookups do so per evaluation.
#[derive(Clone)]
pub struct ControllerResolver {
    lookup: Arc<dyn ControllerLookup>,
}

impl ControllerResolver {
    pub fn new(lookup: Arc<dyn ControllerLookup>) -> Self {
        Self { lookup }
    }

    /// Resolve the controller of a pod
    pub async fn resolve(&self, pod: &Pod) -> Result<Resolution> {
        match controller_ref(pod) {
            Some(reference) => self.resolve_ref(reference).await,
            None => Ok(Resolution::NoController),
        }
    }

    /// Confirm a controller reference against the cluster
    pub async fn resolve_ref(&self, reference: ControllerRef) -> Result<Resolution> {
        if !reference.kind.is_known() {
            return Err(ResolverError::unsupported_kind(reference.kind.as_str()));
        }

        let resolution = match self.lookup.get_controller(&reference).await? {
            Some(info) => Resolution::Found { reference, info },
            None => Resolution::Missing { reference },
        };

        debug!(
            "Resolved {:?} controller, exists={}",
            resolution.kind(),
            resolution.exists()
        );
        Ok(resolution)
    }
}
