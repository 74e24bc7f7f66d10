use crate::error::{ResolverError, Result};
use crate::traits::ControllerLookup;
use async_trait::async_trait;
use drainguard_core::{ControllerInfo, ControllerRef};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory controller registry for tests and offline evaluation
///
/// Controllers that were never added are reported as not found. Lookups can
/// be made to fail, or to never complete, per controller.
#[derive(Default)]
pub struct MockLookup {
    controllers: Arc<RwLock<HashMap<ControllerRef, ControllerInfo>>>,
    failures: Arc<RwLock<HashMap<ControllerRef, String>>>,
    hanging: Arc<RwLock<HashSet<ControllerRef>>>,
    calls: AtomicUsize,
}

impl MockLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller as existing
    pub async fn add_controller(&self, controller: ControllerRef, info: ControllerInfo) {
        self.controllers.write().await.insert(controller, info);
    }

    /// Make lookups of a controller fail with the given message
    pub async fn fail_lookup(&self, controller: ControllerRef, message: impl Into<String>) {
        self.failures.write().await.insert(controller, message.into());
    }

    /// Make lookups of a controller never complete
    pub async fn hang_lookup(&self, controller: ControllerRef) {
        self.hanging.write().await.insert(controller);
    }

    /// Number of lookups issued so far
    pub fn lookup_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ControllerLookup for MockLookup {
    async fn get_controller(&self, controller: &ControllerRef) -> Result<Option<ControllerInfo>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !controller.kind.is_known() {
            return Err(ResolverError::unsupported_kind(controller.kind.as_str()));
        }

        let hangs = self.hanging.read().await.contains(controller);
        if hangs {
            debug!("Mock: lookup of {} hangs", controller);
            std::future::pending::<()>().await;
        }

        if let Some(message) = self.failures.read().await.get(controller) {
            debug!("Mock: lookup of {} fails", controller);
            return Err(ResolverError::lookup_failed(controller, message.clone()));
        }

        let found = self.controllers.read().await.get(controller).cloned();
        debug!("Mock: lookup of {} found={}", controller, found.is_some());
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drainguard_core::ControllerKind;
    use std::time::Duration;

    fn rc() -> ControllerRef {
        ControllerRef::new(ControllerKind::ReplicationController, "default", "rc")
    }

    #[tokio::test]
    async fn test_registered_controller_is_found() {
        let lookup = MockLookup::new();
        lookup
            .add_controller(rc(), ControllerInfo::with_replicas(5))
            .await;

        let info = lookup.get_controller(&rc()).await.unwrap();
        assert_eq!(info, Some(ControllerInfo::with_replicas(5)));
        assert_eq!(lookup.lookup_count(), 1);
    }

    #[tokio::test]
    async fn test_unregistered_controller_is_missing() {
        let lookup = MockLookup::new();
        let info = lookup.get_controller(&rc()).await.unwrap();
        assert!(info.is_none());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let lookup = MockLookup::new();
        lookup.add_controller(rc(), ControllerInfo::default()).await;
        lookup.fail_lookup(rc(), "connection reset").await;

        let result = lookup.get_controller(&rc()).await;
        assert!(matches!(result, Err(ResolverError::LookupFailed { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_lookup_never_completes() {
        let lookup = MockLookup::new();
        lookup.hang_lookup(rc()).await;

        let result = tokio::time::timeout(Duration::from_secs(60), lookup.get_controller(&rc())).await;
        assert!(result.is_err());
    }
}
