use drainguard_core::{Pod, PodKey};
use std::fmt;
use std::time::Duration;

/// Policy knobs for drain eligibility
#[derive(Debug, Clone)]
pub struct DrainPolicy {
    /// Allow evicting pods whose emptyDir storage would be lost
    pub allow_local_storage_eviction: bool,
    /// Allow evicting pods no known controller will recreate
    pub allow_unreplicated_eviction: bool,
    /// How long a pod may be terminating before it is ignored
    pub termination_grace_period: Duration,
    /// Require kube-system pods to be covered by a kube-system budget (opt-in)
    pub skip_nodes_with_system_pods: bool,
    /// Confirm owning controllers exist through the resolver
    pub check_references: bool,
    /// Block pods whose controller wants fewer replicas than this
    pub min_replica_count: i32,
}

impl Default for DrainPolicy {
    fn default() -> Self {
        Self {
            allow_local_storage_eviction: false,
            allow_unreplicated_eviction: false,
            // Kubernetes default terminationGracePeriodSeconds
            termination_grace_period: Duration::from_secs(30),
            skip_nodes_with_system_pods: false,
            check_references: true,
            min_replica_count: 0,
        }
    }
}

/// Why a pod is left out of the eviction list without blocking the drain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MirrorPod,
    DaemonSetManaged,
    Terminating,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MirrorPod => f.write_str("mirror of a static pod"),
            Self::DaemonSetManaged => f.write_str("managed by a DaemonSet"),
            Self::Terminating => f.write_str("already terminating past its grace period"),
        }
    }
}

/// Why a pod aborts the drain of its node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    UnsafeAnnotation,
    NakedPod,
    UnsupportedController {
        kind: String,
    },
    ControllerNotFound {
        controller: String,
    },
    TooFewReplicas {
        controller: String,
        replicas: i32,
        min_replicas: i32,
    },
    LocalStorage,
    DisruptionBudgetUnmatched,
    UnprotectedSystemPod,
}

impl BlockReason {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsafeAnnotation => "unsafe-annotation",
            Self::NakedPod => "naked-pod",
            Self::UnsupportedController { .. } => "unsupported-controller",
            Self::ControllerNotFound { .. } => "controller-not-found",
            Self::TooFewReplicas { .. } => "too-few-replicas",
            Self::LocalStorage => "local-storage",
            Self::DisruptionBudgetUnmatched => "disruption-budget-unmatched",
            Self::UnprotectedSystemPod => "unprotected-system-pod",
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsafeAnnotation => f.write_str("explicitly marked unsafe to evict"),
            Self::NakedPod => f.write_str(
                "no controller manages this pod; eviction would lose it without recreation",
            ),
            Self::UnsupportedController { kind } => write!(
                f,
                "owned by a {} controller whose replacement of the pod cannot be confirmed",
                kind
            ),
            Self::ControllerNotFound { controller } => write!(
                f,
                "owning controller {} not found; cannot confirm replacement will occur",
                controller
            ),
            Self::TooFewReplicas {
                controller,
                replicas,
                min_replicas,
            } => write!(
                f,
                "controller {} has too few replicas (spec: {}, min: {})",
                controller, replicas, min_replicas
            ),
            Self::LocalStorage => f.write_str("local storage would be lost"),
            Self::DisruptionBudgetUnmatched => f.write_str(
                "namespace has disruption budgets but none selects this pod",
            ),
            Self::UnprotectedSystemPod => {
                f.write_str("kube-system pod not covered by a disruption budget")
            }
        }
    }
}

/// Per-pod classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The pod may be evicted
    Evictable,
    /// The pod is left alone and does not block
    Skip(SkipReason),
    /// The pod aborts the whole drain
    Blocking(BlockReason),
    /// The controller lookup failed; not a policy decision
    Unresolved(String),
}

impl Classification {
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Blocking(_))
    }
}

/// Classification of one pod, kept for diagnostics
#[derive(Debug, Clone)]
pub struct PodVerdict {
    pub key: PodKey,
    pub pod: Pod,
    pub classification: Classification,
}

impl PodVerdict {
    pub fn new(pod: Pod, classification: Classification) -> Self {
        Self {
            key: drainguard_core::pod::pod_key(&pod),
            pod,
            classification,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_conservative() {
        let policy = DrainPolicy::default();
        assert!(!policy.allow_local_storage_eviction);
        assert!(!policy.allow_unreplicated_eviction);
        assert!(!policy.skip_nodes_with_system_pods);
        assert!(policy.check_references);
        assert_eq!(policy.min_replica_count, 0);
    }

    #[test]
    fn test_block_reason_codes() {
        assert_eq!(BlockReason::UnsafeAnnotation.code(), "unsafe-annotation");
        assert_eq!(BlockReason::NakedPod.code(), "naked-pod");
        assert_eq!(
            BlockReason::ControllerNotFound {
                controller: "ReplicaSet default/rs".to_string()
            }
            .code(),
            "controller-not-found"
        );
        assert_eq!(
            BlockReason::DisruptionBudgetUnmatched.code(),
            "disruption-budget-unmatched"
        );
    }

    #[test]
    fn test_block_reason_messages() {
        let reason = BlockReason::TooFewReplicas {
            controller: "ReplicaSet default/rs".to_string(),
            replicas: 1,
            min_replicas: 2,
        };
        assert_eq!(
            reason.to_string(),
            "controller ReplicaSet default/rs has too few replicas (spec: 1, min: 2)"
        );
        assert_eq!(BlockReason::LocalStorage.to_string(), "local storage would be lost");
    }
}
