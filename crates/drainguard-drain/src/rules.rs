use crate::budget::BudgetIndex;
use crate::types::{BlockReason, Classification, DrainPolicy, SkipReason};
use chrono::{DateTime, Utc};
use drainguard_core::pod::{
    controller_ref, deletion_timestamp, has_local_storage, is_mirror_pod, is_terminal, pod_key,
    pod_namespace, safe_to_evict,
};
use drainguard_core::{ControllerInfo, ControllerKind, ControllerRef, Pod, SafeToEvict, SYSTEM_NAMESPACE};
use std::collections::HashMap;
use tracing::debug;

/// What a controller lookup reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(ControllerInfo),
    Missing,
    Failed(String),
}

/// Lookup results for one evaluation, keyed by controller
pub type ControllerStatuses = HashMap<ControllerRef, LookupOutcome>;

/// Everything a rule may consult besides the pod itself
pub struct RuleContext<'a> {
    pub policy: &'a DrainPolicy,
    pub now: DateTime<Utc>,
    pub budgets: &'a BudgetIndex,
    /// `None` during the local pass, before any lookup was issued
    pub controllers: Option<&'a ControllerStatuses>,
}

/// Result of applying one rule to a pod
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    /// The rule has no opinion; try the next one
    Continue,
    /// The rule classified the pod
    Decide(Classification),
    /// The rule needs this controller looked up before it can decide
    NeedsLookup(ControllerRef),
}

/// Drain rule trait
pub trait DrainRule: Send + Sync {
    /// Apply the rule to a pod
    fn evaluate(&self, ctx: &RuleContext<'_>, pod: &Pod) -> RuleOutcome;

    /// Name of the rule
    fn name(&self) -> &str;
}

/// `safe-to-evict: "false"` blocks no matter what else is true
pub struct UnsafeAnnotation;

impl DrainRule for UnsafeAnnotation {
    fn evaluate(&self, _ctx: &RuleContext<'_>, pod: &Pod) -> RuleOutcome {
        match safe_to_evict(pod) {
            SafeToEvict::Unsafe => {
                RuleOutcome::Decide(Classification::Blocking(BlockReason::UnsafeAnnotation))
            }
            _ => RuleOutcome::Continue,
        }
    }

    fn name(&self) -> &str {
        "UnsafeAnnotation"
    }
}

/// `safe-to-evict: "true"` overrides every later rule
pub struct SafeAnnotation;

impl DrainRule for SafeAnnotation {
    fn evaluate(&self, _ctx: &RuleContext<'_>, pod: &Pod) -> RuleOutcome {
        match safe_to_evict(pod) {
            SafeToEvict::Safe => RuleOutcome::Decide(Classification::Evictable),
            _ => RuleOutcome::Continue,
        }
    }

    fn name(&self) -> &str {
        "SafeAnnotation"
    }
}

/// Static pods belong to the kubelet and cannot be evicted through the API
pub struct MirrorPod;

impl DrainRule for MirrorPod {
    fn evaluate(&self, _ctx: &RuleContext<'_>, pod: &Pod) -> RuleOutcome {
        if is_mirror_pod(pod) {
            return RuleOutcome::Decide(Classification::Skip(SkipReason::MirrorPod));
        }
        RuleOutcome::Continue
    }

    fn name(&self) -> &str {
        "MirrorPod"
    }
}

/// DaemonSet pods are recreated per node and never part of the eviction set
pub struct DaemonSetPod;

impl DrainRule for DaemonSetPod {
    fn evaluate(&self, _ctx: &RuleContext<'_>, pod: &Pod) -> RuleOutcome {
        match controller_ref(pod) {
            Some(r) if r.kind == ControllerKind::DaemonSet => {
                RuleOutcome::Decide(Classification::Skip(SkipReason::DaemonSetManaged))
            }
            _ => RuleOutcome::Continue,
        }
    }

    fn name(&self) -> &str {
        "DaemonSetPod"
    }
}

/// Pods deleted longer ago than the grace period are already on their way out
pub struct LongTerminating;

impl DrainRule for LongTerminating {
    fn evaluate(&self, ctx: &RuleContext<'_>, pod: &Pod) -> RuleOutcome {
        let requested = match deletion_timestamp(pod) {
            Some(t) => t,
            None => return RuleOutcome::Continue,
        };

        // A deletion timestamp in the future is not terminating yet
        let elapsed = match ctx.now.signed_duration_since(requested).to_std() {
            Ok(e) => e,
            Err(_) => return RuleOutcome::Continue,
        };

        if elapsed > ctx.policy.termination_grace_period {
            return RuleOutcome::Decide(Classification::Skip(SkipReason::Terminating));
        }
        RuleOutcome::Continue
    }

    fn name(&self) -> &str {
        "LongTerminating"
    }
}

/// Succeeded and Failed pods have nothing left to migrate
pub struct TerminalPhase;

impl DrainRule for TerminalPhase {
    fn evaluate(&self, _ctx: &RuleContext<'_>, pod: &Pod) -> RuleOutcome {
        if is_terminal(pod) {
            return RuleOutcome::Decide(Classification::Evictable);
        }
        RuleOutcome::Continue
    }

    fn name(&self) -> &str {
        "TerminalPhase"
    }
}

/// emptyDir contents die with the node
pub struct LocalStorage;

impl DrainRule for LocalStorage {
    fn evaluate(&self, ctx: &RuleContext<'_>, pod: &Pod) -> RuleOutcome {
        if !ctx.policy.allow_local_storage_eviction && has_local_storage(pod) {
            return RuleOutcome::Decide(Classification::Blocking(BlockReason::LocalStorage));
        }
        RuleOutcome::Continue
    }

    fn name(&self) -> &str {
        "LocalStorage"
    }
}

/// Pods nobody will recreate
pub struct Unreplicated;

impl DrainRule for Unreplicated {
    fn evaluate(&self, ctx: &RuleContext<'_>, pod: &Pod) -> RuleOutcome {
        if ctx.policy.allow_unreplicated_eviction {
            return RuleOutcome::Continue;
        }

        match controller_ref(pod) {
            None => RuleOutcome::Decide(Classification::Blocking(BlockReason::NakedPod)),
            Some(r) if !r.kind.is_known() => {
                RuleOutcome::Decide(Classification::Blocking(BlockReason::UnsupportedController {
                    kind: r.kind.to_string(),
                }))
            }
            Some(_) => RuleOutcome::Continue,
        }
    }

    fn name(&self) -> &str {
        "Unreplicated"
    }
}

/// The owning controller must still exist to recreate the pod elsewhere
pub struct ControllerExists;

impl DrainRule for ControllerExists {
    fn evaluate(&self, ctx: &RuleContext<'_>, pod: &Pod) -> RuleOutcome {
        if !ctx.policy.check_references {
            return RuleOutcome::Continue;
        }

        let reference = match controller_ref(pod) {
            Some(r) if r.kind.is_known() => r,
            _ => return RuleOutcome::Continue,
        };

        let outcome = match ctx.controllers.and_then(|c| c.get(&reference)) {
            Some(o) => o,
            None => return RuleOutcome::NeedsLookup(reference),
        };

        match outcome {
            LookupOutcome::Missing => {
                RuleOutcome::Decide(Classification::Blocking(BlockReason::ControllerNotFound {
                    controller: reference.to_string(),
                }))
            }
            LookupOutcome::Failed(message) => {
                RuleOutcome::Decide(Classification::Unresolved(message.clone()))
            }
            LookupOutcome::Found(info) => match info.replicas {
                Some(replicas) if replicas < ctx.policy.min_replica_count => {
                    RuleOutcome::Decide(Classification::Blocking(BlockReason::TooFewReplicas {
                        controller: reference.to_string(),
                        replicas,
                        min_replicas: ctx.policy.min_replica_count,
                    }))
                }
                _ => RuleOutcome::Continue,
            },
        }
    }

    fn name(&self) -> &str {
        "ControllerExists"
    }
}

/// A namespace with budgets wants every pod selected by one of them
pub struct DisruptionBudget;

impl DrainRule for DisruptionBudget {
    fn evaluate(&self, ctx: &RuleContext<'_>, pod: &Pod) -> RuleOutcome {
        if !ctx.budgets.covered_by(pod).satisfiable {
            return RuleOutcome::Decide(Classification::Blocking(
                BlockReason::DisruptionBudgetUnmatched,
            ));
        }
        RuleOutcome::Continue
    }

    fn name(&self) -> &str {
        "DisruptionBudget"
    }
}

/// kube-system pods may only move when a kube-system budget protects them
pub struct SystemPod;

impl DrainRule for SystemPod {
    fn evaluate(&self, ctx: &RuleContext<'_>, pod: &Pod) -> RuleOutcome {
        if ctx.policy.skip_nodes_with_system_pods
            && pod_namespace(pod) == SYSTEM_NAMESPACE
            && !ctx.budgets.covered_by(pod).covered
        {
            return RuleOutcome::Decide(Classification::Blocking(
                BlockReason::UnprotectedSystemPod,
            ));
        }
        RuleOutcome::Continue
    }

    fn name(&self) -> &str {
        "SystemPod"
    }
}

/// Get the default rule chain, in precedence order
pub fn default_rules() -> Vec<Box<dyn DrainRule>> {
    vec![
        Box::new(UnsafeAnnotation),
        Box::new(SafeAnnotation),
        Box::new(MirrorPod),
        Box::new(DaemonSetPod),
        Box::new(LongTerminating),
        Box::new(TerminalPhase),
        Box::new(LocalStorage),
        Box::new(Unreplicated),
        Box::new(ControllerExists),
        Box::new(DisruptionBudget),
        Box::new(SystemPod),
    ]
}

/// Run a rule chain over a pod; the first rule that does not continue wins
pub fn evaluate_rules(rules: &[Box<dyn DrainRule>], ctx: &RuleContext<'_>, pod: &Pod) -> RuleOutcome {
    for rule in rules {
        match rule.evaluate(ctx, pod) {
            RuleOutcome::Continue => continue,
            outcome => {
                debug!("Pod {} -> {:?} by {}", pod_key(pod), outcome, rule.name());
                return outcome;
            }
        }
    }
    RuleOutcome::Continue
}
