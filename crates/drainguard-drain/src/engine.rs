use crate::budget::BudgetIndex;
use crate::error::{DrainError, Result};
use crate::report::DrainReport;
use crate::rules::{
    default_rules, evaluate_rules, ControllerStatuses, DrainRule, LookupOutcome, RuleContext,
    RuleOutcome,
};
use crate::types::{Classification, DrainPolicy, PodVerdict};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use drainguard_core::pod::pod_key;
use drainguard_core::{ControllerRef, Pod, PodDisruptionBudget};
use drainguard_resolver::{ControllerResolver, Resolution};
use futures_util::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Configuration for the drain engine
#[derive(Debug, Clone)]
pub struct DrainEngineConfig {
    /// Eligibility policy
    pub policy: DrainPolicy,
    /// Upper bound on controller lookups in flight
    pub max_concurrent_lookups: usize,
    /// Abort the evaluation when lookups take longer than this
    pub evaluation_timeout: Option<Duration>,
}

impl Default for DrainEngineConfig {
    fn default() -> Self {
        Self {
            policy: DrainPolicy::default(),
            max_concurrent_lookups: 8,
            evaluation_timeout: None,
        }
    }
}

/// Decides whether a node's pods may be drained
#[async_trait]
pub trait DrainEvaluator: Send + Sync {
    /// Return the pods to evict, or the reason the drain must not happen
    async fn evaluate(
        &self,
        pods: &[Pod],
        budgets: &[PodDisruptionBudget],
        now: DateTime<Utc>,
        token: &CancellationToken,
    ) -> Result<Vec<Pod>>;
}

/// Drain eligibility engine
///
/// Stateless between evaluations: the budget index and the controller
/// lookup results only live for one call.
pub struct DrainEngine {
    resolver: ControllerResolver,
    config: DrainEngineConfig,
    rules: Vec<Box<dyn DrainRule>>,
}

impl DrainEngine {
    /// Create a new drain engine
    pub fn new(resolver: ControllerResolver, config: DrainEngineConfig) -> Self {
        Self {
            resolver,
            config,
            rules: default_rules(),
        }
    }

    /// Classify every pod, keeping per-pod verdicts
    pub async fn classify(
        &self,
        pods: &[Pod],
        budgets: &[PodDisruptionBudget],
        now: DateTime<Utc>,
        token: &CancellationToken,
    ) -> Result<DrainReport> {
        if token.is_cancelled() {
            return Err(DrainError::cancelled("evaluation cancelled before it started"));
        }

        let budgets = BudgetIndex::new(budgets);
        for pod in pods {
            budgets.check(pod)?;
        }
        let local = RuleContext {
            policy: &self.config.policy,
            now,
            budgets: &budgets,
            controllers: None,
        };

        // Everything that can be decided without the API server
        let outcomes: Vec<RuleOutcome> = pods
            .iter()
            .map(|pod| evaluate_rules(&self.rules, &local, pod))
            .collect();

        let pending: BTreeSet<ControllerRef> = outcomes
            .iter()
            .filter_map(|o| match o {
                RuleOutcome::NeedsLookup(reference) => Some(reference.clone()),
                _ => None,
            })
            .collect();

        debug!(
            "{} of {} pods need a controller lookup ({} distinct controllers)",
            outcomes
                .iter()
                .filter(|o| matches!(o, RuleOutcome::NeedsLookup(_)))
                .count(),
            pods.len(),
            pending.len()
        );

        let statuses = self.lookup_all(pending, token).await?;
        let resolved = RuleContext {
            policy: &self.config.policy,
            now,
            budgets: &budgets,
            controllers: Some(&statuses),
        };

        let mut verdicts = Vec::with_capacity(pods.len());
        for (pod, outcome) in pods.iter().zip(outcomes) {
            let outcome = match outcome {
                RuleOutcome::NeedsLookup(_) => evaluate_rules(&self.rules, &resolved, pod),
                other => other,
            };

            let classification = match outcome {
                RuleOutcome::Decide(c) => c,
                RuleOutcome::Continue => Classification::Evictable,
                RuleOutcome::NeedsLookup(reference) => {
                    return Err(DrainError::internal_error(format!(
                        "controller {} of pod {} was not looked up",
                        reference,
                        pod_key(pod)
                    )));
                }
            };
            verdicts.push(PodVerdict::new(pod.clone(), classification));
        }

        Ok(DrainReport::new(verdicts))
    }

    /// Look up each controller once, bounded by the concurrency limit
    async fn lookup_all(
        &self,
        pending: BTreeSet<ControllerRef>,
        token: &CancellationToken,
    ) -> Result<ControllerStatuses> {
        if pending.is_empty() {
            return Ok(ControllerStatuses::new());
        }

        let resolver = &self.resolver;
        let lookups = stream::iter(pending)
            .map(|reference| async move {
                let outcome = match resolver.resolve_ref(reference.clone()).await {
                    Ok(Resolution::Found { info, .. }) => LookupOutcome::Found(info),
                    Ok(Resolution::Missing { .. }) | Ok(Resolution::NoController) => {
                        LookupOutcome::Missing
                    }
                    Err(e) => {
                        warn!("Lookup of {} failed: {}", reference, e);
                        LookupOutcome::Failed(e.to_string())
                    }
                };
                (reference, outcome)
            })
            .buffer_unordered(self.config.max_concurrent_lookups.max(1))
            .collect::<ControllerStatuses>();

        let timeout = self.config.evaluation_timeout;
        let deadline = async move {
            match timeout {
                Some(t) => tokio::time::sleep(t).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            statuses = lookups => Ok(statuses),
            _ = token.cancelled() => {
                info!("Drain evaluation cancelled during controller lookups");
                Err(DrainError::cancelled("evaluation cancelled by caller"))
            }
            _ = deadline => {
                warn!("Drain evaluation timed out after {:?}", timeout);
                Err(DrainError::cancelled(format!(
                    "controller lookups exceeded the {:?} deadline",
                    timeout.unwrap_or_default()
                )))
            }
        }
    }
}

#[async_trait]
impl DrainEvaluator for DrainEngine {
    async fn evaluate(
        &self,
        pods: &[Pod],
        budgets: &[PodDisruptionBudget],
        now: DateTime<Utc>,
        token: &CancellationToken,
    ) -> Result<Vec<Pod>> {
        let report = self.classify(pods, budgets, now, token).await?;

        for verdict in report.blocking() {
            if let Classification::Blocking(reason) = &verdict.classification {
                warn!("Pod {} blocks the drain: {}", verdict.key, reason);
            }
        }

        let decision = report.into_decision();
        match &decision {
            Ok(evictable) => info!(
                "Drain allowed: {} of {} pods to evict",
                evictable.len(),
                pods.len()
            ),
            Err(e) => info!("Drain refused: {}", e),
        }
        decision
    }
}
