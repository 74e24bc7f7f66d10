use crate::error::{DrainError, Result};
use crate::types::{Classification, PodVerdict};
use drainguard_core::Pod;

/// Per-pod classifications of one evaluation, in input order
#[derive(Debug, Clone, Default)]
pub struct DrainReport {
    pub verdicts: Vec<PodVerdict>,
}

impl DrainReport {
    pub fn new(verdicts: Vec<PodVerdict>) -> Self {
        Self { verdicts }
    }

    /// Pods the drain would evict
    pub fn evictable(&self) -> impl Iterator<Item = &PodVerdict> {
        self.verdicts
            .iter()
            .filter(|v| v.classification == Classification::Evictable)
    }

    /// Pods that abort the drain
    pub fn blocking(&self) -> impl Iterator<Item = &PodVerdict> {
        self.verdicts.iter().filter(|v| v.classification.is_blocking())
    }

    /// Pods left alone
    pub fn skipped(&self) -> impl Iterator<Item = &PodVerdict> {
        self.verdicts
            .iter()
            .filter(|v| matches!(v.classification, Classification::Skip(_)))
    }

    /// Whether the drain may proceed
    pub fn is_drainable(&self) -> bool {
        self.verdicts.iter().all(|v| {
            !matches!(
                v.classification,
                Classification::Blocking(_) | Classification::Unresolved(_)
            )
        })
    }

    /// Collapse the report into the drain decision
    ///
    /// The first blocking pod in input order refuses the drain. Policy refusals
    /// win over lookup failures, so a failed lookup is only reported when no
    /// pod is blocked outright.
    pub fn into_decision(self) -> Result<Vec<Pod>> {
        let mut first_unresolved = None;

        for verdict in &self.verdicts {
            match &verdict.classification {
                Classification::Blocking(reason) => {
                    return Err(DrainError::policy_blocked(
                        verdict.key.clone(),
                        reason.clone(),
                    ));
                }
                Classification::Unresolved(message) if first_unresolved.is_none() => {
                    first_unresolved = Some((verdict.key.clone(), message.clone()));
                }
                _ => {}
            }
        }

        if let Some((pod, message)) = first_unresolved {
            return Err(DrainError::lookup_failed(pod, message));
        }

        Ok(self
            .verdicts
            .into_iter()
            .filter(|v| v.classification == Classification::Evictable)
            .map(|v| v.pod)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlockReason, SkipReason};
    use drainguard_core::{ObjectMeta, PodKey};

    fn pod(name: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn verdict(name: &str, classification: Classification) -> PodVerdict {
        PodVerdict::new(pod(name), classification)
    }

    #[test]
    fn test_evictable_pods_in_input_order() {
        let report = DrainReport::new(vec![
            verdict("c", Classification::Evictable),
            verdict("ds", Classification::Skip(SkipReason::DaemonSetManaged)),
            verdict("a", Classification::Evictable),
        ]);
        assert!(report.is_drainable());
        assert_eq!(report.skipped().count(), 1);

        let pods = report.into_decision().unwrap();
        let names: Vec<_> = pods.iter().filter_map(|p| p.metadata.name.as_deref()).collect();
        assert_eq!(names, vec!["c", "a"]);
    }

    #[test]
    fn test_first_blocking_pod_reported() {
        let report = DrainReport::new(vec![
            verdict("ok", Classification::Evictable),
            verdict("naked", Classification::Blocking(BlockReason::NakedPod)),
            verdict("local", Classification::Blocking(BlockReason::LocalStorage)),
        ]);
        assert_eq!(report.blocking().count(), 2);

        match report.into_decision() {
            Err(DrainError::PolicyBlocked { pod, reason }) => {
                assert_eq!(pod, PodKey::new("default", "naked"));
                assert_eq!(reason, BlockReason::NakedPod);
            }
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[test]
    fn test_policy_block_wins_over_lookup_failure() {
        let report = DrainReport::new(vec![
            verdict("flaky", Classification::Unresolved("timeout".to_string())),
            verdict("naked", Classification::Blocking(BlockReason::NakedPod)),
        ]);
        assert!(matches!(
            report.into_decision(),
            Err(DrainError::PolicyBlocked { .. })
        ));
    }

    #[test]
    fn test_lookup_failure_without_policy_block() {
        let report = DrainReport::new(vec![
            verdict("ok", Classification::Evictable),
            verdict("flaky", Classification::Unresolved("timeout".to_string())),
        ]);
        assert!(!report.is_drainable());
        match report.into_decision() {
            Err(DrainError::LookupFailed { pod, message }) => {
                assert_eq!(pod.name, "flaky");
                assert_eq!(message, "timeout");
            }
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[test]
    fn test_empty_report_drains_nothing() {
        assert!(DrainReport::default().into_decision().unwrap().is_empty());
    }
}
