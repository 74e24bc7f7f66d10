//! Per-namespace index of disruption budget selectors.
//!
//! Budgets only ever protect pods in their own namespace. A namespace that
//! carries at least one budget expects every pod in it to be selected by one
//! of them.

use crate::error::{DrainError, Result};
use drainguard_core::pod::{pod_labels, pod_namespace};
use drainguard_core::{Pod, PodDisruptionBudget};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

/// Result of testing a pod against the budgets of its namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetCoverage {
    /// Some budget selects the pod
    pub covered: bool,
    /// False when the namespace has budgets but none selects the pod
    pub satisfiable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

#[derive(Debug, Clone)]
struct Requirement {
    key: String,
    operator: Operator,
    values: BTreeSet<String>,
}

impl Requirement {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self.operator {
            Operator::In => labels
                .get(&self.key)
                .map(|v| self.values.contains(v))
                .unwrap_or(false),
            Operator::NotIn => labels
                .get(&self.key)
                .map(|v| !self.values.contains(v))
                .unwrap_or(true),
            Operator::Exists => labels.contains_key(&self.key),
            Operator::DoesNotExist => !labels.contains_key(&self.key),
        }
    }
}

/// A compiled label selector
#[derive(Debug, Clone)]
enum Selector {
    /// A budget without a selector protects nothing
    Nothing,
    /// All labels and all requirements must match; an empty selector matches everything
    Match {
        labels: BTreeMap<String, String>,
        requirements: Vec<Requirement>,
    },
}

impl Selector {
    /// Compile a selector; the error names what is wrong with it
    fn compile(selector: Option<&LabelSelector>) -> std::result::Result<Self, String> {
        let selector = match selector {
            Some(s) => s,
            None => return Ok(Self::Nothing),
        };

        let mut requirements = Vec::new();
        for expr in selector.match_expressions.iter().flatten() {
            let values: BTreeSet<String> = expr.values.iter().flatten().cloned().collect();
            let operator = match expr.operator.as_str() {
                "In" => Operator::In,
                "NotIn" => Operator::NotIn,
                "Exists" => Operator::Exists,
                "DoesNotExist" => Operator::DoesNotExist,
                other => return Err(format!("unknown selector operator '{}'", other)),
            };

            match operator {
                Operator::In | Operator::NotIn if values.is_empty() => {
                    return Err(format!(
                        "operator {} on '{}' requires values",
                        expr.operator, expr.key
                    ));
                }
                Operator::Exists | Operator::DoesNotExist if !values.is_empty() => {
                    return Err(format!(
                        "operator {} on '{}' takes no values",
                        expr.operator, expr.key
                    ));
                }
                _ => {}
            }

            requirements.push(Requirement {
                key: expr.key.clone(),
                operator,
                values,
            });
        }

        Ok(Self::Match {
            labels: selector.match_labels.clone().unwrap_or_default(),
            requirements,
        })
    }

    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Self::Nothing => false,
            Self::Match {
                labels: wanted,
                requirements,
            } => {
                wanted.iter().all(|(k, v)| labels.get(k) == Some(v))
                    && requirements.iter().all(|r| r.matches(labels))
            }
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledBudget {
    name: String,
    selector: Selector,
}

/// Disruption budgets grouped by namespace
///
/// A budget whose selector cannot be compiled is remembered against its
/// namespace; only pods in that namespace see the error.
#[derive(Debug, Clone, Default)]
pub struct BudgetIndex {
    by_namespace: HashMap<String, Vec<CompiledBudget>>,
    invalid: HashMap<String, (String, String)>,
}

impl BudgetIndex {
    /// Build the index from a snapshot of budgets
    pub fn new(budgets: &[PodDisruptionBudget]) -> Self {
        let mut by_namespace: HashMap<String, Vec<CompiledBudget>> = HashMap::new();
        let mut invalid = HashMap::new();

        for pdb in budgets {
            let name = pdb.metadata.name.clone().unwrap_or_default();
            let namespace = match pdb.metadata.namespace.as_deref() {
                Some(ns) if !ns.is_empty() => ns,
                _ => {
                    debug!("Ignoring disruption budget '{}' without a namespace", name);
                    continue;
                }
            };

            match Selector::compile(pdb.spec.as_ref().and_then(|s| s.selector.as_ref())) {
                Ok(selector) => by_namespace
                    .entry(namespace.to_string())
                    .or_default()
                    .push(CompiledBudget { name, selector }),
                Err(message) => {
                    let qualified = format!("{}/{}", namespace, name);
                    warn!("Disruption budget {} is invalid: {}", qualified, message);
                    invalid
                        .entry(namespace.to_string())
                        .or_insert((qualified, message));
                }
            }
        }

        debug!(
            "Indexed disruption budgets in {} namespaces",
            by_namespace.len()
        );
        Self {
            by_namespace,
            invalid,
        }
    }

    /// Fail when the pod's namespace holds a budget that cannot be evaluated
    pub fn check(&self, pod: &Pod) -> Result<()> {
        match self.invalid.get(pod_namespace(pod)) {
            Some((budget, message)) => Err(DrainError::invalid_budget(budget, message)),
            None => Ok(()),
        }
    }

    /// Test a pod against the budgets of its own namespace
    pub fn covered_by(&self, pod: &Pod) -> BudgetCoverage {
        let budgets = match self.by_namespace.get(pod_namespace(pod)) {
            Some(b) if !b.is_empty() => b,
            _ => {
                return BudgetCoverage {
                    covered: false,
                    satisfiable: true,
                }
            }
        };

        let labels = pod_labels(pod);
        match budgets.iter().find(|b| b.selector.matches(&labels)) {
            Some(budget) => {
                debug!(
                    "Pod {} selected by budget {}",
                    drainguard_core::pod::pod_key(pod),
                    budget.name
                );
                BudgetCoverage {
                    covered: true,
                    satisfiable: true,
                }
            }
            None => BudgetCoverage {
                covered: false,
                satisfiable: false,
            },
        }
    }

    /// Number of namespaces carrying at least one budget
    pub fn namespace_count(&self) -> usize {
        self.by_namespace.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drainguard_core::ObjectMeta;
    use k8s_openapi::api::policy::v1::PodDisruptionBudgetSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelectorRequirement;

    fn budget(namespace: Option<&str>, selector: Option<LabelSelector>) -> PodDisruptionBudget {
        PodDisruptionBudget {
            metadata: ObjectMeta {
                name: Some("pdb".to_string()),
                namespace: namespace.map(str::to_string),
                ..Default::default()
            },
            spec: Some(PodDisruptionBudgetSpec {
                selector,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn match_labels(pairs: &[(&str, &str)]) -> Option<LabelSelector> {
        Some(LabelSelector {
            match_labels: Some(
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            ..Default::default()
        })
    }

    fn expression(key: &str, operator: &str, values: &[&str]) -> Option<LabelSelector> {
        Some(LabelSelector {
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: key.to_string(),
                operator: operator.to_string(),
                values: if values.is_empty() {
                    None
                } else {
                    Some(values.iter().map(|v| v.to_string()).collect())
                },
            }]),
            ..Default::default()
        })
    }

    fn pod(namespace: &str, labels: &[(&str, &str)]) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("bar".to_string()),
                namespace: Some(namespace.to_string()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    const UNCONSTRAINED: BudgetCoverage = BudgetCoverage {
        covered: false,
        satisfiable: true,
    };
    const COVERED: BudgetCoverage = BudgetCoverage {
        covered: true,
        satisfiable: true,
    };
    const UNMATCHED: BudgetCoverage = BudgetCoverage {
        covered: false,
        satisfiable: false,
    };

    #[test]
    fn test_namespace_without_budgets_is_unconstrained() {
        let index = BudgetIndex::new(&[budget(Some("kube-system"), match_labels(&[("k8s-app", "bar")]))]);
        assert_eq!(index.covered_by(&pod("default", &[("k8s-app", "bar")])), UNCONSTRAINED);
    }

    #[test]
    fn test_matching_budget_covers_pod() {
        let index = BudgetIndex::new(&[budget(Some("kube-system"), match_labels(&[("k8s-app", "bar")]))]);
        assert_eq!(index.covered_by(&pod("kube-system", &[("k8s-app", "bar")])), COVERED);
    }

    #[test]
    fn test_non_matching_budget_is_unsatisfiable() {
        let index = BudgetIndex::new(&[budget(Some("kube-system"), match_labels(&[("k8s-app", "foo")]))]);
        assert_eq!(index.covered_by(&pod("kube-system", &[("k8s-app", "bar")])), UNMATCHED);
    }

    #[test]
    fn test_any_of_several_budgets_may_match() {
        let index = BudgetIndex::new(&[
            budget(Some("web"), match_labels(&[("app", "api")])),
            budget(Some("web"), match_labels(&[("app", "frontend")])),
        ]);
        assert_eq!(index.covered_by(&pod("web", &[("app", "frontend")])), COVERED);
        assert_eq!(index.covered_by(&pod("web", &[("app", "worker")])), UNMATCHED);
    }

    #[test]
    fn test_missing_selector_matches_nothing() {
        let index = BudgetIndex::new(&[budget(Some("web"), None)]);
        assert_eq!(index.covered_by(&pod("web", &[("app", "api")])), UNMATCHED);
    }

    #[test]
    fn test_empty_selector_matches_everything() {
        let index = BudgetIndex::new(&[budget(Some("web"), Some(LabelSelector::default()))]);
        assert_eq!(index.covered_by(&pod("web", &[])), COVERED);
    }

    #[test]
    fn test_budget_without_namespace_is_ignored() {
        let index = BudgetIndex::new(&[PodDisruptionBudget::default()]);
        assert_eq!(index.namespace_count(), 0);
        assert_eq!(index.covered_by(&pod("default", &[])), UNCONSTRAINED);
    }

    #[test]
    fn test_match_expressions() {
        let labels = [("tier", "cache"), ("zone", "a")];

        let cases = [
            (expression("tier", "In", &["cache", "db"]), true),
            (expression("tier", "In", &["db"]), false),
            (expression("tier", "NotIn", &["db"]), true),
            (expression("missing", "NotIn", &["db"]), true),
            (expression("zone", "Exists", &[]), true),
            (expression("zone", "DoesNotExist", &[]), false),
            (expression("missing", "DoesNotExist", &[]), true),
        ];

        for (selector, expected) in cases {
            let index = BudgetIndex::new(&[budget(Some("ns"), selector.clone())]);
            let coverage = index.covered_by(&pod("ns", &labels));
            assert_eq!(coverage.covered, expected, "selector {:?}", selector);
        }
    }

    #[test]
    fn test_labels_and_expressions_must_both_match() {
        let mut selector = match_labels(&[("app", "api")]).unwrap();
        selector.match_expressions = expression("tier", "In", &["web"]).unwrap().match_expressions;
        let index = BudgetIndex::new(&[budget(Some("ns"), Some(selector))]);

        assert!(index.covered_by(&pod("ns", &[("app", "api"), ("tier", "web")])).covered);
        assert!(!index.covered_by(&pod("ns", &[("app", "api"), ("tier", "db")])).covered);
    }

    #[test]
    fn test_invalid_selectors_rejected() {
        for selector in [
            expression("tier", "Matches", &["x"]),
            expression("tier", "In", &[]),
            expression("tier", "Exists", &["x"]),
        ] {
            let index = BudgetIndex::new(&[budget(Some("ns"), selector)]);
            assert!(matches!(
                index.check(&pod("ns", &[])),
                Err(DrainError::InvalidBudget { .. })
            ));
        }
    }

    #[test]
    fn test_invalid_budget_only_affects_its_namespace() {
        let index = BudgetIndex::new(&[
            budget(Some("other"), expression("tier", "Matches", &["x"])),
            budget(Some("web"), match_labels(&[("app", "api")])),
        ]);

        assert!(index.check(&pod("default", &[])).is_ok());
        assert!(index.check(&pod("web", &[("app", "api")])).is_ok());
        match index.check(&pod("other", &[])) {
            Err(DrainError::InvalidBudget { budget, message }) => {
                assert_eq!(budget, "other/pdb");
                assert!(message.contains("Matches"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
