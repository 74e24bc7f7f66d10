//! Drainguard Drain - decides whether a node may be drained
//!
//! This crate provides:
//! - Drain rules (annotations, ownership, local storage, phase, budgets)
//! - A per-namespace disruption budget index
//! - The drain engine with bounded, deduplicated controller lookups
//! - Per-pod drain reports

pub mod error;
pub mod types;
pub mod budget;
pub mod rules;
pub mod report;
pub mod engine;

// Re-export commonly used types
pub use error::{DrainError, Result};
pub use budget::{BudgetCoverage, BudgetIndex};
pub use engine::{DrainEngine, DrainEngineConfig, DrainEvaluator};
pub use report::DrainReport;
pub use rules::{default_rules, DrainRule, LookupOutcome, RuleContext, RuleOutcome};
pub use types::{BlockReason, Classification, DrainPolicy, PodVerdict, SkipReason};
