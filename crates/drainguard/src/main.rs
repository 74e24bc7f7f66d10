use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use drainguard_core::pod::pod_key;
use drainguard_core::{
    load_items, ControllerInfo, ControllerKind, ControllerRef, Pod, PodDisruptionBudget,
    DEFAULT_NAMESPACE,
};
use drainguard_drain::{Classification, DrainEngine, DrainEngineConfig, DrainPolicy};
use drainguard_resolver::{ApiClient, ApiClientConfig, ControllerLookup, ControllerResolver, MockLookup};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "drainguard", about = "Decide whether a node's pods may be drained")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a snapshot of a node's pods
    Evaluate(EvaluateArgs),
}

#[derive(Args)]
struct EvaluateArgs {
    /// YAML or JSON file with the pods running on the node
    #[arg(long)]
    pods: PathBuf,
    /// YAML or JSON file with the cluster's PodDisruptionBudgets
    #[arg(long)]
    budgets: Option<PathBuf>,
    /// API server used to confirm owning controllers
    #[arg(long, env = "DRAINGUARD_API_URL")]
    api_url: Option<String>,
    /// Bearer token for the API server
    #[arg(long, env = "DRAINGUARD_TOKEN", hide_env_values = true)]
    token: Option<String>,
    /// Offline controller registry, used when no API server is given
    #[arg(long, conflicts_with = "api_url")]
    controllers: Option<PathBuf>,
    /// Timeout for each controller lookup, in seconds
    #[arg(long, default_value_t = 10)]
    request_timeout_secs: u64,
    /// Abort the evaluation after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Maximum controller lookups in flight
    #[arg(long, default_value_t = 8)]
    max_concurrent_lookups: usize,
    /// Evaluation time (RFC 3339); defaults to now
    #[arg(long, value_parser = parse_time)]
    now: Option<DateTime<Utc>>,
    /// Print the classification of every pod
    #[arg(long)]
    explain: bool,
    #[command(flatten)]
    policy: PolicyArgs,
}

#[derive(Args)]
struct PolicyArgs {
    /// Allow evicting pods with emptyDir volumes
    #[arg(long, env = "DRAINGUARD_ALLOW_LOCAL_STORAGE")]
    allow_local_storage: bool,
    /// Allow evicting pods no controller will recreate
    #[arg(long, env = "DRAINGUARD_ALLOW_UNREPLICATED")]
    allow_unreplicated: bool,
    /// Seconds a deleted pod may stay around before it is ignored
    #[arg(long, default_value_t = 30)]
    grace_period_secs: u64,
    /// Block kube-system pods that no kube-system disruption budget selects
    #[arg(long, env = "DRAINGUARD_GUARD_SYSTEM_PODS")]
    guard_system_pods: bool,
    /// Do not confirm that owning controllers exist
    #[arg(long)]
    skip_reference_checks: bool,
    /// Block pods whose controller wants fewer replicas than this
    #[arg(long, default_value_t = 0)]
    min_replicas: i32,
}

impl PolicyArgs {
    fn to_policy(&self) -> DrainPolicy {
        DrainPolicy {
            allow_local_storage_eviction: self.allow_local_storage,
            allow_unreplicated_eviction: self.allow_unreplicated,
            termination_grace_period: Duration::from_secs(self.grace_period_secs),
            skip_nodes_with_system_pods: self.guard_system_pods,
            check_references: !self.skip_reference_checks,
            min_replica_count: self.min_replicas,
        }
    }
}

/// One entry of an offline controller registry
#[derive(Debug, Deserialize)]
struct ControllerEntry {
    kind: String,
    #[serde(default = "default_namespace")]
    namespace: String,
    name: String,
    #[serde(default)]
    replicas: Option<i32>,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 time '{}': {}", s, e))
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate(args) => run_evaluate(args).await,
    }
}

/// Evaluate one node snapshot and print the pods to evict
async fn run_evaluate(args: EvaluateArgs) -> miette::Result<()> {
    let pods: Vec<Pod> = load_items(&args.pods)?;
    let budgets: Vec<PodDisruptionBudget> = match &args.budgets {
        Some(path) => load_items(path)?,
        None => Vec::new(),
    };
    info!(
        "Loaded {} pods and {} disruption budgets",
        pods.len(),
        budgets.len()
    );

    let lookup = create_lookup(&args).await?;
    let config = DrainEngineConfig {
        policy: args.policy.to_policy(),
        max_concurrent_lookups: args.max_concurrent_lookups,
        evaluation_timeout: args.timeout_secs.map(Duration::from_secs),
    };
    let engine = DrainEngine::new(ControllerResolver::new(lookup), config);

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling evaluation");
            signal_token.cancel();
        }
    });

    let now = args.now.unwrap_or_else(Utc::now);
    let report = engine.classify(&pods, &budgets, now, &token).await?;

    if args.explain {
        for verdict in &report.verdicts {
            println!("{}\t{}", verdict.key, describe(&verdict.classification));
        }
    }

    let evictable = report.into_decision()?;
    info!("Drain allowed, {} pods to evict", evictable.len());
    if !args.explain {
        for pod in &evictable {
            println!("{}", pod_key(pod));
        }
    }

    Ok(())
}

/// Pick the controller lookup: the API server, or an offline registry
async fn create_lookup(args: &EvaluateArgs) -> miette::Result<Arc<dyn ControllerLookup>> {
    if let Some(url) = &args.api_url {
        let config = ApiClientConfig {
            bearer_token: args.token.clone(),
            request_timeout: Duration::from_secs(args.request_timeout_secs),
            ..ApiClientConfig::new(url.clone())
        };
        info!("Confirming controllers against {}", url);
        return Ok(Arc::new(ApiClient::new(config)?));
    }

    let registry = match &args.controllers {
        Some(path) => load_controllers(path).await?,
        None => {
            if !args.policy.skip_reference_checks {
                warn!("No API server or controller registry given; every owning controller will be reported missing");
            }
            MockLookup::new()
        }
    };
    Ok(Arc::new(registry))
}

/// Load an offline controller registry file
async fn load_controllers(path: &Path) -> miette::Result<MockLookup> {
    let entries: Vec<ControllerEntry> = load_items(path)?;
    let registry = MockLookup::new();

    for entry in entries {
        let reference = ControllerRef::new(
            ControllerKind::from_kind(&entry.kind),
            entry.namespace,
            entry.name,
        );
        registry
            .add_controller(reference, ControllerInfo { replicas: entry.replicas })
            .await;
    }
    Ok(registry)
}

fn describe(classification: &Classification) -> String {
    match classification {
        Classification::Evictable => "evict".to_string(),
        Classification::Skip(reason) => format!("skip: {}", reason),
        Classification::Blocking(reason) => format!("block [{}]: {}", reason.code(), reason),
        Classification::Unresolved(message) => format!("unresolved: {}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drainguard_drain::{BlockReason, SkipReason};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn parse(args: &[&str]) -> EvaluateArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Evaluate(args) => args,
        }
    }

    #[test]
    fn test_default_flags_give_default_policy() {
        let args = parse(&["drainguard", "evaluate", "--pods", "pods.yaml"]);
        let policy = args.policy.to_policy();
        let defaults = DrainPolicy::default();

        assert_eq!(policy.allow_local_storage_eviction, defaults.allow_local_storage_eviction);
        assert_eq!(policy.allow_unreplicated_eviction, defaults.allow_unreplicated_eviction);
        assert_eq!(policy.termination_grace_period, defaults.termination_grace_period);
        assert_eq!(policy.skip_nodes_with_system_pods, defaults.skip_nodes_with_system_pods);
        assert_eq!(policy.check_references, defaults.check_references);
        assert_eq!(policy.min_replica_count, defaults.min_replica_count);
        assert_eq!(args.max_concurrent_lookups, 8);
    }

    #[test]
    fn test_policy_flags() {
        let args = parse(&[
            "drainguard",
            "evaluate",
            "--pods",
            "pods.yaml",
            "--allow-local-storage",
            "--guard-system-pods",
            "--skip-reference-checks",
            "--min-replicas",
            "2",
            "--grace-period-secs",
            "120",
        ]);
        let policy = args.policy.to_policy();

        assert!(policy.allow_local_storage_eviction);
        assert!(policy.skip_nodes_with_system_pods);
        assert!(!policy.check_references);
        assert_eq!(policy.min_replica_count, 2);
        assert_eq!(policy.termination_grace_period, Duration::from_secs(120));
    }

    #[test]
    fn test_now_must_be_rfc3339() {
        let args = parse(&[
            "drainguard",
            "evaluate",
            "--pods",
            "pods.yaml",
            "--now",
            "2024-05-01T12:00:00+02:00",
        ]);
        assert_eq!(args.now.unwrap().to_rfc3339(), "2024-05-01T10:00:00+00:00");

        assert!(Cli::try_parse_from(["drainguard", "evaluate", "--pods", "p", "--now", "yesterday"]).is_err());
    }

    #[test]
    fn test_registry_conflicts_with_api_url() {
        let result = Cli::try_parse_from([
            "drainguard",
            "evaluate",
            "--pods",
            "p",
            "--api-url",
            "http://127.0.0.1:6443",
            "--controllers",
            "c.yaml",
        ]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_load_controllers() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "- kind: ReplicaSet\n  name: web\n  replicas: 3\n- kind: Job\n  namespace: batch\n  name: nightly"
        )
        .unwrap();

        let registry = load_controllers(file.path()).await.unwrap();
        let web = registry
            .get_controller(&ControllerRef::new(ControllerKind::ReplicaSet, "default", "web"))
            .await
            .unwrap();
        assert_eq!(web, Some(ControllerInfo::with_replicas(3)));

        let nightly = registry
            .get_controller(&ControllerRef::new(ControllerKind::Job, "batch", "nightly"))
            .await
            .unwrap();
        assert_eq!(nightly, Some(ControllerInfo::default()));
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(&Classification::Evictable), "evict");
        assert_eq!(
            describe(&Classification::Skip(SkipReason::DaemonSetManaged)),
            "skip: managed by a DaemonSet"
        );
        assert!(describe(&Classification::Blocking(BlockReason::NakedPod)).starts_with("block [naked-pod]"));
    }
}
