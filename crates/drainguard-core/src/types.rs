use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace used for pods that carry no namespace in their metadata
pub const DEFAULT_NAMESPACE: &str = "default";

/// Namespace holding cluster system workloads
pub const SYSTEM_NAMESPACE: &str = "kube-system";

/// PodKey identifies a pod within the cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PodKey {
    /// Pod namespace
    pub namespace: String,
    /// Pod name
    pub name: String,
}

impl PodKey {
    /// Create a new PodKey
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Kind of workload controller that owns a pod
///
/// Owner references carry the kind as a free-form string. Everything the
/// drain engine knows how to confirm is listed here; anything else ends up in
/// `Unknown` and is never looked up.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ControllerKind {
    ReplicationController,
    ReplicaSet,
    Job,
    DaemonSet,
    StatefulSet,
    Unknown(String),
}

impl ControllerKind {
    /// Map an owner reference kind string onto a controller kind
    pub fn from_kind(kind: &str) -> Self {
        match kind {
            "ReplicationController" => Self::ReplicationController,
            "ReplicaSet" => Self::ReplicaSet,
            "Job" => Self::Job,
            "DaemonSet" => Self::DaemonSet,
            "StatefulSet" => Self::StatefulSet,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The owner reference kind string
    pub fn as_str(&self) -> &str {
        match self {
            Self::ReplicationController => "ReplicationController",
            Self::ReplicaSet => "ReplicaSet",
            Self::Job => "Job",
            Self::DaemonSet => "DaemonSet",
            Self::StatefulSet => "StatefulSet",
            Self::Unknown(kind) => kind,
        }
    }

    /// API path segment (group/version) serving this kind
    pub fn api_group_path(&self) -> Option<&'static str> {
        match self {
            Self::ReplicationController => Some("api/v1"),
            Self::ReplicaSet | Self::DaemonSet | Self::StatefulSet => Some("apis/apps/v1"),
            Self::Job => Some("apis/batch/v1"),
            Self::Unknown(_) => None,
        }
    }

    /// Plural resource name of the collection
    pub fn resource_name(&self) -> Option<&'static str> {
        match self {
            Self::ReplicationController => Some("replicationcontrollers"),
            Self::ReplicaSet => Some("replicasets"),
            Self::Job => Some("jobs"),
            Self::DaemonSet => Some("daemonsets"),
            Self::StatefulSet => Some("statefulsets"),
            Self::Unknown(_) => None,
        }
    }

    /// Whether the drain engine can confirm this controller through a lookup
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ControllerRef points at the controller object owning a pod
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ControllerRef {
    pub kind: ControllerKind,
    pub namespace: String,
    pub name: String,
}

impl ControllerRef {
    /// Create a new ControllerRef
    pub fn new(kind: ControllerKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Get the API path of the referenced object, if its kind is known
    pub fn api_path(&self) -> Option<String> {
        let base = self.kind.api_group_path()?;
        let resource = self.kind.resource_name()?;
        Some(format!(
            "/{}/namespaces/{}/{}/{}",
            base, self.namespace, resource, self.name
        ))
    }
}

impl fmt::Display for ControllerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// What a successful controller lookup reports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerInfo {
    /// Desired replica count (`spec.replicas`), when the kind has one
    pub replicas: Option<i32>,
}

impl ControllerInfo {
    /// Create a ControllerInfo with a replica count
    pub fn with_replicas(replicas: i32) -> Self {
        Self {
            replicas: Some(replicas),
        }
    }
}
