//! Read-only inspection helpers for pods.
//!
//! The drain rules never touch raw pod fields directly; everything they need
//! goes through these functions so that defaults (missing namespace, missing
//! status) are applied in one place.

use crate::types::{ControllerKind, ControllerRef, PodKey, DEFAULT_NAMESPACE};
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use std::collections::BTreeMap;

/// Annotation operators set to override the drain decision for a pod
pub const SAFE_TO_EVICT_ANNOTATION: &str = "cluster-autoscaler.kubernetes.io/safe-to-evict";

/// Annotation the kubelet sets on the API mirror of a static pod
pub const MIRROR_POD_ANNOTATION: &str = "kubernetes.io/config.mirror";

/// Value of the safe-to-evict annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafeToEvict {
    /// Annotation absent, or set to something other than "true"/"false"
    Unset,
    Safe,
    Unsafe,
}

/// Namespace of a pod, falling back to "default" when unset or empty
pub fn pod_namespace(pod: &Pod) -> &str {
    match pod.metadata.namespace.as_deref() {
        Some(ns) if !ns.is_empty() => ns,
        _ => DEFAULT_NAMESPACE,
    }
}

/// Name of a pod, or "<unknown>" when it has none
pub fn pod_name(pod: &Pod) -> &str {
    pod.metadata.name.as_deref().unwrap_or("<unknown>")
}

/// Identity of a pod
pub fn pod_key(pod: &Pod) -> PodKey {
    PodKey::new(pod_namespace(pod), pod_name(pod))
}

/// Labels of a pod (empty if unset)
pub fn pod_labels(pod: &Pod) -> BTreeMap<String, String> {
    pod.metadata.labels.clone().unwrap_or_default()
}

fn annotation<'a>(pod: &'a Pod, key: &str) -> Option<&'a str> {
    pod.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(key))
        .map(String::as_str)
}

/// Read the safe-to-evict annotation
pub fn safe_to_evict(pod: &Pod) -> SafeToEvict {
    match annotation(pod, SAFE_TO_EVICT_ANNOTATION) {
        Some("true") => SafeToEvict::Safe,
        Some("false") => SafeToEvict::Unsafe,
        _ => SafeToEvict::Unset,
    }
}

/// Whether the pod is the API mirror of a kubelet static pod
pub fn is_mirror_pod(pod: &Pod) -> bool {
    annotation(pod, MIRROR_POD_ANNOTATION).is_some()
}

/// When deletion of the pod was requested, if it was
pub fn deletion_timestamp(pod: &Pod) -> Option<DateTime<Utc>> {
    pod.metadata.deletion_timestamp.as_ref().map(|t| t.0)
}

/// Lifecycle phase of the pod ("" when the status is missing)
pub fn pod_phase(pod: &Pod) -> &str {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .unwrap_or("")
}

/// Succeeded and Failed pods are no longer run by the kubelet
pub fn is_terminal(pod: &Pod) -> bool {
    matches!(pod_phase(pod), "Succeeded" | "Failed")
}

/// Whether the pod mounts node-local scratch storage (emptyDir)
pub fn has_local_storage(pod: &Pod) -> bool {
    pod.spec
        .as_ref()
        .and_then(|s| s.volumes.as_ref())
        .map(|volumes| volumes.iter().any(|v| v.empty_dir.is_some()))
        .unwrap_or(false)
}

/// The owner reference flagged as the pod's controller
///
/// Owner references without `controller: true` do not recreate the pod and are
/// ignored. Owner references are namespace-local, so the controller lives in
/// the pod's namespace.
pub fn controller_ref(pod: &Pod) -> Option<ControllerRef> {
    let owner = pod
        .metadata
        .owner_references
        .as_ref()?
        .iter()
        .find(|r| r.controller == Some(true))?;

    Some(ControllerRef::new(
        ControllerKind::from_kind(&owner.kind),
        pod_namespace(pod),
        owner.name.clone(),
    ))
}
