//! Domain types for the ranking engine.
//!
//! These types describe the read-only world a scheduling cycle sees:
//! nodes with their allocatable resources, labels and taints, the pod
//! being placed, and the pods already running in the cluster. All types
//! are serializable to/from JSON so snapshots can be handed over from
//! whatever component owns cluster state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique identifier for a node in the cluster.
pub type NodeName = String;

/// Well-known topology labels.
pub const LABEL_HOSTNAME: &str = "kubernetes.io/hostname";
pub const LABEL_ZONE: &str = "topology.kubernetes.io/zone";
pub const LABEL_REGION: &str = "topology.kubernetes.io/region";
pub const LABEL_ZONE_LEGACY: &str = "failure-domain.beta.kubernetes.io/zone";
pub const LABEL_REGION_LEGACY: &str = "failure-domain.beta.kubernetes.io/region";

/// Namespace assumed for pods and services that don't name one.
pub const DEFAULT_NAMESPACE: &str = "default";

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

// ── Resources ──────────────────────────────────────────────────────

/// A bundle of schedulable resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resources {
    /// CPU in thousandths of a core.
    pub milli_cpu: u64,
    /// Memory in bytes.
    pub memory: u64,
    /// Number of pods.
    pub pods: u64,
    /// Extended resources (`example.com/gpu` → count).
    pub extended: BTreeMap<String, u64>,
}

impl Resources {
    pub fn new(milli_cpu: u64, memory: u64) -> Self {
        Self {
            milli_cpu,
            memory,
            ..Default::default()
        }
    }

    /// CPU and memory with zero requests replaced by the given defaults.
    ///
    /// Pods that request nothing still consume something once running,
    /// so resource-based scoring counts them at a nominal size.
    pub fn non_zero(&self, default_milli_cpu: u64, default_memory: u64) -> (u64, u64) {
        let cpu = if self.milli_cpu == 0 {
            default_milli_cpu
        } else {
            self.milli_cpu
        };
        let mem = if self.memory == 0 {
            default_memory
        } else {
            self.memory
        };
        (cpu, mem)
    }
}

// ── Node ───────────────────────────────────────────────────────────

/// A machine capable of hosting pods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: NodeName,
    pub allocatable: Resources,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub taints: Vec<Taint>,
}

impl Node {
    pub fn new(name: impl Into<String>, allocatable: Resources) -> Self {
        Self {
            name: name.into(),
            allocatable,
            labels: BTreeMap::new(),
            taints: Vec::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_taint(mut self, taint: Taint) -> Self {
        self.taints.push(taint);
        self
    }

    /// Zone identifier combining region and zone labels.
    ///
    /// Returns `None` when the node carries neither label. The separator
    /// contains a NUL byte so it can never collide with a label value.
    pub fn zone_key(&self) -> Option<String> {
        let region = self
            .labels
            .get(LABEL_REGION)
            .or_else(|| self.labels.get(LABEL_REGION_LEGACY))
            .map(String::as_str)
            .unwrap_or("");
        let zone = self
            .labels
            .get(LABEL_ZONE)
            .or_else(|| self.labels.get(LABEL_ZONE_LEGACY))
            .map(String::as_str)
            .unwrap_or("");

        if region.is_empty() && zone.is_empty() {
            return None;
        }
        Some(format!("{region}:\x00:{zone}"))
    }
}

/// Effect a taint has on pods that do not tolerate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaintEffect {
    NoSchedule,
    PreferNoSchedule,
    NoExecute,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taint {
    pub key: String,
    #[serde(default)]
    pub value: String,
    pub effect: TaintEffect,
}

// ── Pod ────────────────────────────────────────────────────────────

/// The workload descriptor being placed, or one already running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pod {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub requests: Resources,
    #[serde(default)]
    pub affinity: Option<Affinity>,
    #[serde(default)]
    pub tolerations: Vec<Toleration>,
    /// Owning replica controller, if any.
    #[serde(default)]
    pub controller: Option<ControllerRef>,
}

impl Pod {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            labels: BTreeMap::new(),
            requests: Resources::default(),
            affinity: None,
            tolerations: Vec::new(),
            controller: None,
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_requests(mut self, requests: Resources) -> Self {
        self.requests = requests;
        self
    }

    pub fn with_controller(mut self, controller: ControllerRef) -> Self {
        self.controller = Some(controller);
        self
    }

    /// `{namespace}/{name}`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Reference to the controller that owns a pod's replicas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerRef {
    /// `ReplicaSet`, `StatefulSet`, `ReplicationController`, ...
    pub kind: String,
    pub name: String,
    /// Label selector in string form, e.g. `app=web,tier in (frontend)`.
    pub selector: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Affinity {
    pub node_affinity: Option<NodeAffinity>,
    pub pod_affinity: Option<PodAffinity>,
    pub pod_anti_affinity: Option<PodAffinity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeAffinity {
    /// Soft node preferences; each matched term adds its weight.
    pub preferred: Vec<PreferredSchedulingTerm>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferredSchedulingTerm {
    /// Must be in `1..=100`.
    pub weight: i32,
    pub preference: NodeSelectorTerm,
}

/// Conjunction of node label requirements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSelectorTerm {
    pub match_expressions: Vec<NodeSelectorRequirement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSelectorRequirement {
    pub key: String,
    pub operator: NodeSelectorOperator,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeSelectorOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
    Gt,
    Lt,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PodAffinity {
    pub preferred: Vec<WeightedPodAffinityTerm>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedPodAffinityTerm {
    /// Must be in `1..=100`.
    pub weight: i32,
    pub term: PodAffinityTerm,
}

/// Co-location rule relative to pods matching `label_selector`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodAffinityTerm {
    pub label_selector: String,
    /// Namespaces to search; empty means the owning pod's namespace.
    #[serde(default)]
    pub namespaces: Vec<String>,
    /// Node label whose value defines the topology domain.
    pub topology_key: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TolerationOperator {
    #[default]
    Equal,
    Exists,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Toleration {
    /// Empty key with `Exists` tolerates every taint.
    pub key: String,
    pub operator: TolerationOperator,
    pub value: String,
    /// `None` matches every effect.
    pub effect: Option<TaintEffect>,
}

impl Toleration {
    pub fn tolerates(&self, taint: &Taint) -> bool {
        if self.effect.is_some_and(|e| e != taint.effect) {
            return false;
        }
        if !self.key.is_empty() && self.key != taint.key {
            return false;
        }
        match self.operator {
            TolerationOperator::Exists => true,
            TolerationOperator::Equal => self.value == taint.value,
        }
    }
}

// ── Cluster state ──────────────────────────────────────────────────

/// A service fronting a set of pods, used as a spreading hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
}

/// A pod already bound to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedPod {
    pub node_name: NodeName,
    pub pod: Pod,
}

/// Point-in-time, read-only view of the cluster for one scheduling cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub pods: Vec<PlacedPod>,
    #[serde(default)]
    pub services: Vec<Service>,
}

impl ClusterSnapshot {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            nodes,
            pods: Vec::new(),
            services: Vec::new(),
        }
    }

    pub fn with_pod(mut self, node_name: impl Into<String>, pod: Pod) -> Self {
        self.pods.push(PlacedPod {
            node_name: node_name.into(),
            pod,
        });
        self
    }

    pub fn with_service(mut self, service: Service) -> Self {
        self.services.push(service);
        self
    }
}
