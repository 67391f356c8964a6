//! Per-cycle index over a [`ClusterSnapshot`].
//!
//! Priority functions need, for every node, the pods already bound to it
//! and the resources those pods request. Computing that once per cycle
//! keeps each function a cheap lookup.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::types::{ClusterSnapshot, Node, Pod, Service};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("duplicate node in snapshot: {0}")]
    DuplicateNode(String),
    #[error("node with empty name in snapshot")]
    EmptyNodeName,
}

/// Aggregated view of a single node.
#[derive(Debug, Clone)]
pub struct NodeInfo<'a> {
    pub node: &'a Node,
    /// Pods bound to this node, in snapshot order.
    pub pods: Vec<&'a Pod>,
    /// Sum of requested milli-CPU, with defaults for pods requesting none.
    pub non_zero_milli_cpu: u64,
    /// Sum of requested memory, with defaults for pods requesting none.
    pub non_zero_memory: u64,
    /// Zone key derived from topology labels.
    pub zone: Option<String>,
}

impl<'a> NodeInfo<'a> {
    pub fn name(&self) -> &'a str {
        &self.node.name
    }
}

/// Read-only index built once per scheduling cycle.
#[derive(Debug, Clone)]
pub struct SnapshotIndex<'a> {
    nodes: Vec<NodeInfo<'a>>,
    positions: HashMap<&'a str, usize>,
    services: &'a [Service],
}

impl<'a> SnapshotIndex<'a> {
    /// Build the index.
    ///
    /// Placed pods that reference a node outside the snapshot are ignored;
    /// they cannot influence any candidate's score.
    pub fn build(
        snapshot: &'a ClusterSnapshot,
        default_milli_cpu: u64,
        default_memory: u64,
    ) -> Result<Self, SnapshotError> {
        let mut positions = HashMap::with_capacity(snapshot.nodes.len());
        let mut nodes = Vec::with_capacity(snapshot.nodes.len());

        for (i, node) in snapshot.nodes.iter().enumerate() {
            if node.name.is_empty() {
                return Err(SnapshotError::EmptyNodeName);
            }
            if positions.insert(node.name.as_str(), i).is_some() {
                return Err(SnapshotError::DuplicateNode(node.name.clone()));
            }
            nodes.push(NodeInfo {
                node,
                pods: Vec::new(),
                non_zero_milli_cpu: 0,
                non_zero_memory: 0,
                zone: node.zone_key(),
            });
        }

        for placed in &snapshot.pods {
            let Some(&pos) = positions.get(placed.node_name.as_str()) else {
                debug!(
                    pod = %placed.pod.key(),
                    node = %placed.node_name,
                    "placed pod references unknown node, skipping"
                );
                continue;
            };
            let info = &mut nodes[pos];
            let (cpu, mem) = placed.pod.requests.non_zero(default_milli_cpu, default_memory);
            info.non_zero_milli_cpu = info.non_zero_milli_cpu.saturating_add(cpu);
            info.non_zero_memory = info.non_zero_memory.saturating_add(mem);
            info.pods.push(&placed.pod);
        }

        Ok(Self {
            nodes,
            positions,
            services: &snapshot.services,
        })
    }

    /// Nodes in snapshot order.
    pub fn nodes(&self) -> &[NodeInfo<'a>] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&NodeInfo<'a>> {
        self.position(name).map(|i| &self.nodes[i])
    }

    pub fn services(&self) -> &'a [Service] {
        self.services
    }

    /// All placed pods paired with the node hosting them.
    pub fn placed_pods(&self) -> impl Iterator<Item = (&NodeInfo<'a>, &'a Pod)> + '_ {
        self.nodes
            .iter()
            .flat_map(|info| info.pods.iter().map(move |pod| (info, *pod)))
    }
}
