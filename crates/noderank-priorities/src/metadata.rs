//! Per-cycle metadata shared by every priority function.
//!
//! Selectors and affinity terms are parsed here, once, so that each
//! priority function only evaluates already-compiled matchers. A malformed
//! pod fails here and aborts the cycle before any scoring happens.

use std::collections::{BTreeMap, BTreeSet};

use noderank_core::types::{
    NodeSelectorOperator, NodeSelectorTerm, Pod, TaintEffect, Toleration,
    WeightedPodAffinityTerm,
};
use noderank_core::{LabelSelector, ScoringSettings, SnapshotIndex};
use tracing::debug;

use crate::error::{RankError, RankResult};

const MIN_TERM_WEIGHT: i32 = 1;
const MAX_TERM_WEIGHT: i32 = 100;

/// One compiled node-selector requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRequirement {
    pub key: String,
    pub operator: NodeSelectorOperator,
    pub values: BTreeSet<String>,
    /// Parsed bound for `Gt` / `Lt`.
    pub bound: Option<i64>,
}

impl NodeRequirement {
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            NodeSelectorOperator::In => value.is_some_and(|v| self.values.contains(v)),
            NodeSelectorOperator::NotIn => value.is_none_or(|v| !self.values.contains(v)),
            NodeSelectorOperator::Exists => value.is_some(),
            NodeSelectorOperator::DoesNotExist => value.is_none(),
            NodeSelectorOperator::Gt | NodeSelectorOperator::Lt => {
                let (Some(bound), Some(Ok(actual))) = (self.bound, value.map(|v| v.parse::<i64>()))
                else {
                    return false;
                };
                if self.operator == NodeSelectorOperator::Gt {
                    actual > bound
                } else {
                    actual < bound
                }
            }
        }
    }
}

/// A preferred node-affinity term with its weight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedNodeTerm {
    pub weight: i64,
    pub requirements: Vec<NodeRequirement>,
}

impl WeightedNodeTerm {
    /// A term without requirements matches no node.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        !self.requirements.is_empty() && self.requirements.iter().all(|r| r.matches(labels))
    }
}

/// A preferred pod (anti-)affinity term with resolved namespaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodTerm {
    pub weight: i64,
    pub selector: LabelSelector,
    pub namespaces: BTreeSet<String>,
    pub topology_key: String,
}

impl PodTerm {
    /// Compile a term declared by `owner`.
    pub fn compile(owner: &Pod, term: &WeightedPodAffinityTerm) -> RankResult<Self> {
        check_weight(&owner.key(), term.weight)?;
        if term.term.topology_key.trim().is_empty() {
            return Err(RankError::InvalidAffinity(format!(
                "pod {}: empty topology key",
                owner.key()
            )));
        }

        let namespaces = if term.term.namespaces.is_empty() {
            BTreeSet::from([owner.namespace.clone()])
        } else {
            term.term.namespaces.iter().cloned().collect()
        };

        Ok(Self {
            weight: i64::from(term.weight),
            selector: LabelSelector::parse(&term.term.label_selector)?,
            namespaces,
            topology_key: term.term.topology_key.clone(),
        })
    }

    pub fn matches_pod(&self, pod: &Pod) -> bool {
        self.namespaces.contains(&pod.namespace) && self.selector.matches(&pod.labels)
    }
}

/// Cycle-scoped facts derived from the pod being placed.
#[derive(Debug, Clone, Default)]
pub struct PriorityMetadata {
    /// Pod CPU request, with the default substituted for zero.
    pub non_zero_milli_cpu: u64,
    /// Pod memory request, with the default substituted for zero.
    pub non_zero_memory: u64,
    /// Selectors identifying replicas of the same workload.
    pub spread_selectors: Vec<LabelSelector>,
    pub preferred_node_terms: Vec<WeightedNodeTerm>,
    pub affinity_terms: Vec<PodTerm>,
    pub anti_affinity_terms: Vec<PodTerm>,
    /// Tolerations that can apply to `PreferNoSchedule` taints.
    pub soft_tolerations: Vec<Toleration>,
}

impl PriorityMetadata {
    pub fn compute(
        pod: &Pod,
        index: &SnapshotIndex<'_>,
        settings: &ScoringSettings,
    ) -> RankResult<Self> {
        let (non_zero_milli_cpu, non_zero_memory) = pod.requests.non_zero(
            settings.default_milli_cpu_request,
            settings.default_memory_request,
        );

        let mut spread_selectors = Vec::new();
        if let Some(controller) = &pod.controller {
            let selector = LabelSelector::parse(&controller.selector)?;
            if !selector.is_empty() {
                spread_selectors.push(selector);
            }
        }
        for service in index.services() {
            if service.namespace != pod.namespace || service.selector.is_empty() {
                continue;
            }
            let selector = LabelSelector::from_map(&service.selector);
            if selector.matches(&pod.labels) {
                spread_selectors.push(selector);
            }
        }

        let affinity = pod.affinity.as_ref();

        let preferred_node_terms = affinity
            .and_then(|a| a.node_affinity.as_ref())
            .map(|na| {
                na.preferred
                    .iter()
                    .map(|t| -> RankResult<WeightedNodeTerm> {
                        check_weight(&pod.key(), t.weight)?;
                        Ok(WeightedNodeTerm {
                            weight: i64::from(t.weight),
                            requirements: compile_node_term(&pod.key(), &t.preference)?,
                        })
                    })
                    .collect::<RankResult<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();

        let compile_pod_terms = |terms: Option<&Vec<WeightedPodAffinityTerm>>| {
            terms
                .into_iter()
                .flatten()
                .map(|t| PodTerm::compile(pod, t))
                .collect::<RankResult<Vec<_>>>()
        };
        let affinity_terms =
            compile_pod_terms(affinity.and_then(|a| a.pod_affinity.as_ref()).map(|p| &p.preferred))?;
        let anti_affinity_terms = compile_pod_terms(
            affinity
                .and_then(|a| a.pod_anti_affinity.as_ref())
                .map(|p| &p.preferred),
        )?;

        let soft_tolerations = pod
            .tolerations
            .iter()
            .filter(|t| t.effect.is_none_or(|e| e == TaintEffect::PreferNoSchedule))
            .cloned()
            .collect();

        debug!(
            pod = %pod.key(),
            spread_selectors = spread_selectors.len(),
            node_terms = preferred_node_terms.len(),
            affinity_terms = affinity_terms.len(),
            anti_affinity_terms = anti_affinity_terms.len(),
            "priority metadata computed"
        );

        Ok(Self {
            non_zero_milli_cpu,
            non_zero_memory,
            spread_selectors,
            preferred_node_terms,
            affinity_terms,
            anti_affinity_terms,
            soft_tolerations,
        })
    }
}

fn check_weight(pod: &str, weight: i32) -> RankResult<()> {
    if !(MIN_TERM_WEIGHT..=MAX_TERM_WEIGHT).contains(&weight) {
        return Err(RankError::InvalidAffinity(format!(
            "pod {pod}: term weight {weight} outside [{MIN_TERM_WEIGHT}, {MAX_TERM_WEIGHT}]"
        )));
    }
    Ok(())
}

fn compile_node_term(pod: &str, term: &NodeSelectorTerm) -> RankResult<Vec<NodeRequirement>> {
    term.match_expressions
        .iter()
        .map(|expr| {
            let invalid = |reason: &str| {
                RankError::InvalidAffinity(format!(
                    "pod {pod}: requirement on {:?} {reason}",
                    expr.key
                ))
            };
            if expr.key.trim().is_empty() {
                return Err(invalid("has an empty key"));
            }

            let mut bound = None;
            match expr.operator {
                NodeSelectorOperator::In | NodeSelectorOperator::NotIn => {
                    if expr.values.is_empty() {
                        return Err(invalid("needs at least one value"));
                    }
                }
                NodeSelectorOperator::Exists | NodeSelectorOperator::DoesNotExist => {
                    if !expr.values.is_empty() {
                        return Err(invalid("must not list values"));
                    }
                }
                NodeSelectorOperator::Gt | NodeSelectorOperator::Lt => {
                    let [value] = expr.values.as_slice() else {
                        return Err(invalid("needs exactly one value"));
                    };
                    bound = Some(
                        value
                            .parse::<i64>()
                            .map_err(|_| invalid("needs an integer value"))?,
                    );
                }
            }

            Ok(NodeRequirement {
                key: expr.key.clone(),
                operator: expr.operator,
                values: expr.values.iter().cloned().collect(),
                bound,
            })
        })
        .collect()
}
