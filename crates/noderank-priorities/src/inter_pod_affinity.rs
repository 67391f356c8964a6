//! Preferred inter-pod affinity and anti-affinity.
//!
//! For every placed pod matching one of the incoming pod's preferred
//! terms, every candidate in the same topology domain as that pod's node
//! gains (affinity) or loses (anti-affinity) the term's weight. Placed
//! pods' own preferred terms are applied symmetrically: if they select the
//! incoming pod, their domain is adjusted the same way.

use noderank_core::NodeInfo;
use noderank_core::config::INTER_POD_AFFINITY;
use noderank_core::types::{Pod, WeightedPodAffinityTerm};
use tracing::warn;

use crate::error::RankResult;
use crate::metadata::PodTerm;
use crate::priority::{HostPriority, HostPriorityList, PriorityContext, PriorityFunction};

#[derive(Debug, Clone, Copy, Default)]
pub struct InterPodAffinity;

/// Add `delta` to every candidate sharing `anchor`'s value for `topology_key`.
fn add_to_domain(counts: &mut [i64], nodes: &[NodeInfo<'_>], anchor: &NodeInfo<'_>, topology_key: &str, delta: i64) {
    let Some(domain) = anchor.node.labels.get(topology_key) else {
        return;
    };
    for (count, candidate) in counts.iter_mut().zip(nodes) {
        if candidate.node.labels.get(topology_key) == Some(domain) {
            *count += delta;
        }
    }
}

/// Terms declared by an already placed pod; malformed ones are skipped
/// since that pod is not the one being scheduled.
fn placed_terms<'p>(owner: &'p Pod, terms: &'p [WeightedPodAffinityTerm]) -> impl Iterator<Item = PodTerm> + 'p {
    terms.iter().filter_map(move |t| match PodTerm::compile(owner, t) {
        Ok(term) => Some(term),
        Err(e) => {
            warn!(pod = %owner.key(), error = %e, "ignoring malformed affinity term on placed pod");
            None
        }
    })
}

impl PriorityFunction for InterPodAffinity {
    fn name(&self) -> &str {
        INTER_POD_AFFINITY
    }

    fn score(&self, ctx: &PriorityContext<'_>) -> RankResult<HostPriorityList> {
        let nodes = ctx.nodes();
        let meta = ctx.metadata;
        let mut counts = vec![0i64; nodes.len()];

        for (anchor, placed) in ctx.index.placed_pods() {
            for term in meta.affinity_terms.iter().filter(|t| t.matches_pod(placed)) {
                add_to_domain(&mut counts, nodes, anchor, &term.topology_key, term.weight);
            }
            for term in meta.anti_affinity_terms.iter().filter(|t| t.matches_pod(placed)) {
                add_to_domain(&mut counts, nodes, anchor, &term.topology_key, -term.weight);
            }

            let Some(affinity) = &placed.affinity else {
                continue;
            };
            if let Some(pa) = &affinity.pod_affinity {
                for term in placed_terms(placed, &pa.preferred).filter(|t| t.matches_pod(ctx.pod)) {
                    add_to_domain(&mut counts, nodes, anchor, &term.topology_key, term.weight);
                }
            }
            if let Some(paa) = &affinity.pod_anti_affinity {
                for term in placed_terms(placed, &paa.preferred).filter(|t| t.matches_pod(ctx.pod)) {
                    add_to_domain(&mut counts, nodes, anchor, &term.topology_key, -term.weight);
                }
            }
        }

        Ok(nodes
            .iter()
            .zip(counts)
            .map(|(node, count)| HostPriority::new(node.name(), count))
            .collect())
    }
}
