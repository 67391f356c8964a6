//! Selector spreading — spread replicas of one workload across nodes and
//! zones.
//!
//! Replicas are the placed pods in the incoming pod's namespace that match
//! any of its spreading selectors (owning controller and matching
//! services). A node's score falls with the number of replicas it already
//! hosts; when nodes carry zone labels the score is blended with the same
//! measure taken over the node's zone:
//!
//! ```text
//! node_score = max * (max_node_count - node_count) / max_node_count
//! zone_score = max * (max_zone_count - zone_count) / max_zone_count
//! score      = node_score * (1 - zone_weighting) + zone_score * zone_weighting
//! ```
//!
//! An empty count (no replicas anywhere) scores `max`. The output is
//! already in `[0, max]`.

use std::collections::HashMap;

use noderank_core::config::SELECTOR_SPREAD;
use noderank_core::types::Pod;
use tracing::debug;

use crate::error::RankResult;
use crate::priority::{HostPriority, HostPriorityList, PriorityContext, PriorityFunction};
use crate::reduce::Reducer;

#[derive(Debug, Clone, Copy, Default)]
pub struct SelectorSpread;

fn spread_score(max_score: f64, max_count: i64, count: i64) -> f64 {
    if max_count == 0 {
        return max_score;
    }
    max_score * (max_count - count) as f64 / max_count as f64
}

impl PriorityFunction for SelectorSpread {
    fn name(&self) -> &str {
        SELECTOR_SPREAD
    }

    fn score(&self, ctx: &PriorityContext<'_>) -> RankResult<HostPriorityList> {
        let nodes = ctx.nodes();
        let max_score = ctx.max_score();
        let selectors = &ctx.metadata.spread_selectors;

        if selectors.is_empty() {
            return Ok(nodes
                .iter()
                .map(|n| HostPriority::new(n.name(), max_score))
                .collect());
        }

        let is_replica = |p: &Pod| {
            p.namespace == ctx.pod.namespace && selectors.iter().any(|s| s.matches(&p.labels))
        };

        let node_counts: Vec<i64> = nodes
            .iter()
            .map(|n| n.pods.iter().filter(|p| is_replica(p)).count() as i64)
            .collect();

        let mut zone_counts: HashMap<&str, i64> = HashMap::new();
        for (node, count) in nodes.iter().zip(&node_counts) {
            if let Some(zone) = node.zone.as_deref() {
                *zone_counts.entry(zone).or_insert(0) += count;
            }
        }

        let max_node = node_counts.iter().copied().max().unwrap_or(0);
        let max_zone = zone_counts.values().copied().max().unwrap_or(0);
        let have_zones = !zone_counts.is_empty();
        let zone_weighting = ctx.settings.zone_weighting;
        let max = max_score as f64;

        debug!(
            pod = %ctx.pod.key(),
            replicas = node_counts.iter().sum::<i64>(),
            zones = zone_counts.len(),
            "selector spreading counts"
        );

        Ok(nodes
            .iter()
            .zip(&node_counts)
            .map(|(node, count)| {
                let mut score = spread_score(max, max_node, *count);
                if let (true, Some(zone)) = (have_zones, node.zone.as_deref()) {
                    let zone_score = spread_score(max, max_zone, zone_counts[zone]);
                    score = score * (1.0 - zone_weighting) + zone_score * zone_weighting;
                }
                // Round so an exact blend of `max` never truncates to `max - 1`.
                HostPriority::new(node.name(), score.round() as i64)
            })
            .collect())
    }

    fn default_reducer(&self) -> Reducer {
        Reducer::Identity
    }
}
