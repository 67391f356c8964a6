//! Preferred node affinity.
//!
//! Each preferred term a node satisfies adds the term's weight to the
//! node's raw score. The raw sums are min-max normalized, so a pod with no
//! preferences scores every node the same.

use noderank_core::NodeInfo;
use noderank_core::config::NODE_AFFINITY;

use crate::priority::{NodeScorer, PriorityContext};

#[derive(Debug, Clone, Copy, Default)]
pub struct NodeAffinity;

impl NodeScorer for NodeAffinity {
    fn name(&self) -> &str {
        NODE_AFFINITY
    }

    fn score_node(&self, ctx: &PriorityContext<'_>, node: &NodeInfo<'_>) -> i64 {
        ctx.metadata
            .preferred_node_terms
            .iter()
            .filter(|term| term.matches(&node.node.labels))
            .map(|term| term.weight)
            .sum()
    }
}
