//! Soft taint avoidance.
//!
//! Counts the `PreferNoSchedule` taints on a node the pod does not
//! tolerate. Fewer is better, so the counts are reverse-normalized.

use noderank_core::NodeInfo;
use noderank_core::config::TAINT_TOLERATION;
use noderank_core::types::TaintEffect;

use crate::priority::{NodeScorer, PriorityContext};
use crate::reduce::Reducer;

#[derive(Debug, Clone, Copy, Default)]
pub struct TaintToleration;

impl NodeScorer for TaintToleration {
    fn name(&self) -> &str {
        TAINT_TOLERATION
    }

    fn score_node(&self, ctx: &PriorityContext<'_>, node: &NodeInfo<'_>) -> i64 {
        let tolerations = &ctx.metadata.soft_tolerations;
        node.node
            .taints
            .iter()
            .filter(|taint| taint.effect == TaintEffect::PreferNoSchedule)
            .filter(|taint| !tolerations.iter().any(|t| t.tolerates(taint)))
            .count() as i64
    }

    fn default_reducer(&self) -> Reducer {
        Reducer::ReverseMinMax
    }
}
