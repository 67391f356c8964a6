//! Resource-based priorities.
//!
//! All three score the node as it would look after placing the pod:
//! requested = pods already on the node + the incoming pod, each counted
//! with the non-zero defaults. Scores are already in `[0, max_score]`.
//!
//! - **Least requested** — prefer nodes with the most spare capacity (spreading)
//! - **Most requested** — prefer the fullest nodes (bin-packing)
//! - **Balanced allocation** — prefer nodes whose CPU and memory utilization
//!   stay close to each other

use noderank_core::NodeInfo;
use noderank_core::config::{BALANCED_RESOURCE_ALLOCATION, LEAST_REQUESTED, MOST_REQUESTED};

use crate::priority::{NodeScorer, PriorityContext};
use crate::reduce::Reducer;

/// Requested (cpu, memory) on `node` once the pod lands there.
fn projected(ctx: &PriorityContext<'_>, node: &NodeInfo<'_>) -> (u64, u64) {
    (
        node.non_zero_milli_cpu
            .saturating_add(ctx.metadata.non_zero_milli_cpu),
        node.non_zero_memory
            .saturating_add(ctx.metadata.non_zero_memory),
    )
}

fn unused_score(requested: u64, capacity: u64, max_score: i64) -> i64 {
    if capacity == 0 || requested > capacity {
        return 0;
    }
    (u128::from(capacity - requested) * max_score as u128 / u128::from(capacity)) as i64
}

fn used_score(requested: u64, capacity: u64, max_score: i64) -> i64 {
    if capacity == 0 || requested > capacity {
        return 0;
    }
    (u128::from(requested) * max_score as u128 / u128::from(capacity)) as i64
}

fn fraction(requested: u64, capacity: u64) -> f64 {
    if capacity == 0 {
        return 1.0;
    }
    requested as f64 / capacity as f64
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LeastRequested;

impl NodeScorer for LeastRequested {
    fn name(&self) -> &str {
        LEAST_REQUESTED
    }

    fn score_node(&self, ctx: &PriorityContext<'_>, node: &NodeInfo<'_>) -> i64 {
        let (cpu, mem) = projected(ctx, node);
        let alloc = &node.node.allocatable;
        let max = ctx.max_score();
        (unused_score(cpu, alloc.milli_cpu, max) + unused_score(mem, alloc.memory, max)) / 2
    }

    fn default_reducer(&self) -> Reducer {
        Reducer::Identity
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MostRequested;

impl NodeScorer for MostRequested {
    fn name(&self) -> &str {
        MOST_REQUESTED
    }

    fn score_node(&self, ctx: &PriorityContext<'_>, node: &NodeInfo<'_>) -> i64 {
        let (cpu, mem) = projected(ctx, node);
        let alloc = &node.node.allocatable;
        let max = ctx.max_score();
        (used_score(cpu, alloc.milli_cpu, max) + used_score(mem, alloc.memory, max)) / 2
    }

    fn default_reducer(&self) -> Reducer {
        Reducer::Identity
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BalancedAllocation;

impl NodeScorer for BalancedAllocation {
    fn name(&self) -> &str {
        BALANCED_RESOURCE_ALLOCATION
    }

    fn score_node(&self, ctx: &PriorityContext<'_>, node: &NodeInfo<'_>) -> i64 {
        let (cpu, mem) = projected(ctx, node);
        let alloc = &node.node.allocatable;
        let cpu_fraction = fraction(cpu, alloc.milli_cpu);
        let mem_fraction = fraction(mem, alloc.memory);

        // Over-committed nodes get nothing.
        if cpu_fraction >= 1.0 || mem_fraction >= 1.0 {
            return 0;
        }

        let diff = (cpu_fraction - mem_fraction).abs();
        ((1.0 - diff) * ctx.max_score() as f64) as i64
    }

    fn default_reducer(&self) -> Reducer {
        Reducer::Identity
    }
}
