//! Helpers for priority function unit tests.

use noderank_core::types::{ClusterSnapshot, Node, Pod, Resources};
use noderank_core::{ScoringSettings, SnapshotIndex};

use crate::metadata::PriorityMetadata;
use crate::priority::{PriorityContext, PriorityFunction};

pub(crate) const GIB: u64 = 1024 * 1024 * 1024;

pub(crate) fn node(name: &str, milli_cpu: u64, memory: u64) -> Node {
    Node::new(name, Resources::new(milli_cpu, memory))
}

/// Raw scores of `func`, as `(host, score)` in node order.
pub(crate) fn raw_scores(
    func: &dyn PriorityFunction,
    pod: &Pod,
    snapshot: &ClusterSnapshot,
) -> Vec<(String, i64)> {
    let settings = ScoringSettings::default();
    let index = SnapshotIndex::build(
        snapshot,
        settings.default_milli_cpu_request,
        settings.default_memory_request,
    )
    .unwrap();
    let metadata = PriorityMetadata::compute(pod, &index, &settings).unwrap();
    let ctx = PriorityContext {
        pod,
        metadata: &metadata,
        index: &index,
        settings: &settings,
    };
    func.score(&ctx)
        .unwrap()
        .into_iter()
        .map(|hp| (hp.host, hp.score))
        .collect()
}

/// Scores of `func` after its default reducer.
pub(crate) fn reduced_scores(
    func: &dyn PriorityFunction,
    pod: &Pod,
    snapshot: &ClusterSnapshot,
) -> Vec<i64> {
    let list = raw_scores(func, pod, snapshot)
        .into_iter()
        .map(|(host, score)| crate::priority::HostPriority::new(host, score))
        .collect();
    func.default_reducer()
        .reduce(list, ScoringSettings::default().max_score)
        .into_iter()
        .map(|hp| hp.score)
        .collect()
}
