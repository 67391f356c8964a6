//! Aggregator — combines weighted priority functions into one ranking.
//!
//! ```text
//! index    = SnapshotIndex::build(snapshot)
//! metadata = PriorityMetadata::compute(pod, index)       once per cycle
//! for each config (in parallel when enabled):
//!     raw     = config.function.score(ctx)                  one entry per node
//!     reduced = config.reducer().reduce(raw)                within [0, max_score]
//! totals[node] += reduced[node] * config.weight            per-node slots
//! sort by total desc, then node name asc
//! ```
//!
//! Each worker owns the score vector of the function it evaluates; the
//! vectors are summed into the per-node slots afterwards, so evaluation
//! order never changes a total. A cycle either returns a full ranking or
//! an error; partial results are never exposed.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use noderank_core::{ClusterSnapshot, Pod, SchedulerPolicy, ScoringSettings, SnapshotIndex};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{RankError, RankResult};
use crate::metadata::PriorityMetadata;
use crate::priority::{HostPriority, PriorityConfig, PriorityContext};
use crate::reduce::check_range;
use crate::registry::PriorityRegistry;

/// Final score of one node with its per-priority contributions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeScore {
    pub host: String,
    pub total: i64,
    /// Priority name → weighted contribution.
    pub breakdown: BTreeMap<String, i64>,
}

/// The ranking engine. Immutable after construction and shareable across
/// threads; every call to [`Ranker::rank`] is an independent cycle.
#[derive(Debug, Clone)]
pub struct Ranker {
    configs: Vec<PriorityConfig>,
    settings: ScoringSettings,
}

impl Ranker {
    pub fn new(configs: Vec<PriorityConfig>, settings: ScoringSettings) -> RankResult<Self> {
        settings.validate().map_err(RankError::InvalidSettings)?;
        if let Some(bad) = configs.iter().find(|c| c.weight == 0) {
            return Err(RankError::InvalidWeight {
                name: bad.name.clone(),
                weight: bad.weight,
            });
        }
        Ok(Self { configs, settings })
    }

    /// Build from a policy, resolving names through `registry`.
    pub fn from_policy(policy: &SchedulerPolicy, registry: &PriorityRegistry) -> RankResult<Self> {
        Self::new(registry.build(policy)?, policy.scoring.clone())
    }

    pub fn configs(&self) -> &[PriorityConfig] {
        &self.configs
    }

    pub fn settings(&self) -> &ScoringSettings {
        &self.settings
    }

    /// Rank every node of `snapshot` for `pod`, best first.
    pub fn rank(&self, pod: &Pod, snapshot: &ClusterSnapshot) -> RankResult<Vec<HostPriority>> {
        self.run(pod, snapshot, None).map(into_host_priorities)
    }

    /// Like [`Ranker::rank`], aborting once `deadline` has passed.
    pub fn rank_with_deadline(
        &self,
        pod: &Pod,
        snapshot: &ClusterSnapshot,
        deadline: Instant,
    ) -> RankResult<Vec<HostPriority>> {
        self.run(pod, snapshot, Some(deadline))
            .map(into_host_priorities)
    }

    /// Rank with the per-priority breakdown of every node's total.
    pub fn explain(&self, pod: &Pod, snapshot: &ClusterSnapshot) -> RankResult<Vec<NodeScore>> {
        self.run(pod, snapshot, None)
    }

    /// Run one cycle on the blocking pool, bounded by `timeout`.
    pub async fn rank_within(
        self: &Arc<Self>,
        pod: Arc<Pod>,
        snapshot: Arc<ClusterSnapshot>,
        timeout: Duration,
    ) -> RankResult<Vec<HostPriority>> {
        let ranker = Arc::clone(self);
        let pod_key = pod.key();
        let deadline = Instant::now() + timeout;
        let task = tokio::task::spawn_blocking(move || {
            ranker.rank_with_deadline(&pod, &snapshot, deadline)
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) if join_err.is_panic() => {
                std::panic::resume_unwind(join_err.into_panic())
            }
            Ok(Err(_)) | Err(_) => {
                debug!(pod = %pod_key, ?timeout, "ranking cycle timed out");
                Err(RankError::DeadlineExceeded)
            }
        }
    }

    fn run(
        &self,
        pod: &Pod,
        snapshot: &ClusterSnapshot,
        deadline: Option<Instant>,
    ) -> RankResult<Vec<NodeScore>> {
        let started = Instant::now();
        let settings = &self.settings;
        let index = SnapshotIndex::build(
            snapshot,
            settings.default_milli_cpu_request,
            settings.default_memory_request,
        )?;

        if self.configs.is_empty() {
            let mut ranked: Vec<NodeScore> = index
                .nodes()
                .iter()
                .map(|n| NodeScore {
                    host: n.name().to_string(),
                    total: 0,
                    breakdown: BTreeMap::new(),
                })
                .collect();
            sort_ranking(&mut ranked);
            return Ok(ranked);
        }

        if index.is_empty() {
            return Err(RankError::EmptyNodeList);
        }
        check_deadline(deadline)?;

        let metadata = PriorityMetadata::compute(pod, &index, settings)?;
        let ctx = PriorityContext {
            pod,
            metadata: &metadata,
            index: &index,
            settings,
        };

        let evaluate = |config: &PriorityConfig| -> RankResult<Vec<i64>> {
            check_deadline(deadline)?;
            let scores = evaluate_priority(config, &ctx)?;
            check_deadline(deadline)?;
            Ok(scores)
        };

        let per_priority: Vec<Vec<i64>> = if settings.parallel && self.configs.len() > 1 {
            self.configs
                .par_iter()
                .map(evaluate)
                .collect::<RankResult<_>>()?
        } else {
            self.configs
                .iter()
                .map(evaluate)
                .collect::<RankResult<_>>()?
        };

        let mut slots: Vec<NodeScore> = index
            .nodes()
            .iter()
            .map(|n| NodeScore {
                host: n.name().to_string(),
                total: 0,
                breakdown: BTreeMap::new(),
            })
            .collect();

        for (config, scores) in self.configs.iter().zip(&per_priority) {
            let weight = i64::from(config.weight);
            for (slot, score) in slots.iter_mut().zip(scores) {
                let contribution = score.saturating_mul(weight);
                slot.total = slot.total.saturating_add(contribution);
                slot.breakdown.insert(config.name.clone(), contribution);
            }
        }

        sort_ranking(&mut slots);

        info!(
            pod = %pod.key(),
            nodes = slots.len(),
            priorities = self.configs.len(),
            best = slots.first().map(|s| s.host.as_str()).unwrap_or_default(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "ranking cycle complete"
        );

        Ok(slots)
    }
}

/// Rank `snapshot` for `pod` with `policy` and the built-in priorities.
pub fn rank_nodes(
    pod: &Pod,
    snapshot: &ClusterSnapshot,
    policy: &SchedulerPolicy,
) -> RankResult<Vec<HostPriority>> {
    Ranker::from_policy(policy, &PriorityRegistry::with_defaults())?.rank(pod, snapshot)
}

/// Score, reduce and validate one priority. Returns scores in node order.
fn evaluate_priority(config: &PriorityConfig, ctx: &PriorityContext<'_>) -> RankResult<Vec<i64>> {
    let expected = ctx.index.len();
    let raw = config.function.score(ctx)?;
    if raw.len() != expected {
        return Err(defect(RankError::LengthMismatch {
            priority: config.name.clone(),
            expected,
            got: raw.len(),
        }));
    }

    let reduced = config.reducer().reduce(raw, ctx.max_score());
    check_range(&config.name, &reduced, ctx.max_score()).map_err(defect)?;

    let mut scores: Vec<Option<i64>> = vec![None; expected];
    for hp in &reduced {
        let pos = ctx.index.position(&hp.host).ok_or_else(|| {
            defect(RankError::UnknownHost {
                priority: config.name.clone(),
                host: hp.host.clone(),
            })
        })?;
        if scores[pos].replace(hp.score).is_some() {
            return Err(defect(RankError::DuplicateHost {
                priority: config.name.clone(),
                host: hp.host.clone(),
            }));
        }
    }

    debug!(
        priority = %config.name,
        weight = config.weight,
        reducer = ?config.reducer(),
        "priority evaluated"
    );

    // Lengths match and no host repeats, so every slot is filled.
    Ok(scores.into_iter().flatten().collect())
}

fn defect(err: RankError) -> RankError {
    error!(error = %err, "priority function violated its contract");
    err
}

fn check_deadline(deadline: Option<Instant>) -> RankResult<()> {
    match deadline {
        Some(d) if Instant::now() >= d => Err(RankError::DeadlineExceeded),
        _ => Ok(()),
    }
}

fn sort_ranking(ranked: &mut [NodeScore]) {
    ranked.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.host.cmp(&b.host)));
}

fn into_host_priorities(ranked: Vec<NodeScore>) -> Vec<HostPriority> {
    ranked
        .into_iter()
        .map(|s| HostPriority::new(s.host, s.total))
        .collect()
}
