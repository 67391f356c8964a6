//! The priority function capability and its configuration.
//!
//! A priority function turns (pod, metadata, snapshot) into one raw score
//! per candidate node. Functions that only need to look at one node at a
//! time implement [`NodeScorer`] and are lifted with [`MapPriority`];
//! functions that compare nodes against each other implement
//! [`PriorityFunction`] directly.

use std::fmt;
use std::sync::Arc;

use noderank_core::{NodeInfo, Pod, ScoringSettings, SnapshotIndex};
use serde::{Deserialize, Serialize};

use crate::error::RankResult;
use crate::metadata::PriorityMetadata;
use crate::reduce::Reducer;

/// Score of a single node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostPriority {
    pub host: String,
    pub score: i64,
}

impl HostPriority {
    pub fn new(host: impl Into<String>, score: i64) -> Self {
        Self {
            host: host.into(),
            score,
        }
    }
}

/// One score per candidate node, for one priority function.
pub type HostPriorityList = Vec<HostPriority>;

/// Everything a priority function may read during one cycle.
#[derive(Debug, Clone, Copy)]
pub struct PriorityContext<'a> {
    pub pod: &'a Pod,
    pub metadata: &'a PriorityMetadata,
    pub index: &'a SnapshotIndex<'a>,
    pub settings: &'a ScoringSettings,
}

impl<'a> PriorityContext<'a> {
    /// Candidate nodes in snapshot order.
    pub fn nodes(&self) -> &'a [NodeInfo<'a>] {
        self.index.nodes()
    }

    pub fn max_score(&self) -> i64 {
        self.settings.max_score
    }
}

/// A scoring strategy ranking nodes for a pod.
pub trait PriorityFunction: Send + Sync {
    fn name(&self) -> &str;

    /// Raw score for every candidate node.
    fn score(&self, ctx: &PriorityContext<'_>) -> RankResult<HostPriorityList>;

    /// Reduce pass applied when the configuration does not override it.
    fn default_reducer(&self) -> Reducer {
        Reducer::MinMax
    }
}

/// A priority computed independently for each node.
pub trait NodeScorer: Send + Sync {
    fn name(&self) -> &str;

    fn score_node(&self, ctx: &PriorityContext<'_>, node: &NodeInfo<'_>) -> i64;

    fn default_reducer(&self) -> Reducer {
        Reducer::MinMax
    }
}

/// Adapter running a [`NodeScorer`] over every candidate.
#[derive(Debug, Clone, Default)]
pub struct MapPriority<S>(pub S);

impl<S: NodeScorer> PriorityFunction for MapPriority<S> {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn score(&self, ctx: &PriorityContext<'_>) -> RankResult<HostPriorityList> {
        Ok(ctx
            .nodes()
            .iter()
            .map(|node| HostPriority::new(node.name(), self.0.score_node(ctx, node)))
            .collect())
    }

    fn default_reducer(&self) -> Reducer {
        self.0.default_reducer()
    }
}

/// A weighted priority function, fixed at engine construction.
#[derive(Clone)]
pub struct PriorityConfig {
    pub name: String,
    pub function: Arc<dyn PriorityFunction>,
    pub weight: u32,
    /// Overrides the function's default reducer.
    pub reduce: Option<Reducer>,
}

impl PriorityConfig {
    pub fn new(function: Arc<dyn PriorityFunction>, weight: u32) -> Self {
        Self {
            name: function.name().to_string(),
            function,
            weight,
            reduce: None,
        }
    }

    pub fn with_reducer(mut self, reducer: Reducer) -> Self {
        self.reduce = Some(reducer);
        self
    }

    pub fn reducer(&self) -> Reducer {
        self.reduce
            .unwrap_or_else(|| self.function.default_reducer())
    }
}

impl fmt::Debug for PriorityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityConfig")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .field("reduce", &self.reducer())
            .finish()
    }
}
