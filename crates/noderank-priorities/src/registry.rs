//! Name → priority function lookup, used once to turn a
//! [`SchedulerPolicy`] into the engine's immutable configuration.

use std::collections::BTreeMap;
use std::sync::Arc;

use noderank_core::SchedulerPolicy;
use noderank_core::config::{
    BALANCED_RESOURCE_ALLOCATION, INTER_POD_AFFINITY, LEAST_REQUESTED, MOST_REQUESTED,
    NODE_AFFINITY, SELECTOR_SPREAD, TAINT_TOLERATION,
};

use crate::error::{RankError, RankResult};
use crate::inter_pod_affinity::InterPodAffinity;
use crate::node_affinity::NodeAffinity;
use crate::priority::{MapPriority, PriorityConfig, PriorityFunction};
use crate::resources::{BalancedAllocation, LeastRequested, MostRequested};
use crate::selector_spreading::SelectorSpread;
use crate::taint_toleration::TaintToleration;

pub type PriorityFactory = Arc<dyn Fn() -> Arc<dyn PriorityFunction> + Send + Sync>;

#[derive(Clone, Default)]
pub struct PriorityRegistry {
    factories: BTreeMap<String, PriorityFactory>,
}

impl PriorityRegistry {
    /// Registry without any functions.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding every built-in priority.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(LEAST_REQUESTED, || Arc::new(MapPriority(LeastRequested)));
        registry.register(MOST_REQUESTED, || Arc::new(MapPriority(MostRequested)));
        registry.register(BALANCED_RESOURCE_ALLOCATION, || {
            Arc::new(MapPriority(BalancedAllocation))
        });
        registry.register(NODE_AFFINITY, || Arc::new(MapPriority(NodeAffinity)));
        registry.register(TAINT_TOLERATION, || Arc::new(MapPriority(TaintToleration)));
        registry.register(INTER_POD_AFFINITY, || Arc::new(InterPodAffinity));
        registry.register(SELECTOR_SPREAD, || Arc::new(SelectorSpread));
        registry
    }

    /// Register (or replace) a function under `name`.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Arc<dyn PriorityFunction> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build the weighted configuration for every enabled policy entry.
    pub fn build(&self, policy: &SchedulerPolicy) -> RankResult<Vec<PriorityConfig>> {
        policy
            .enabled()
            .map(|entry| {
                let factory = self
                    .factories
                    .get(&entry.name)
                    .ok_or_else(|| RankError::UnknownPriority(entry.name.clone()))?;
                if entry.weight == 0 {
                    return Err(RankError::InvalidWeight {
                        name: entry.name.clone(),
                        weight: entry.weight,
                    });
                }
                let mut config = PriorityConfig::new(factory(), entry.weight);
                config.name = entry.name.clone();
                Ok(config)
            })
            .collect()
    }
}
