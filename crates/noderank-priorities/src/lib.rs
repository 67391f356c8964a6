//! noderank-priorities — weighted node ranking for pod placement.
//!
//! This crate scores every candidate node of a [`ClusterSnapshot`] for one
//! pod and returns the nodes best first. It does NOT filter infeasible
//! nodes or bind pods; callers hand it candidates and act on the ranking.
//!
//! # Components
//!
//! - **`metadata`** — per-cycle facts parsed once from the pod (selectors, affinity terms)
//! - **`priority`** — the `PriorityFunction` capability, map-style adapter, weighted configs
//! - **`reduce`** — normalization of raw scores into `[0, max_score]`
//! - **`resources`**, **`node_affinity`**, **`taint_toleration`**,
//!   **`inter_pod_affinity`**, **`selector_spreading`** — built-in priorities
//! - **`registry`** — name → function lookup for policy files
//! - **`ranker`** — the aggregator
//!
//! [`ClusterSnapshot`]: noderank_core::ClusterSnapshot

pub mod error;
pub mod inter_pod_affinity;
pub mod metadata;
pub mod node_affinity;
pub mod priority;
pub mod ranker;
pub mod reduce;
pub mod registry;
pub mod resources;
pub mod selector_spreading;
pub mod taint_toleration;

#[cfg(test)]
mod test_support;

pub use error::{ErrorKind, RankError, RankResult};
pub use metadata::PriorityMetadata;
pub use priority::{
    HostPriority, HostPriorityList, MapPriority, NodeScorer, PriorityConfig, PriorityContext,
    PriorityFunction,
};
pub use ranker::{NodeScore, Ranker, rank_nodes};
pub use reduce::Reducer;
pub use registry::PriorityRegistry;
