//! noderank-core — shared types for the node ranking engine.
//!
//! - **`types`** — nodes, pods, affinity terms, cluster snapshots
//! - **`selector`** — label selector parsing and matching
//! - **`snapshot`** — per-cycle node index (placed pods, requested resources, zones)
//! - **`config`** — `policy.toml` parsing and validation

pub mod config;
pub mod selector;
pub mod snapshot;
pub mod types;

pub use config::{ConfigError, PriorityEntry, SchedulerPolicy, ScoringSettings};
pub use selector::{LabelSelector, SelectorError};
pub use snapshot::{NodeInfo, SnapshotError, SnapshotIndex};
pub use types::*;
