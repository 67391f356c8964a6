//! Scheduler policy configuration (`policy.toml`).
//!
//! ```toml
//! [scoring]
//! max_score = 10
//! zone_weighting = 0.6667
//!
//! [[priorities]]
//! name = "LeastRequestedPriority"
//! weight = 1
//!
//! [[priorities]]
//! name = "SelectorSpreadPriority"
//! weight = 2
//! enabled = false
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

pub const LEAST_REQUESTED: &str = "LeastRequestedPriority";
pub const MOST_REQUESTED: &str = "MostRequestedPriority";
pub const BALANCED_RESOURCE_ALLOCATION: &str = "BalancedResourceAllocation";
pub const NODE_AFFINITY: &str = "NodeAffinityPriority";
pub const TAINT_TOLERATION: &str = "TaintTolerationPriority";
pub const INTER_POD_AFFINITY: &str = "InterPodAffinityPriority";
pub const SELECTOR_SPREAD: &str = "SelectorSpreadPriority";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read policy file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse policy: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to render policy: {0}")]
    Render(#[from] toml::ser::Error),
    #[error("invalid policy: {0}")]
    Invalid(String),
}

/// Numeric policy shared by every priority function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringSettings {
    /// Upper bound of every reduced score.
    pub max_score: i64,
    /// Share of the spreading score driven by zone counts, in `[0, 1]`.
    pub zone_weighting: f64,
    /// Milli-CPU assumed for pods that request none.
    pub default_milli_cpu_request: u64,
    /// Memory (bytes) assumed for pods that request none.
    pub default_memory_request: u64,
    /// Evaluate priority functions on the rayon pool.
    pub parallel: bool,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            max_score: 10,
            zone_weighting: 2.0 / 3.0,
            default_milli_cpu_request: 100,
            default_memory_request: 200 * 1024 * 1024,
            parallel: true,
        }
    }
}

impl ScoringSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_score <= 0 {
            return Err(ConfigError::Invalid(format!(
                "max_score must be positive, got {}",
                self.max_score
            )));
        }
        if !(0.0..=1.0).contains(&self.zone_weighting) {
            return Err(ConfigError::Invalid(format!(
                "zone_weighting must be within [0, 1], got {}",
                self.zone_weighting
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityEntry {
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_weight() -> u32 {
    1
}

fn default_enabled() -> bool {
    true
}

impl PriorityEntry {
    pub fn new(name: &str, weight: u32) -> Self {
        Self {
            name: name.to_string(),
            weight,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerPolicy {
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default = "default_priorities")]
    pub priorities: Vec<PriorityEntry>,
}

fn default_priorities() -> Vec<PriorityEntry> {
    vec![
        PriorityEntry::new(SELECTOR_SPREAD, 1),
        PriorityEntry::new(INTER_POD_AFFINITY, 1),
        PriorityEntry::new(LEAST_REQUESTED, 1),
        PriorityEntry::new(BALANCED_RESOURCE_ALLOCATION, 1),
        PriorityEntry::new(NODE_AFFINITY, 1),
        PriorityEntry::new(TAINT_TOLERATION, 1),
    ]
}

impl Default for SchedulerPolicy {
    fn default() -> Self {
        Self {
            scoring: ScoringSettings::default(),
            priorities: default_priorities(),
        }
    }
}

impl SchedulerPolicy {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let policy: SchedulerPolicy = toml::from_str(content)?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Entries that take part in ranking.
    pub fn enabled(&self) -> impl Iterator<Item = &PriorityEntry> {
        self.priorities.iter().filter(|p| p.enabled)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scoring.validate()?;

        let mut seen = HashSet::new();
        for entry in &self.priorities {
            if entry.name.trim().is_empty() {
                return Err(ConfigError::Invalid("priority with empty name".to_string()));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "priority {} listed more than once",
                    entry.name
                )));
            }
            if entry.weight == 0 {
                return Err(ConfigError::Invalid(format!(
                    "priority {} has weight 0; disable it instead",
                    entry.name
                )));
            }
        }
        Ok(())
    }
}
