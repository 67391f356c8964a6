//! Ranking error types.

use noderank_core::{ConfigError, SelectorError, SnapshotError};
use thiserror::Error;

/// Broad classes of [`RankError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller handed over a malformed pod, snapshot or policy. The
    /// cycle is aborted and the pod stays unscheduled until retried.
    Input,
    /// A registered priority function broke its contract. This is a bug.
    Invariant,
    /// The caller's deadline expired before the cycle finished.
    Deadline,
}

/// Errors that abort a ranking cycle.
#[derive(Debug, Error)]
pub enum RankError {
    #[error("invalid selector: {0}")]
    InvalidSelector(#[from] SelectorError),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(#[from] SnapshotError),

    #[error("invalid scoring settings: {0}")]
    InvalidSettings(#[source] ConfigError),

    #[error("invalid affinity term: {0}")]
    InvalidAffinity(String),

    #[error("no candidate nodes to score")]
    EmptyNodeList,

    #[error("unknown priority function: {0}")]
    UnknownPriority(String),

    #[error("priority {name} has invalid weight {weight}")]
    InvalidWeight { name: String, weight: u32 },

    #[error("priority {priority} returned {got} scores for {expected} nodes")]
    LengthMismatch {
        priority: String,
        expected: usize,
        got: usize,
    },

    #[error("priority {priority} scored unknown node {host}")]
    UnknownHost { priority: String, host: String },

    #[error("priority {priority} scored node {host} more than once")]
    DuplicateHost { priority: String, host: String },

    #[error("priority {priority} gave node {host} score {score}, outside [0, {max}]")]
    ScoreOutOfRange {
        priority: String,
        host: String,
        score: i64,
        max: i64,
    },

    #[error("ranking deadline exceeded")]
    DeadlineExceeded,
}

impl RankError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RankError::InvalidSelector(_)
            | RankError::InvalidSnapshot(_)
            | RankError::InvalidSettings(_)
            | RankError::InvalidAffinity(_)
            | RankError::EmptyNodeList
            | RankError::UnknownPriority(_)
            | RankError::InvalidWeight { .. } => ErrorKind::Input,
            RankError::LengthMismatch { .. }
            | RankError::UnknownHost { .. }
            | RankError::DuplicateHost { .. }
            | RankError::ScoreOutOfRange { .. } => ErrorKind::Invariant,
            RankError::DeadlineExceeded => ErrorKind::Deadline,
        }
    }

    pub fn is_input(&self) -> bool {
        self.kind() == ErrorKind::Input
    }

    pub fn is_invariant_violation(&self) -> bool {
        self.kind() == ErrorKind::Invariant
    }
}

pub type RankResult<T> = Result<T, RankError>;
