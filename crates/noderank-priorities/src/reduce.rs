//! Reduce pass: rescale one priority function's raw scores into
//! `[0, max_score]`.
//!
//! Min-max normalization maps the highest raw score to `max_score` and the
//! lowest to 0. When every node has the same raw score there is nothing to
//! prefer, and every node gets `max_score`.

use serde::{Deserialize, Serialize};

use crate::error::{RankError, RankResult};
use crate::priority::HostPriorityList;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reducer {
    /// Scores are already in range.
    Identity,
    /// Highest raw score wins.
    MinMax,
    /// Lowest raw score wins.
    ReverseMinMax,
}

impl Reducer {
    pub fn reduce(self, mut list: HostPriorityList, max_score: i64) -> HostPriorityList {
        if self == Reducer::Identity || list.is_empty() {
            return list;
        }

        let (lo, hi) = list
            .iter()
            .fold((i64::MAX, i64::MIN), |(lo, hi), hp| (lo.min(hp.score), hi.max(hp.score)));

        if lo == hi {
            for hp in &mut list {
                hp.score = max_score;
            }
            return list;
        }

        let span = i128::from(hi) - i128::from(lo);
        for hp in &mut list {
            let scaled = (i128::from(hp.score) - i128::from(lo)) * i128::from(max_score) / span;
            // `scaled` is within [0, max_score], so the cast is lossless.
            let scaled = scaled as i64;
            hp.score = match self {
                Reducer::ReverseMinMax => max_score - scaled,
                _ => scaled,
            };
        }
        list
    }
}

/// Check every score of a reduced list lies in `[0, max_score]`.
pub fn check_range(priority: &str, list: &HostPriorityList, max_score: i64) -> RankResult<()> {
    match list.iter().find(|hp| hp.score < 0 || hp.score > max_score) {
        Some(hp) => Err(RankError::ScoreOutOfRange {
            priority: priority.to_string(),
            host: hp.host.clone(),
            score: hp.score,
            max: max_score,
        }),
        None => Ok(()),
    }
}
