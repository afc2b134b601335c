use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const EXPLORATION_RANGE: (f64, f64) = (0.0, 1.0);
pub const NUM_OF_GROUPS_RANGE: (usize, usize) = (2, 10);
pub const VIDEOS_IN_GROUP_RANGE: (usize, usize) = (1, 10);
pub const CLUSTERING_BALANCE_RANGE: (f64, f64) = (1.0, 2.5);

/// A recommendation parameter outside its documented bounds
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    #[error("{name} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{name} must be within [{min}, {max}], got {value}")]
    CountOutOfRange {
        name: &'static str,
        value: usize,
        min: usize,
        max: usize,
    },
}

/// Knobs the host passes with every recommendation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationParameters {
    /// 0 keeps pure rank order, 1 picks uniformly at random
    pub exploration: f64,
    pub hide_watched: bool,
    pub num_of_groups: usize,
    pub videos_in_group: usize,
    /// Weight of the graph-structure distance
    pub clustering_balance_a: f64,
    /// Weight of the channel-affinity distance
    pub clustering_balance_b: f64,
    pub seed: u64,
}

impl Default for RecommendationParameters {
    fn default() -> Self {
        Self {
            exploration: 0.1,
            hide_watched: false,
            num_of_groups: 3,
            videos_in_group: 5,
            clustering_balance_a: 1.5,
            clustering_balance_b: 1.0,
            seed: 0,
        }
    }
}

impl RecommendationParameters {
    /// Number of ids in a grid produced with these parameters
    pub fn grid_len(&self) -> usize {
        self.num_of_groups * self.videos_in_group
    }

    /// Checks every field against its bounds without clamping
    pub fn validate(&self) -> Result<(), ParameterError> {
        check_real("exploration", self.exploration, EXPLORATION_RANGE)?;
        check_count("num_of_groups", self.num_of_groups, NUM_OF_GROUPS_RANGE)?;
        check_count("videos_in_group", self.videos_in_group, VIDEOS_IN_GROUP_RANGE)?;
        check_real(
            "clustering_balance_a",
            self.clustering_balance_a,
            CLUSTERING_BALANCE_RANGE,
        )?;
        check_real(
            "clustering_balance_b",
            self.clustering_balance_b,
            CLUSTERING_BALANCE_RANGE,
        )?;
        Ok(())
    }

    /// Returns a copy with every `Some` field of `overrides` applied
    pub fn merged(&self, overrides: &ParameterOverrides) -> Self {
        Self {
            exploration: overrides.exploration.unwrap_or(self.exploration),
            hide_watched: overrides.hide_watched.unwrap_or(self.hide_watched),
            num_of_groups: overrides.num_of_groups.unwrap_or(self.num_of_groups),
            videos_in_group: overrides.videos_in_group.unwrap_or(self.videos_in_group),
            clustering_balance_a: overrides
                .clustering_balance_a
                .unwrap_or(self.clustering_balance_a),
            clustering_balance_b: overrides
                .clustering_balance_b
                .unwrap_or(self.clustering_balance_b),
            seed: overrides.seed.unwrap_or(self.seed),
        }
    }
}

/// Partial parameters sent by the host; missing fields keep the engine's defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterOverrides {
    pub exploration: Option<f64>,
    pub hide_watched: Option<bool>,
    pub num_of_groups: Option<usize>,
    pub videos_in_group: Option<usize>,
    pub clustering_balance_a: Option<f64>,
    pub clustering_balance_b: Option<f64>,
    pub seed: Option<u64>,
}

fn check_real(name: &'static str, value: f64, (min, max): (f64, f64)) -> Result<(), ParameterError> {
    // NaN fails both comparisons and is rejected here too
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(ParameterError::OutOfRange {
            name,
            value,
            min,
            max,
        })
    }
}

fn check_count(
    name: &'static str,
    value: usize,
    (min, max): (usize, usize),
) -> Result<(), ParameterError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ParameterError::CountOutOfRange {
            name,
            value,
            min,
            max,
        })
    }
}
