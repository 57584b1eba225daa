//! Solver options, read from JSON with camelCase keys. Every key is optional.
//!
//! ```json
//! {
//!   "numberOfBeliefPoints": 10,
//!   "maxIterations": 20,
//!   "beliefPointGenerationSeed": 42,
//!   "beliefPointDistanceNorm": "linf",
//!   "initialPolicies": {
//!     "agent1": { "tiger-left": { "listen": 0.8, "open-left": 0.1, "open-right": 0.1 } }
//!   }
//! }
//! ```

use crate::error::{Result, SolverError};
use crate::model::DistanceNorm;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// agent name -> state name -> action name -> probability
pub type InitialPolicies = BTreeMap<String, BTreeMap<String, BTreeMap<String, f64>>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct SolverConfig {
    /// Target number of belief points, including the initial belief
    pub number_of_belief_points: usize,
    /// Iteration cap, 0 disables it
    pub max_iterations: usize,
    /// 0 draws the seed from entropy
    pub belief_point_generation_seed: u64,
    pub belief_point_generation_max_runs: usize,
    /// Two belief points closer than this are considered the same
    pub belief_point_distance_threshold: f64,
    pub belief_point_distance_norm: DistanceNorm,
    /// The loop stops once the value at the initial belief changes by less than this
    pub value_change_threshold: f64,
    /// Smallest slack that counts as strict dominance
    pub dominance_tolerance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_policies: Option<InitialPolicies>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            number_of_belief_points: 10,
            max_iterations: 20,
            belief_point_generation_seed: 0,
            belief_point_generation_max_runs: 50,
            belief_point_distance_threshold: 1e-3,
            belief_point_distance_norm: DistanceNorm::L1,
            value_change_threshold: 1e-4,
            dominance_tolerance: 1e-9,
            initial_policies: None,
        }
    }
}

impl SolverConfig {
    pub fn from_json_str(json: &str) -> Result<SolverConfig> {
        let config: SolverConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<SolverConfig> {
        let json = fs::read_to_string(path)?;
        SolverConfig::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.number_of_belief_points == 0 {
            return Err(SolverError::Config("numberOfBeliefPoints must be positive".to_string()));
        }
        if self.belief_point_generation_max_runs == 0 {
            return Err(SolverError::Config("beliefPointGenerationMaxRuns must be positive".to_string()));
        }
        for (key, value) in [
            ("beliefPointDistanceThreshold", self.belief_point_distance_threshold),
            ("valueChangeThreshold", self.value_change_threshold),
            ("dominanceTolerance", self.dominance_tolerance),
        ] {
            if !value.is_finite() || value < 0. {
                return Err(SolverError::Config(format!("{} must be a non-negative number, got {}", key, value)));
            }
        }
        if self.max_iterations == 0 && self.value_change_threshold == 0. {
            return Err(SolverError::Config(
                "without an iteration cap valueChangeThreshold must be positive".to_string()));
        }
        Ok(())
    }

    pub fn with_initial_policies(mut self, policies: InitialPolicies) -> SolverConfig {
        self.initial_policies = Some(policies);
        self
    }
}
