//! Heuristic policy iteration for decentralized POMDPs whose agents follow stochastic finite
//! state controllers.
//!
//! ```no_run
//! use hpi::policy_iteration::HeuristicPolicyIteration;
//! use hpi::problems::dec_tiger;
//!
//! let model = dec_tiger::dec_tiger().unwrap();
//! let mut solver = HeuristicPolicyIteration::new(model, dec_tiger::config()).unwrap();
//! let value = solver.solve().unwrap();
//! println!("value at the initial belief: {}", value);
//! ```

pub mod config;
pub mod error;
pub mod model;
pub mod policy_iteration;
pub mod problems;

pub use config::SolverConfig;
pub use error::{ModelError, SolverError};
pub use policy_iteration::{HeuristicPolicyIteration, SolveReport};

#[cfg(test)]
mod tests;
