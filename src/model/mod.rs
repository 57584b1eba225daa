//! Data model of a Dec-POMDP whose agents are controlled by stochastic finite state controllers.

pub mod agent;
pub mod controller;
pub mod dec_pomdp;
pub mod distribution;
pub mod symbols;
pub mod utils;
pub mod value_function;
pub mod vector;

pub use agent::{Agent, ControllerSnapshot, NodeSnapshot, TransitionSnapshot};
pub use controller::FiniteStateController;
pub use dec_pomdp::{DecPomdp, ObservationModel, RewardModel, TabularModel, TransitionModel};
pub use distribution::{DistanceNorm, Distribution};
pub use symbols::{Action, Alphabet, Node, Observation, State, Symbol};
pub use value_function::ValueFunction;
pub use vector::Vector;

/// Tolerance on the total mass of a probability distribution
pub const PROB_TOLERANCE: f64 = 1e-6;
