//! The heuristic policy iteration pipeline: exact evaluation, belief point generation,
//! exhaustive backup, retention of belief-dominating nodes, combinatorial pruning and the
//! solver driving them.

pub mod backup;
pub mod belief_points;
pub mod evaluation;
pub mod pruning;
pub mod retention;
pub mod solver;

pub use backup::{backup_size, exhaustive_backup, top_up_values};
pub use belief_points::{BeliefPointGenerator, BeliefPoints, StatePolicy};
pub use evaluation::{reachable_combinations, ValueFunctionEvaluater};
pub use pruning::CombinatorialNodePruner;
pub use retention::{retain_dominating_nodes, successor_closure};
pub use solver::{HeuristicPolicyIteration, Phase, SolveReport, Termination};
