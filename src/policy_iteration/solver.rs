use crate::config::SolverConfig;
use crate::error::{Result, SolverError};
use crate::model::{DecPomdp, Distribution};
use crate::policy_iteration::backup::exhaustive_backup;
use crate::policy_iteration::belief_points::{BeliefPointGenerator, BeliefPoints, StatePolicy};
use crate::policy_iteration::evaluation::ValueFunctionEvaluater;
use crate::policy_iteration::pruning::CombinatorialNodePruner;
use crate::policy_iteration::retention::retain_dominating_nodes;
use serde::Serialize;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Drop of the value at the initial belief that still counts as no change
const DEGRADATION_TOLERANCE: f64 = 1e-9;

/// Where the solver is in its life cycle
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum Phase {
    Uninitialized,
    BeliefPointsGenerated,
    Evaluated,
    Iterating,
    Terminated,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Termination {
    /// The value at the initial belief changed by less than `valueChangeThreshold`
    Converged,
    /// `maxIterations` reached
    IterationLimit,
}

/// Outcome of [`HeuristicPolicyIteration::solve_with_report`]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveReport {
    /// Joint value at the initial belief
    pub value: f64,
    pub iterations: usize,
    pub termination: Termination,
    /// Value at the initial belief after the initial evaluation and after every iteration
    pub history: Vec<f64>,
    /// Controller sizes per agent at termination
    pub node_counts: Vec<usize>,
    pub belief_points: usize,
}

/// Heuristic policy iteration for Dec-POMDPs with stochastic finite state controllers.
///
/// Belief points are generated once per solve. Then, starting from an exact evaluation of the
/// initial controllers, every iteration performs an exhaustive backup, keeps the nodes that are
/// best at some belief point, prunes dominated nodes agent by agent and re-evaluates. An
/// iteration that fails or lowers the value at the initial belief is rolled back.
pub struct HeuristicPolicyIteration {
    model: DecPomdp,
    config: SolverConfig,
    initial_policies: Option<Vec<StatePolicy>>,
    evaluater: ValueFunctionEvaluater,
    pruner: CombinatorialNodePruner,
    phase: Phase,
    belief_points: Option<BeliefPoints>,
}

impl HeuristicPolicyIteration {
    /// Validates the configuration against the model. A discount factor of 1 is rejected.
    pub fn new(model: DecPomdp, config: SolverConfig) -> Result<HeuristicPolicyIteration> {
        config.validate()?;
        if model.discount() >= 1. {
            return Err(SolverError::UndiscountedModel);
        }
        let initial_policies = match config.initial_policies.as_ref() {
            Some(policies) => Some(resolve_policies(&model, policies)?),
            None => None,
        };
        let pruner = CombinatorialNodePruner::new(config.dominance_tolerance);
        Ok(HeuristicPolicyIteration {
            model,
            config,
            initial_policies,
            evaluater: ValueFunctionEvaluater::new(),
            pruner,
            phase: Phase::Uninitialized,
            belief_points: None,
        })
    }

    pub fn model(&self) -> &DecPomdp {
        &self.model
    }

    pub fn into_model(self) -> DecPomdp {
        self.model
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Belief points of the last solve
    pub fn belief_points(&self) -> Option<&BeliefPoints> {
        self.belief_points.as_ref()
    }

    /// Runs policy iteration and returns the joint value at the initial belief
    pub fn solve(&mut self) -> Result<f64> {
        self.solve_with_report().map(|report| report.value)
    }

    #[instrument(skip_all)]
    pub fn solve_with_report(&mut self) -> Result<SolveReport> {
        let start = Instant::now();
        self.phase = Phase::Uninitialized;
        let beliefs = BeliefPointGenerator::from_config(&self.config)
            .generate(&self.model, self.initial_policies.as_deref())?;
        self.phase = Phase::BeliefPointsGenerated;

        self.evaluater.evaluate(&mut self.model)?;
        self.phase = Phase::Evaluated;
        let mut controller_state = self.model.value_at(self.model.initial_belief())?;
        let mut history = vec![controller_state];
        info!(value = controller_state, beliefs = beliefs.len(), "evaluated initial controllers");

        let mut iteration = 0;
        let termination = loop {
            self.phase = Phase::Iterating;
            iteration += 1;
            let checkpoint = self.model.clone();
            if let Err(e) = self.improve(&beliefs) {
                self.model = checkpoint;
                self.phase = Phase::Terminated;
                return Err(e);
            }

            let mut value = self.model.value_at(self.model.initial_belief())?;
            if value < controller_state - DEGRADATION_TOLERANCE {
                warn!(iteration, value, kept = controller_state, "iteration lowered the value, keeping previous controllers");
                self.model = checkpoint;
                value = controller_state;
            }
            let change = (value - controller_state).abs();
            history.push(value);
            info!(iteration, value, change, nodes = ?self.model.node_counts(), "policy iteration step");
            controller_state = value;

            if change < self.config.value_change_threshold {
                break Termination::Converged;
            }
            if self.config.max_iterations > 0 && iteration >= self.config.max_iterations {
                break Termination::IterationLimit;
            }
        };
        self.phase = Phase::Terminated;

        let report = SolveReport {
            value: controller_state,
            iterations: iteration,
            termination,
            history,
            node_counts: self.model.node_counts(),
            belief_points: beliefs.len(),
        };
        info!(value = report.value, iterations = iteration, termination = ?termination,
            elapsed = ?start.elapsed(), "policy iteration finished");
        self.belief_points = Some(beliefs);
        Ok(report)
    }

    /// One backup, retain, prune and evaluate pass over the controllers
    fn improve(&mut self, beliefs: &BeliefPoints) -> Result<()> {
        exhaustive_backup(&mut self.model)?;
        retain_dominating_nodes(&mut self.model, beliefs)?;
        for agent in 0..self.model.num_agents() {
            self.pruner.prune(&mut self.model, agent, beliefs)?;
        }
        self.evaluater.evaluate(&mut self.model)
    }
}

/// Resolves named per-state policies against the model. Agents and states without an entry
/// get a uniform policy.
pub fn resolve_policies(model: &DecPomdp, policies: &crate::config::InitialPolicies) -> Result<Vec<StatePolicy>> {
    if let Some(unknown) = policies.keys().find(|name| !model.agents().iter().any(|a| a.name() == name.as_str())) {
        return Err(SolverError::Config(format!("initial policy for unknown agent `{}`", unknown)));
    }
    model.agents().iter()
        .map(|agent| -> Result<StatePolicy> {
            let uniform = Distribution::uniform(agent.actions().iter())?;
            let per_state = match policies.get(agent.name()) {
                Some(per_state) => per_state,
                None => return Ok(vec![uniform; model.num_states()]),
            };
            for state in per_state.keys() {
                model.states().get(state)
                    .map_err(|e| SolverError::Config(format!("initial policy of `{}`: {}", agent.name(), e)))?;
            }
            model.states().iter()
                .map(|s| match per_state.get(model.states().name(s)) {
                    Some(actions) => {
                        let entries = actions.iter()
                            .map(|(name, p)| agent.actions().get(name).map(|a| (a, *p)))
                            .collect::<std::result::Result<Vec<_>, _>>()
                            .map_err(|e| SolverError::Config(format!("initial policy of `{}`: {}", agent.name(), e)))?;
                        Distribution::new(entries)
                            .map_err(|e| SolverError::Config(format!("initial policy of `{}`: {}", agent.name(), e)))
                    }
                    None => Ok(uniform.clone()),
                })
                .collect()
        })
        .collect()
}
