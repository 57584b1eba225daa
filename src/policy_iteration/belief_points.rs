use crate::config::SolverConfig;
use crate::error::{Result, SolverError};
use crate::model::{Action, DecPomdp, DistanceNorm, Distribution, State, Symbol};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

/// A per-state action policy of one agent, indexed by state
pub type StatePolicy = Vec<Distribution<Action>>;

/// Set of mutually distinct belief states, shared by all agents. The first point is always
/// the initial belief of the model.
#[derive(Debug, Clone, PartialEq)]
pub struct BeliefPoints(Vec<Distribution<State>>);

impl BeliefPoints {
    pub fn new(points: Vec<Distribution<State>>) -> BeliefPoints {
        BeliefPoints(points)
    }

    pub fn points(&self) -> &[Distribution<State>] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Distribution<State>> {
        self.0.iter()
    }
}

/// Samples reachable belief states by simulating the model under per-state joint policies.
#[derive(Debug, Clone)]
pub struct BeliefPointGenerator {
    count: usize,
    max_runs: usize,
    threshold: f64,
    norm: DistanceNorm,
    seed: u64,
}

impl BeliefPointGenerator {
    pub fn new(count: usize, max_runs: usize, threshold: f64, norm: DistanceNorm, seed: u64) -> BeliefPointGenerator {
        BeliefPointGenerator { count, max_runs, threshold, norm, seed }
    }

    pub fn from_config(config: &SolverConfig) -> BeliefPointGenerator {
        BeliefPointGenerator::new(
            config.number_of_belief_points,
            config.belief_point_generation_max_runs,
            config.belief_point_distance_threshold,
            config.belief_point_distance_norm,
            config.belief_point_generation_seed,
        )
    }

    /// Collects up to `count` belief points. The first run follows `initial` (uniform
    /// policies when absent), later runs draw fresh random policies. Each run starts from the
    /// most recently accepted point. A seed of 0 draws from entropy.
    #[instrument(level = "debug", skip_all, fields(count = self.count))]
    pub fn generate(&self, model: &DecPomdp, initial: Option<&[StatePolicy]>) -> Result<BeliefPoints> {
        if self.count == 0 {
            return Err(SolverError::Config("at least one belief point is required".to_string()));
        }
        if let Some(policies) = initial {
            check_policies(model, policies)?;
        }
        let mut rng: StdRng = if self.seed == 0 {
            StdRng::from_entropy()
        } else {
            StdRng::seed_from_u64(self.seed)
        };

        let mut points: Vec<Distribution<State>> = vec![model.initial_belief().clone()];
        let mut run = 0;
        while points.len() < self.count && run < self.max_runs {
            let policies = match (run, initial) {
                (0, Some(policies)) => policies.to_vec(),
                (0, None) => uniform_policies(model)?,
                _ => random_policies(model, &mut rng)?,
            };
            let mut belief = points[points.len() - 1].clone();
            'run: for _ in 0..self.count {
                for agent in 0..model.num_agents() {
                    let next = match successor_belief(model, &policies, agent, &belief, &mut rng)? {
                        Some(next) => next,
                        None => break 'run,
                    };
                    if !points.iter().any(|p| p.close_to(&next, self.threshold, self.norm)) {
                        points.push(next.clone());
                        if points.len() >= self.count {
                            break 'run;
                        }
                    }
                    belief = next;
                }
            }
            run += 1;
        }
        if points.len() < self.count {
            warn!(found = points.len(), requested = self.count, runs = run, "belief point generation ran out of runs");
        }
        debug!(points = points.len(), runs = run, "generated belief points");
        Ok(BeliefPoints(points))
    }
}

fn check_policies(model: &DecPomdp, policies: &[StatePolicy]) -> Result<()> {
    if policies.len() != model.num_agents() {
        return Err(SolverError::Config(format!("{} initial policies for {} agents", policies.len(), model.num_agents())));
    }
    for (agent, policy) in model.agents().iter().zip(policies.iter()) {
        if policy.len() != model.num_states() {
            return Err(SolverError::Config(format!(
                "initial policy of `{}` covers {} of {} states", agent.name(), policy.len(), model.num_states())));
        }
        if policy.iter().any(|d| d.support().any(|a| !agent.actions().contains(*a))) {
            return Err(SolverError::Config(format!("initial policy of `{}` uses unknown actions", agent.name())));
        }
    }
    Ok(())
}

pub fn uniform_policies(model: &DecPomdp) -> Result<Vec<StatePolicy>> {
    model.agents().iter()
        .map(|agent| -> Result<StatePolicy> {
            let uniform = Distribution::uniform(agent.actions().iter())?;
            Ok(vec![uniform; model.num_states()])
        })
        .collect()
}

pub fn random_policies<R: Rng + ?Sized>(model: &DecPomdp, rng: &mut R) -> Result<Vec<StatePolicy>> {
    model.agents().iter()
        .map(|agent| -> Result<StatePolicy> {
            (0..model.num_states())
                .map(|_| -> Result<Distribution<Action>> {
                    let weights: Vec<(Action, f64)> = agent.actions().iter().map(|a| (a, rng.gen::<f64>())).collect();
                    Distribution::from_weights(weights).map_err(SolverError::from)
                })
                .collect()
        })
        .collect()
}

/// One simulated step seen through the eyes of `agent`: draw a state, the joint action and
/// the successor, then condition the belief on the agent's own action and observation while
/// marginalising over the actions and observations of everybody else.
/// `None` when the drawn evidence has no mass under `belief`.
fn successor_belief<R: Rng + ?Sized>(
    model: &DecPomdp,
    policies: &[StatePolicy],
    agent: usize,
    belief: &Distribution<State>,
    rng: &mut R,
) -> Result<Option<Distribution<State>>> {
    let state = *belief.sample(rng);
    let sampled: Vec<Action> = policies.iter().map(|policy| *policy[state.index()].sample(rng)).collect();
    let ja = model.joint_action_index(&sampled.into())?;
    let next = *model.transition_at(state, ja).sample(rng);
    let own_action = model.joint_actions()[ja][agent];
    let own_observation = model.observation_at(ja, next).sample(rng)[agent];

    let mut weights: BTreeMap<State, f64> = BTreeMap::new();
    for (ja, actions) in model.joint_actions().iter().enumerate() {
        if actions[agent] != own_action {
            continue;
        }
        for (s, b) in belief.iter() {
            let others: f64 = policies.iter().enumerate()
                .filter(|(j, _)| *j != agent)
                .map(|(j, policy)| policy[s.index()].probability(&actions[j]))
                .product();
            if others == 0. {
                continue;
            }
            for (s_next, p_trans) in model.transition_at(*s, ja).iter() {
                let p_obs: f64 = model.observation_at(ja, *s_next).iter()
                    .filter(|(o, _)| o[agent] == own_observation)
                    .map(|(_, p)| p)
                    .sum();
                *weights.entry(*s_next).or_insert(0.) += b * others * p_trans * p_obs;
            }
        }
    }
    match Distribution::from_weights(weights) {
        Ok(next) => Ok(Some(next)),
        Err(_) => Ok(None),
    }
}
