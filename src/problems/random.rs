//! Small random Dec-POMDPs for property tests and benchmarks.

use crate::error::ModelError;
use crate::model::{Action, Agent, Alphabet, DecPomdp, Distribution, Observation, State, TabularModel, Vector};
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Shape of a generated model
#[derive(Debug, Copy, Clone)]
pub struct RandomModelSpec {
    pub agents: usize,
    pub states: usize,
    pub actions: usize,
    pub observations: usize,
    pub discount: f64,
}

impl Default for RandomModelSpec {
    fn default() -> Self {
        RandomModelSpec {
            agents: 2,
            states: 2,
            actions: 2,
            observations: 2,
            discount: 0.9,
        }
    }
}

fn random_distribution<T: Ord + Clone, R: Rng>(support: Vec<T>, rng: &mut R) -> Result<Distribution<T>, ModelError> {
    Distribution::from_weights(support.into_iter().map(|t| (t, rng.gen_range(0.05..1.0))))
}

/// Builds a reproducible random Dec-POMDP. Every agent starts with one node that picks its
/// actions uniformly and never moves, observations are independent per agent.
pub fn random_dec_pomdp(spec: RandomModelSpec, seed: u64) -> Result<DecPomdp, ModelError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let action_names: Vec<String> = (0..spec.actions).map(|a| format!("a{}", a)).collect();
    let observation_names: Vec<String> = (0..spec.observations).map(|o| format!("o{}", o)).collect();
    let uniform: Vec<(String, f64)> = action_names.iter().map(|a| (a.clone(), 1. / spec.actions as f64)).collect();
    let agents = (0..spec.agents)
        .map(|i| Agent::with_single_node(&format!("agent{}", i), &action_names[..], &observation_names[..], &uniform[..]))
        .collect::<Result<Vec<_>, _>>()?;
    let states: Alphabet<State> = Alphabet::from_names((0..spec.states).map(|s| format!("s{}", s)))?;

    let joint_actions: Vec<Vector<Action>> = agents.iter()
        .map(|agent| agent.actions().iter().collect::<Vec<_>>())
        .multi_cartesian_product()
        .map(Vector::new)
        .collect();
    let observation_sets: Vec<Vec<Observation>> = agents.iter()
        .map(|agent| agent.observations().iter().collect())
        .collect();

    let mut model = TabularModel::new();
    for s in states.iter() {
        for actions in joint_actions.iter() {
            model.set_transition(s, actions.clone(), random_distribution(states.iter().collect(), &mut rng)?);
            model.set_reward(s, actions.clone(), rng.gen_range(-10.0..10.0));
        }
    }
    for actions in joint_actions.iter() {
        for next in states.iter() {
            let per_agent = observation_sets.iter()
                .map(|obs| random_distribution(obs.clone(), &mut rng))
                .collect::<Result<Vec<_>, _>>()?;
            let joint: Vec<(Vector<Observation>, f64)> = observation_sets.iter()
                .map(|obs| obs.iter().copied())
                .multi_cartesian_product()
                .map(|o| {
                    let p: f64 = o.iter().zip(per_agent.iter()).map(|(o, d)| d.probability(o)).product();
                    (Vector::new(o), p)
                })
                .collect();
            model.set_observation(actions.clone(), next, Distribution::new(joint)?);
        }
    }

    let initial_belief = random_distribution(states.iter().collect(), &mut rng)?;
    DecPomdp::new(agents, states, spec.discount, initial_belief, &model, &model, &model)
}
