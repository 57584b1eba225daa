//! The two agent Dec-Tiger benchmark.
//!
//! A tiger sits behind the left or the right door. Both agents listening costs 2 and keeps the
//! tiger in place, each agent then hears the correct side with probability 0.85 independently.
//! Any door being opened resets the problem to a uniformly random tiger position and yields
//! uninformative observations.

use crate::config::{InitialPolicies, SolverConfig};
use crate::error::ModelError;
use crate::model::utils::ToMap;
use crate::model::{Action, Agent, Alphabet, DecPomdp, Distribution, Observation, State, Symbol, Vector};
use std::collections::BTreeMap;

pub const STATES: [&str; 2] = ["tiger-left", "tiger-right"];
pub const ACTIONS: [&str; 3] = ["listen", "open-left", "open-right"];
pub const OBSERVATIONS: [&str; 2] = ["hear-left", "hear-right"];
pub const AGENTS: [&str; 2] = ["agent1", "agent2"];
pub const DISCOUNT: f64 = 0.99;
pub const HEARING_ACCURACY: f64 = 0.85;

/// Rewards while the tiger is behind the left door, indexed by the two agents' action names
fn rewards_tiger_left() -> [((&'static str, &'static str), f64); 9] {
    [
        (("listen", "listen"), -2.),
        (("listen", "open-left"), -101.),
        (("listen", "open-right"), 9.),
        (("open-left", "listen"), -101.),
        (("open-left", "open-left"), -50.),
        (("open-left", "open-right"), -100.),
        (("open-right", "listen"), 9.),
        (("open-right", "open-left"), -100.),
        (("open-right", "open-right"), 20.),
    ]
}

fn mirror(action: &'static str) -> &'static str {
    match action {
        "open-left" => "open-right",
        "open-right" => "open-left",
        other => other,
    }
}

/// Dec-Tiger where each agent starts with a single node that listens forever
pub fn dec_tiger() -> Result<DecPomdp, ModelError> {
    let agents = AGENTS.iter()
        .map(|name| Agent::with_single_node(name, &ACTIONS, &OBSERVATIONS, &[("listen", 1.)]))
        .collect::<Result<Vec<_>, _>>()?;
    let states: Alphabet<State> = Alphabet::from_names(STATES)?;
    let tiger_left = states.get("tiger-left")?;
    let names: Vec<(Alphabet<Action>, Alphabet<Observation>)> = agents.iter()
        .map(|a| (a.actions().clone(), a.observations().clone()))
        .collect();
    let listen: Vec<Action> = names.iter().map(|(actions, _)| actions.get("listen")).collect::<Result<_, _>>()?;
    let hear_left: Vec<Observation> = names.iter().map(|(_, obs)| obs.get("hear-left")).collect::<Result<_, _>>()?;

    let reward_table = rewards_tiger_left().to_map();
    // alphabets are built from ACTIONS in order
    let action_names = |actions: &Vector<Action>| (ACTIONS[actions[0].index()], ACTIONS[actions[1].index()]);
    let both_listen = |actions: &Vector<Action>| actions.iter().zip(listen.iter()).all(|(a, l)| a == l);

    let reset = Distribution::uniform(states.iter())?;
    let transition = |s: State, actions: &Vector<Action>| -> Option<Distribution<State>> {
        if both_listen(actions) {
            Some(Distribution::single(s))
        } else {
            Some(reset.clone())
        }
    };

    let reward = |s: State, actions: &Vector<Action>| -> Option<f64> {
        let (a1, a2) = action_names(actions);
        if s == tiger_left {
            reward_table.get(&(a1, a2)).copied()
        } else {
            reward_table.get(&(mirror(a1), mirror(a2))).copied()
        }
    };

    let observation = |actions: &Vector<Action>, next: State| -> Option<Distribution<Vector<Observation>>> {
        let correct = if next == tiger_left { HEARING_ACCURACY } else { 1. - HEARING_ACCURACY };
        let p_left = if both_listen(actions) { correct } else { 0.5 };
        let per_agent: Vec<Vec<(Observation, f64)>> = names.iter().zip(hear_left.iter())
            .map(|((_, obs), left)| obs.iter().map(|o| (o, if o == *left { p_left } else { 1. - p_left })).collect())
            .collect();
        let joint: Vec<(Vector<Observation>, f64)> = per_agent[0].iter()
            .flat_map(|(o1, p1)| per_agent[1].iter().map(move |(o2, p2)| (Vector::new(vec![*o1, *o2]), p1 * p2)))
            .collect();
        Distribution::new(joint).ok()
    };

    let initial_belief = Distribution::uniform(states.iter())?;
    DecPomdp::new(agents, states, DISCOUNT, initial_belief, &transition, &reward, &observation)
}

/// `{listen: 0.8, open-left: 0.1, open-right: 0.1}` in every state for both agents
pub fn initial_policies() -> InitialPolicies {
    let actions: BTreeMap<String, f64> = [("listen", 0.8), ("open-left", 0.1), ("open-right", 0.1)].iter()
        .map(|(a, p)| (a.to_string(), *p))
        .collect();
    let per_state: BTreeMap<String, BTreeMap<String, f64>> = STATES.iter()
        .map(|s| (s.to_string(), actions.clone()))
        .collect();
    AGENTS.iter().map(|agent| (agent.to_string(), per_state.clone())).collect()
}

/// 10 belief points, 20 iterations, reproducible belief points
pub fn config() -> SolverConfig {
    SolverConfig {
        number_of_belief_points: 10,
        max_iterations: 20,
        belief_point_generation_seed: 42,
        ..SolverConfig::default()
    }.with_initial_policies(initial_policies())
}
