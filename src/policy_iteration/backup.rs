use crate::error::{Result, SolverError};
use crate::model::{Action, DecPomdp, FiniteStateController, Node, Observation, State, Vector};
use itertools::Itertools;
use ndarray::Array1;
use rayon::prelude::*;
use tracing::{debug, instrument};

/// Exhaustive backup: every agent gets one new deterministic node per action and per
/// assignment of an existing successor node to each of its observations, i.e.
/// |A| · n^|O| new nodes for an agent that had n nodes. Existing nodes are kept.
///
/// Afterwards every node combination without values is filled in by a single Bellman step
/// over the values of the previous evaluation. Returns the new nodes of each agent. If any
/// part fails the controllers are restored to their state before the backup.
#[instrument(level = "debug", skip_all)]
pub fn exhaustive_backup(model: &mut DecPomdp) -> Result<Vec<Vec<Node>>> {
    let checkpoint: Vec<FiniteStateController> = model.agents().iter()
        .map(|agent| agent.controller().clone())
        .collect();
    let grown = grow_controllers(model).and_then(|added| top_up_values(model).map(|_| added));
    match grown {
        Ok(added) => Ok(added),
        Err(e) => {
            for (agent, controller) in model.agents_mut().iter_mut().zip(checkpoint) {
                *agent.controller_mut() = controller;
            }
            Err(e)
        }
    }
}

fn grow_controllers(model: &mut DecPomdp) -> Result<Vec<Vec<Node>>> {
    let mut added: Vec<Vec<Node>> = Vec::with_capacity(model.num_agents());
    for agent in model.agents_mut().iter_mut() {
        let existing = agent.nodes();
        let actions: Vec<Action> = agent.actions().iter().collect();
        let observations: Vec<Observation> = agent.observations().iter().collect();
        let size = backup_size(actions.len(), observations.len(), existing.len())
            .ok_or_else(|| SolverError::BackupTooLarge {
                agent: agent.name().to_string(),
                nodes: existing.len(),
                observations: observations.len(),
            })?;
        let mut new_nodes = Vec::with_capacity(size);
        for a in actions {
            for successors in (0..observations.len()).map(|_| existing.iter().copied()).multi_cartesian_product() {
                let mapping: Vec<(Observation, Node)> = observations.iter().copied().zip(successors).collect();
                new_nodes.push(agent.controller_mut().add_deterministic_node(a, &mapping)?);
            }
        }
        debug!(agent = agent.name(), before = existing.len(), added = new_nodes.len(), "backed up controller");
        added.push(new_nodes);
    }
    Ok(added)
}

/// Computes V(s, q⃗) for every combination that has no values yet from the stored values of
/// its successors. Nothing is written unless every missing combination could be resolved.
#[instrument(level = "debug", skip_all)]
pub fn top_up_values(model: &mut DecPomdp) -> Result<usize> {
    let missing: Vec<Vector<Node>> = model.node_combinations()
        .into_iter()
        .filter(|nodes| !model.value_function().has_row(nodes))
        .collect();
    let rows: Vec<(Vector<Node>, Array1<f64>)> = {
        let model: &DecPomdp = model;
        missing.into_par_iter()
            .map(|nodes| -> Result<(Vector<Node>, Array1<f64>)> {
                let values = model.states().iter()
                    .map(|s| bellman_backup(model, &nodes, s))
                    .collect::<Result<Vec<f64>>>()?;
                Ok((nodes, Array1::from(values)))
            })
            .collect::<Result<Vec<_>>>()?
    };
    let filled = rows.len();
    model.value_function_mut().extend(rows);
    debug!(filled, "topped up value function");
    Ok(filled)
}

fn bellman_backup(model: &DecPomdp, nodes: &Vector<Node>, state: State) -> Result<f64> {
    let gamma = model.discount();
    let values = model.value_function();
    let mut value = 0.;
    for (ja, p_action) in model.joint_action_distribution(nodes)? {
        let actions = &model.joint_actions()[ja];
        let mut future = 0.;
        for (next, p_trans) in model.transition_at(state, ja).iter() {
            for (observations, p_obs) in model.observation_at(ja, *next).iter() {
                for (successors, p_node) in model.joint_node_transition(nodes, actions, observations)? {
                    let v = values.get(*next, &successors).ok_or_else(|| SolverError::MissingValue {
                        state: model.states().name(*next).to_string(),
                        nodes: model.describe_nodes(&successors),
                    })?;
                    future += p_trans * p_obs * p_node * v;
                }
            }
        }
        value += p_action * (model.reward_at(state, ja) + gamma * future);
    }
    Ok(value)
}

/// Number of nodes an exhaustive backup adds to a controller, `None` if it does not fit a `usize`
pub fn backup_size(actions: usize, observations: usize, nodes: usize) -> Option<usize> {
    let exponent = u32::try_from(observations).ok()?;
    nodes.checked_pow(exponent)?.checked_mul(actions)
}
