use crate::error::{Result, SolverError};
use crate::model::{DecPomdp, Distribution, FiniteStateController, Node, Vector};
use crate::policy_iteration::belief_points::BeliefPoints;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument};

/// Keeps only the nodes that take part in the best node combination of at least one belief
/// point, together with every node they can transition to. Every other node is pruned and
/// redirected to a uniform mixture of the kept nodes of its agent. Kept nodes never point at
/// pruned ones, so their values are unchanged. Returns the number of pruned nodes per agent.
#[instrument(level = "debug", skip_all, fields(beliefs = beliefs.len()))]
pub fn retain_dominating_nodes(model: &mut DecPomdp, beliefs: &BeliefPoints) -> Result<Vec<usize>> {
    if beliefs.is_empty() {
        return Err(SolverError::IllegalState("cannot retain nodes without belief points".to_string()));
    }
    let combinations = model.node_combinations();
    let best: Vec<Vector<Node>> = {
        let model: &DecPomdp = model;
        beliefs.points().par_iter()
            .map(|belief| model.best_among(&combinations, belief).map(|(nodes, _)| nodes))
            .collect::<Result<Vec<_>>>()?
    };

    let mut retained: Vec<BTreeSet<Node>> = vec![BTreeSet::new(); model.num_agents()];
    for nodes in best.iter() {
        for (i, q) in nodes.iter().enumerate() {
            retained[i].insert(*q);
        }
    }
    for (i, keep) in retained.iter_mut().enumerate() {
        let argmax = keep.len();
        *keep = successor_closure(model.agents()[i].controller(), keep);
        debug!(agent = i, argmax, closed = keep.len(), "closed retained nodes under transitions");
    }

    let mut pruned_counts = Vec::with_capacity(model.num_agents());
    for (i, keep) in retained.iter().enumerate() {
        let agent = model.agent_mut(i)
            .ok_or_else(|| SolverError::IllegalState(format!("agent {} vanished", i)))?;
        let replacement = Distribution::uniform(keep.iter().copied())?;
        let replacements: BTreeMap<Node, Distribution<Node>> = agent.nodes().into_iter()
            .filter(|q| !keep.contains(q))
            .map(|q| (q, replacement.clone()))
            .collect();
        agent.prune_nodes(&replacements)?;
        debug!(agent = agent.name(), kept = keep.len(), pruned = replacements.len(), "retained dominating nodes");
        pruned_counts.push(replacements.len());
    }
    model.value_function_mut()
        .retain(|nodes| nodes.iter().enumerate().all(|(i, q)| retained[i].contains(q)));
    Ok(pruned_counts)
}

/// Every node reachable from `roots` through node transitions of selectable actions, roots included
pub fn successor_closure(controller: &FiniteStateController, roots: &BTreeSet<Node>) -> BTreeSet<Node> {
    let mut closed = roots.clone();
    let mut stack: Vec<Node> = roots.iter().copied().collect();
    while let Some(q) = stack.pop() {
        for next in controller.successors(q) {
            if closed.insert(next) {
                stack.push(next);
            }
        }
    }
    closed
}
