use crate::error::{Result, SolverError};
use crate::model::{DecPomdp, Node, Observation, State, Symbol, Vector};
use ndarray::Array1;
use rayon::prelude::*;
use solvers::{LinearEquationSolver, LuSolver, SparseSystem};
use std::collections::{BTreeSet, HashMap, VecDeque};
use tracing::{debug, instrument};

/// Evaluates the current controllers exactly by solving the linear system
///
///   V(s, q⃗) = Σ_a⃗ P(a⃗|q⃗) [ R(s,a⃗) + γ Σ_s' Σ_o⃗ Σ_q⃗' T(s,a⃗,s') O(a⃗,s',o⃗) P(q⃗'|q⃗,a⃗,o⃗) V(s',q⃗') ]
///
/// with one unknown per (state, node combination). Unknown `c * |S| + s` belongs to state `s`
/// of the `c`-th combination.
#[derive(Debug, Default, Clone)]
pub struct ValueFunctionEvaluater<L = LuSolver> {
    solver: L,
}

impl ValueFunctionEvaluater<LuSolver> {
    pub fn new() -> ValueFunctionEvaluater<LuSolver> {
        ValueFunctionEvaluater { solver: LuSolver }
    }
}

impl<L: LinearEquationSolver> ValueFunctionEvaluater<L> {
    pub fn with_solver(solver: L) -> ValueFunctionEvaluater<L> {
        ValueFunctionEvaluater { solver }
    }

    /// Solves for every combination of the agents' current nodes and replaces the value
    /// function with the solution. On failure the value function is left untouched.
    #[instrument(level = "debug", skip_all)]
    pub fn evaluate(&self, model: &mut DecPomdp) -> Result<()> {
        let combinations = model.node_combinations();
        self.evaluate_combinations(model, combinations)
    }

    /// Like [`ValueFunctionEvaluater::evaluate`] but only for the node combinations reachable
    /// from `root` through the controllers' node transitions
    #[instrument(level = "debug", skip_all)]
    pub fn evaluate_reachable(&self, model: &mut DecPomdp, root: &Vector<Node>) -> Result<()> {
        let combinations = reachable_combinations(model, root)?;
        self.evaluate_combinations(model, combinations)
    }

    fn evaluate_combinations(&self, model: &mut DecPomdp, combinations: Vec<Vector<Node>>) -> Result<()> {
        let num_states = model.num_states();
        let unknowns = combinations.len() * num_states;
        let index: HashMap<Vector<Node>, usize> = combinations.iter()
            .enumerate()
            .map(|(c, nodes)| (nodes.clone(), c))
            .collect();

        let rows: Vec<(Vec<(usize, f64)>, f64)> = {
            let model: &DecPomdp = model;
            (0..unknowns).into_par_iter()
                .map(|row| {
                    let nodes = &combinations[row / num_states];
                    let state = State::from_index(row % num_states);
                    equation_row(model, &index, nodes, state)
                })
                .collect::<Result<Vec<_>>>()?
        };

        let mut system = SparseSystem::new(unknowns);
        for (row, (coefficients, rhs)) in rows.into_iter().enumerate() {
            system.add_row(row, coefficients, rhs).ok_or_else(|| SolverError::IllegalState(
                format!("equation {} refers to an unknown outside the {} evaluated", row, unknowns)))?;
        }
        debug!(unknowns, non_zeros = system.non_zeros(), "solving value function equations");

        let solution = self.solver.solve_system(&system)
            .ok_or(SolverError::ValueFunctionUnsolvable { unknowns })?;

        model.value_function_mut().replace_all(combinations.into_iter().enumerate().map(|(c, nodes)| {
            let values: Array1<f64> = (0..num_states).map(|s| solution[c * num_states + s]).collect();
            (nodes, values)
        }));
        Ok(())
    }
}

/// Coefficients and right hand side of the equation of V(state, nodes). The diagonal carries
/// -1, every successor unknown the discounted probability of reaching it.
fn equation_row(model: &DecPomdp, index: &HashMap<Vector<Node>, usize>, nodes: &Vector<Node>, state: State)
    -> Result<(Vec<(usize, f64)>, f64)> {
    let num_states = model.num_states();
    let gamma = model.discount();
    let own = index[nodes] * num_states + state.index();
    let mut coefficients: HashMap<usize, f64> = HashMap::new();
    coefficients.insert(own, -1.);
    let mut rhs = 0.;
    for (ja, p_action) in model.joint_action_distribution(nodes)? {
        rhs -= p_action * model.reward_at(state, ja);
        let actions = &model.joint_actions()[ja];
        for (next, p_trans) in model.transition_at(state, ja).iter() {
            for (observations, p_obs) in model.observation_at(ja, *next).iter() {
                for (successors, p_node) in model.joint_node_transition(nodes, actions, observations)? {
                    let c = index.get(&successors).ok_or_else(|| SolverError::IllegalState(format!(
                        "successor combination {} is not part of the evaluated set", model.describe_nodes(&successors))))?;
                    *coefficients.entry(c * num_states + next.index()).or_insert(0.) +=
                        gamma * p_action * p_trans * p_obs * p_node;
                }
            }
        }
    }
    Ok((coefficients.into_iter().collect(), rhs))
}

/// Breadth first search over node combinations, following every (joint action, joint
/// observation) pair with positive probability
pub fn reachable_combinations(model: &DecPomdp, root: &Vector<Node>) -> Result<Vec<Vector<Node>>> {
    let mut observations_of: HashMap<usize, BTreeSet<Vector<Observation>>> = HashMap::new();
    let mut seen: BTreeSet<Vector<Node>> = BTreeSet::new();
    let mut order: Vec<Vector<Node>> = Vec::new();
    let mut queue: VecDeque<Vector<Node>> = VecDeque::new();
    // validates the root
    model.joint_action_distribution(root)?;
    seen.insert(root.clone());
    queue.push_back(root.clone());
    while let Some(nodes) = queue.pop_front() {
        for (ja, _) in model.joint_action_distribution(&nodes)? {
            let observations = observations_of.entry(ja).or_insert_with(|| {
                model.states().iter()
                    .flat_map(|next| model.observation_at(ja, next).support().cloned().collect::<Vec<_>>())
                    .collect()
            });
            let actions = &model.joint_actions()[ja];
            for o in observations.iter() {
                for (successors, _) in model.joint_node_transition(&nodes, actions, o)? {
                    if seen.insert(successors.clone()) {
                        queue.push_back(successors);
                    }
                }
            }
        }
        order.push(nodes);
    }
    Ok(order)
}
