use crate::error::{Result, SolverError};
use crate::model::{DecPomdp, Distribution, Node, Vector};
use crate::policy_iteration::belief_points::BeliefPoints;
use itertools::Itertools;
use ndarray::Array1;
use solvers::{LinearProgram, LinearProgramSolver, Relation, SimplexSolver};
use tracing::{debug, instrument, trace};

/// Mixture weights below this are treated as zero
const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Prunes nodes that are strictly dominated by a convex combination of the other nodes of
/// the same agent, for every belief point and every combination of the other agents' nodes.
#[derive(Debug, Clone)]
pub struct CombinatorialNodePruner<L = SimplexSolver> {
    solver: L,
    tolerance: f64,
}

impl CombinatorialNodePruner<SimplexSolver> {
    pub fn new(tolerance: f64) -> CombinatorialNodePruner<SimplexSolver> {
        CombinatorialNodePruner { solver: SimplexSolver, tolerance }
    }
}

impl<L: LinearProgramSolver> CombinatorialNodePruner<L> {
    pub fn with_solver(solver: L, tolerance: f64) -> CombinatorialNodePruner<L> {
        CombinatorialNodePruner { solver, tolerance }
    }

    /// Tests every current node of `agent` in turn and prunes the dominated ones, replacing
    /// each with its dominating mixture. Returns the number of pruned nodes.
    #[instrument(level = "debug", skip_all, fields(agent = agent))]
    pub fn prune(&self, model: &mut DecPomdp, agent: usize, beliefs: &BeliefPoints) -> Result<usize> {
        if beliefs.is_empty() {
            return Err(SolverError::IllegalState("cannot prune nodes without belief points".to_string()));
        }
        let nodes = model.agent(agent)
            .ok_or_else(|| SolverError::IllegalState(format!("no agent {}", agent)))?
            .nodes();
        let mut pruned = 0;
        for q in nodes {
            let current = model.agents()[agent].nodes();
            if current.len() <= 1 {
                break;
            }
            let candidates: Vec<Node> = current.into_iter().filter(|c| *c != q).collect();
            if let Some(mixture) = self.dominating_mixture(model, agent, q, &candidates, beliefs)? {
                model.agent_mut(agent)
                    .ok_or_else(|| SolverError::IllegalState(format!("no agent {}", agent)))?
                    .prune_node(q, &mixture)?;
                model.value_function_mut().retain(|nodes| nodes[agent] != q);
                pruned += 1;
            }
        }
        debug!(pruned, remaining = model.agents()[agent].controller().len(), "combinatorial pruning");
        Ok(pruned)
    }

    /// Solves
    ///
    ///   max ε  s.t.  Σ_c w_c V_b(c, q⃗₋ᵢ) - ε ≥ V_b(q, q⃗₋ᵢ)  for every belief b and q⃗₋ᵢ
    ///                Σ_c w_c = 1,  0 ≤ w_c ≤ 1
    ///
    /// and returns the mixture w when ε exceeds the dominance tolerance.
    pub fn dominating_mixture(&self, model: &DecPomdp, agent: usize, q: Node, candidates: &[Node], beliefs: &BeliefPoints)
        -> Result<Option<Distribution<Node>>> {
        if candidates.is_empty() {
            return Ok(None);
        }
        let mut program = LinearProgram::maximize();
        let weights: Vec<_> = candidates.iter().map(|_| program.add_var(0., (0., 1.))).collect();
        let epsilon = program.add_var(1., (f64::NEG_INFINITY, f64::INFINITY));

        let with_q: Vec<Vector<Node>> = model.agents().iter().enumerate()
            .map(|(j, other)| if j == agent { vec![q] } else { other.nodes() })
            .multi_cartesian_product()
            .map(Vector::new)
            .collect();
        let beliefs: Vec<Array1<f64>> = beliefs.iter().map(|b| model.belief_vector(b)).collect();
        for b in beliefs.iter() {
            for nodes in with_q.iter() {
                let target = model.value_of(b, nodes)?;
                let mut terms = Vec::with_capacity(candidates.len() + 1);
                for (c, w) in candidates.iter().zip(weights.iter()) {
                    terms.push((*w, model.value_of(b, &nodes.with(agent, *c))?));
                }
                terms.push((epsilon, -1.));
                program.add_constraint(terms, Relation::Ge, target);
            }
        }
        program.add_constraint(weights.iter().map(|w| (*w, 1.)), Relation::Eq, 1.);

        let node_name = model.agents()[agent].controller().node_name(q);
        let solution = match self.solver.solve(&program) {
            Some(solution) => solution,
            None => {
                trace!(node = %node_name, "no feasible mixture");
                return Ok(None);
            }
        };
        let slack = solution[epsilon];
        if slack <= self.tolerance {
            trace!(node = %node_name, slack, "node is not dominated");
            return Ok(None);
        }
        let mixture = Distribution::from_weights(candidates.iter().zip(weights.iter())
            .map(|(c, w)| (*c, solution[*w].max(0.)))
            .filter(|(_, w)| *w > WEIGHT_TOLERANCE))?;
        trace!(node = %node_name, slack, "node is dominated");
        Ok(Some(mixture))
    }
}
