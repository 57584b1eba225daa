use minilp::{ComparisonOp, LinearExpr, OptimizationDirection, Problem, Variable};
use nalgebra::{DMatrix, DVector};
use std::collections::HashMap;
use std::ops::Index;

/// Relative residual accepted from a direct solve before the system is treated as singular
const RESIDUAL_TOLERANCE: f64 = 1e-6;

//##################################################################################
//                              LINEAR EQUATION SYSTEMS
//##################################################################################

/// A square system `A x = b` assembled from (row, column, value) triplets. Repeated triplets
/// for the same cell are summed, which is how the value function evaluation accumulates the
/// contributions of different (action, observation) paths to the same successor unknown.
#[derive(Debug, Clone)]
pub struct SparseSystem {
    size: usize,
    entries: HashMap<(usize, usize), f64>,
    rhs: Vec<f64>,
}

impl SparseSystem {
    pub fn new(size: usize) -> SparseSystem {
        SparseSystem {
            size,
            entries: HashMap::new(),
            rhs: vec![0.; size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Adds `value` to the coefficient at (row, col). `None` if the cell is outside the system.
    pub fn add(&mut self, row: usize, col: usize, value: f64) -> Option<()> {
        if row >= self.size || col >= self.size {
            return None;
        }
        *self.entries.entry((row, col)).or_insert(0.) += value;
        Some(())
    }

    pub fn set_rhs(&mut self, row: usize, value: f64) -> Option<()> {
        *self.rhs.get_mut(row)? = value;
        Some(())
    }

    /// Writes a whole equation at once. Nothing is written if any cell is outside the system.
    pub fn add_row<I>(&mut self, row: usize, coefficients: I, rhs: f64) -> Option<()>
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        let coefficients: Vec<(usize, f64)> = coefficients.into_iter().collect();
        if row >= self.size || coefficients.iter().any(|(col, _)| *col >= self.size) {
            return None;
        }
        for (col, value) in coefficients {
            self.add(row, col, value)?;
        }
        self.set_rhs(row, rhs)
    }

    pub fn coefficient(&self, row: usize, col: usize) -> f64 {
        self.entries.get(&(row, col)).copied().unwrap_or(0.)
    }

    pub fn rhs(&self) -> &[f64] {
        &self.rhs[..]
    }

    /// Number of stored (possibly zero valued) cells
    pub fn non_zeros(&self) -> usize {
        self.entries.len()
    }

    pub fn to_dense(&self) -> (DMatrix<f64>, DVector<f64>) {
        let mut matrix = DMatrix::<f64>::zeros(self.size, self.size);
        for ((row, col), value) in self.entries.iter() {
            matrix[(*row, *col)] += *value;
        }
        (matrix, DVector::from_column_slice(&self.rhs))
    }
}

/// Capability to solve `matrix · x = rhs`. Implementations must return `None` rather than a
/// garbage vector when the system is singular.
pub trait LinearEquationSolver {
    fn solve(&self, matrix: &DMatrix<f64>, rhs: &DVector<f64>) -> Option<DVector<f64>>;

    fn solve_system(&self, system: &SparseSystem) -> Option<DVector<f64>> {
        let (matrix, rhs) = system.to_dense();
        self.solve(&matrix, &rhs)
    }
}

/// Dense LU decomposition with partial pivoting
#[derive(Debug, Default, Clone, Copy)]
pub struct LuSolver;

impl LinearEquationSolver for LuSolver {
    fn solve(&self, matrix: &DMatrix<f64>, rhs: &DVector<f64>) -> Option<DVector<f64>> {
        let n = matrix.nrows();
        if n != matrix.ncols() || n != rhs.len() {
            tracing::debug!(rows = n, cols = matrix.ncols(), rhs = rhs.len(), "rejecting non-square system");
            return None;
        }
        if n == 0 {
            return Some(DVector::zeros(0));
        }
        let lu = matrix.clone().lu();
        if !lu.is_invertible() {
            tracing::debug!(size = n, "equation system is singular");
            return None;
        }
        let x = lu.solve(rhs)?;
        if x.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let residual = (matrix * &x - rhs).amax();
        let scale = 1. + rhs.amax().max(x.amax());
        if residual > RESIDUAL_TOLERANCE * scale {
            tracing::debug!(size = n, residual, "equation system is numerically singular");
            return None;
        }
        Some(x)
    }
}

//##################################################################################
//                                LINEAR PROGRAMS
//##################################################################################

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Relation {
    Le,
    Ge,
    Eq,
}

/// Handle to a variable of a [`LinearProgram`]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct VarId(usize);

#[derive(Debug, Clone)]
struct Constraint {
    terms: Vec<(VarId, f64)>,
    relation: Relation,
    rhs: f64,
}

/// Solver independent description of a linear program
#[derive(Debug, Clone)]
pub struct LinearProgram {
    maximize: bool,
    objective: Vec<f64>,
    bounds: Vec<(f64, f64)>,
    constraints: Vec<Constraint>,
}

impl LinearProgram {
    pub fn maximize() -> LinearProgram {
        LinearProgram {
            maximize: true,
            objective: Vec::new(),
            bounds: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn minimize() -> LinearProgram {
        LinearProgram {
            maximize: false,
            ..LinearProgram::maximize()
        }
    }

    /// Adds a variable with an objective coefficient and (lower, upper) bounds, infinite bounds
    /// give a free variable
    pub fn add_var(&mut self, objective: f64, bounds: (f64, f64)) -> VarId {
        self.objective.push(objective);
        self.bounds.push(bounds);
        VarId(self.objective.len() - 1)
    }

    pub fn add_constraint<I>(&mut self, terms: I, relation: Relation, rhs: f64)
    where
        I: IntoIterator<Item = (VarId, f64)>,
    {
        self.constraints.push(Constraint {
            terms: terms.into_iter().collect(),
            relation,
            rhs,
        });
    }

    pub fn num_vars(&self) -> usize {
        self.objective.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }
}

/// Optimal variable assignment of a solved [`LinearProgram`]
#[derive(Debug, Clone)]
pub struct Assignment {
    values: Vec<f64>,
    objective: f64,
}

impl Assignment {
    pub fn objective(&self) -> f64 {
        self.objective
    }

    pub fn values(&self) -> &[f64] {
        &self.values[..]
    }
}

impl Index<VarId> for Assignment {
    type Output = f64;

    fn index(&self, var: VarId) -> &f64 {
        &self.values[var.0]
    }
}

/// Capability to optimise a linear program, `None` when it is infeasible or unbounded
pub trait LinearProgramSolver {
    fn solve(&self, program: &LinearProgram) -> Option<Assignment>;
}

/// Primal/dual simplex from `minilp`
#[derive(Debug, Default, Clone, Copy)]
pub struct SimplexSolver;

impl LinearProgramSolver for SimplexSolver {
    fn solve(&self, program: &LinearProgram) -> Option<Assignment> {
        let direction = if program.maximize {
            OptimizationDirection::Maximize
        } else {
            OptimizationDirection::Minimize
        };
        let mut problem = Problem::new(direction);
        let vars: Vec<Variable> = program.objective.iter().zip(program.bounds.iter())
            .map(|(c, bounds)| problem.add_var(*c, *bounds))
            .collect();
        for constraint in program.constraints.iter() {
            let mut lhs = LinearExpr::empty();
            for (var, coeff) in constraint.terms.iter() {
                lhs.add(vars[var.0], *coeff);
            }
            let op = match constraint.relation {
                Relation::Le => ComparisonOp::Le,
                Relation::Ge => ComparisonOp::Ge,
                Relation::Eq => ComparisonOp::Eq,
            };
            problem.add_constraint(lhs, op, constraint.rhs);
        }
        match problem.solve() {
            Ok(solution) => Some(Assignment {
                values: vars.iter().map(|v| solution[*v]).collect(),
                objective: solution.objective(),
            }),
            Err(e) => {
                tracing::trace!(error = %e, vars = program.num_vars(), constraints = program.num_constraints(), "linear program has no optimum");
                None
            }
        }
    }
}
