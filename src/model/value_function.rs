use crate::model::symbols::{Node, State, Symbol};
use crate::model::vector::Vector;
use ndarray::Array1;
use std::collections::HashMap;

/// Joint value function V(s, q⃗): for every node combination a dense row over states.
///
/// Unset entries are NaN internally and reported as `None`, so an unresolved value can never
/// pass for a legitimate zero.
#[derive(Debug, Clone, Default)]
pub struct ValueFunction {
    num_states: usize,
    table: HashMap<Vector<Node>, Array1<f64>>,
}

impl ValueFunction {
    pub fn new(num_states: usize) -> ValueFunction {
        ValueFunction {
            num_states,
            table: HashMap::new(),
        }
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn get(&self, state: State, nodes: &Vector<Node>) -> Option<f64> {
        self.table.get(nodes)
            .and_then(|row| row.get(state.index()).copied())
            .filter(|v| !v.is_nan())
    }

    pub fn has_value(&self, state: State, nodes: &Vector<Node>) -> bool {
        self.get(state, nodes).is_some()
    }

    /// True when every state has a value for `nodes`
    pub fn has_row(&self, nodes: &Vector<Node>) -> bool {
        self.table.get(nodes).map(|row| row.iter().all(|v| !v.is_nan())).unwrap_or(false)
    }

    pub fn row(&self, nodes: &Vector<Node>) -> Option<&Array1<f64>> {
        self.table.get(nodes)
    }

    pub fn set(&mut self, state: State, nodes: &Vector<Node>, value: f64) {
        let num_states = self.num_states;
        let row = self.table.entry(nodes.clone()).or_insert_with(|| Array1::from_elem(num_states, f64::NAN));
        row[state.index()] = value;
    }

    pub fn insert_row(&mut self, nodes: Vector<Node>, values: Array1<f64>) {
        debug_assert_eq!(values.len(), self.num_states);
        self.table.insert(nodes, values);
    }

    /// Adds a batch of rows in one go
    pub fn extend<I>(&mut self, rows: I)
    where
        I: IntoIterator<Item = (Vector<Node>, Array1<f64>)>,
    {
        self.table.extend(rows);
    }

    /// Drops every value and installs `rows` instead
    pub fn replace_all<I>(&mut self, rows: I)
    where
        I: IntoIterator<Item = (Vector<Node>, Array1<f64>)>,
    {
        self.table = rows.into_iter().collect();
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Keeps only the rows whose node combination satisfies `keep`
    pub fn retain<F: FnMut(&Vector<Node>) -> bool>(&mut self, mut keep: F) {
        self.table.retain(|nodes, _| keep(nodes));
    }

    /// Number of node combinations with a row
    pub fn combinations(&self) -> usize {
        self.table.len()
    }

    /// Number of (state, node combination) pairs holding a value
    pub fn len(&self) -> usize {
        self.table.values().map(|row| row.iter().filter(|v| !v.is_nan()).count()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Σ_s b(s) V(s, q⃗), `None` if a state with positive belief has no value
    pub fn value_at(&self, belief: &Array1<f64>, nodes: &Vector<Node>) -> Option<f64> {
        let row = self.table.get(nodes)?;
        let mut total = 0.;
        for (b, v) in belief.iter().zip(row.iter()) {
            if *b > 0. {
                if v.is_nan() {
                    return None;
                }
                total += b * v;
            }
        }
        Some(total)
    }
}
