use crate::error::ModelError;
use crate::model::distribution::Distribution;
use crate::model::symbols::{Action, Node, Observation};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Stochastic finite state controller of a single agent.
///
/// A node selects an action from its action distribution, and after executing action `a` and
/// observing `o` moves to a successor drawn from the node transition distribution of
/// `(node, a, o)`. Transition entries only exist for actions a node can select.
///
/// Invariant: every node referenced as a key or as a transition target is in the node set.
#[derive(Debug, Clone)]
pub struct FiniteStateController {
    agent: Arc<str>,
    nodes: BTreeSet<Node>,
    next_id: usize,
    action_selection: HashMap<Node, Distribution<Action>>,
    node_transition: HashMap<(Node, Action, Observation), Distribution<Node>>,
}

impl FiniteStateController {
    pub fn new(agent: &str) -> FiniteStateController {
        FiniteStateController {
            agent: Arc::from(agent),
            nodes: BTreeSet::new(),
            next_id: 0,
            action_selection: HashMap::new(),
            node_transition: HashMap::new(),
        }
    }

    /// Adds a node. The closure receives the id of the node being created so that transitions
    /// may loop back onto it, every other target must already be in the controller.
    pub fn add_node<F>(&mut self, actions: Distribution<Action>, transitions: F) -> Result<Node, ModelError>
    where
        F: FnOnce(Node) -> Vec<((Action, Observation), Distribution<Node>)>,
    {
        let node = Node(self.next_id);
        let transitions = transitions(node);
        for (_, successors) in transitions.iter() {
            if let Some(target) = successors.support().find(|q| **q != node && !self.nodes.contains(*q)) {
                return Err(ModelError::UnknownNode { agent: self.agent.to_string(), node: self.node_name(*target) });
            }
        }
        self.next_id += 1;
        self.nodes.insert(node);
        self.action_selection.insert(node, actions);
        for ((a, o), successors) in transitions {
            self.node_transition.insert((node, a, o), successors);
        }
        Ok(node)
    }

    /// Adds a node that always selects `action` and moves to a fixed successor per observation
    pub fn add_deterministic_node(&mut self, action: Action, successors: &[(Observation, Node)]) -> Result<Node, ModelError> {
        let transitions: Vec<((Action, Observation), Distribution<Node>)> = successors.iter()
            .map(|(o, q)| ((action, *o), Distribution::single(*q)))
            .collect();
        self.add_node(Distribution::single(action), move |_| transitions)
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn nodes(&self) -> impl Iterator<Item = Node> + '_ {
        self.nodes.iter().copied()
    }

    pub fn node_list(&self) -> Vec<Node> {
        self.nodes.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: Node) -> bool {
        self.nodes.contains(&node)
    }

    /// `<agent>-Q<id>`
    pub fn node_name(&self, node: Node) -> String {
        format!("{}-{}", self.agent, node)
    }

    pub fn action_selection(&self, node: Node) -> Option<&Distribution<Action>> {
        self.action_selection.get(&node)
    }

    pub fn action_probability(&self, node: Node, action: Action) -> f64 {
        self.action_selection.get(&node).map(|d| d.probability(&action)).unwrap_or(0.)
    }

    pub fn transition(&self, node: Node, action: Action, observation: Observation) -> Option<&Distribution<Node>> {
        self.node_transition.get(&(node, action, observation))
    }

    pub fn node_transition_probability(&self, node: Node, action: Action, observation: Observation, next: Node) -> f64 {
        self.transition(node, action, observation).map(|d| d.probability(&next)).unwrap_or(0.)
    }

    /// Nodes `node` moves to with positive probability after any of its selectable actions
    pub fn successors(&self, node: Node) -> BTreeSet<Node> {
        let mut next = BTreeSet::new();
        if let Some(selection) = self.action_selection.get(&node) {
            for ((q, a, _), successors) in self.node_transition.iter() {
                if *q == node && selection.contains(a) {
                    next.extend(successors.support().copied());
                }
            }
        }
        next
    }

    /// Total probability mass, summed over every transition entry, that flows into `node`
    pub fn incoming_mass(&self, node: Node) -> f64 {
        self.node_transition.values().map(|d| d.probability(&node)).sum()
    }

    /// Removes `node` and resolves every reference to it through `replacement`
    pub fn prune(&mut self, node: Node, replacement: &Distribution<Node>) -> Result<usize, ModelError> {
        let mut replacements = BTreeMap::new();
        replacements.insert(node, replacement.clone());
        self.prune_all(&replacements)
    }

    /// Removes every key of `replacements` at once. Transition entries of surviving nodes that
    /// point at a pruned node get that mass redistributed over its replacement distribution.
    /// Replacements must only reference surviving nodes. Nothing changes when validation fails.
    /// Returns the number of rewritten transition entries.
    pub fn prune_all(&mut self, replacements: &BTreeMap<Node, Distribution<Node>>) -> Result<usize, ModelError> {
        for (node, replacement) in replacements.iter() {
            if !self.nodes.contains(node) {
                return Err(ModelError::UnknownNode { agent: self.agent.to_string(), node: self.node_name(*node) });
            }
            if replacement.support().any(|q| replacements.contains_key(q)) {
                return Err(ModelError::InvalidReplacement { node: self.node_name(*node), reason: "replacement references a pruned node" });
            }
            if replacement.support().any(|q| !self.nodes.contains(q)) {
                return Err(ModelError::InvalidReplacement { node: self.node_name(*node), reason: "replacement references an unknown node" });
            }
        }
        if replacements.is_empty() {
            return Ok(0);
        }

        let mut rewritten: usize = 0;
        let node_transition: HashMap<(Node, Action, Observation), Distribution<Node>> = self.node_transition.iter()
            .filter(|((q, _, _), _)| !replacements.contains_key(q))
            .map(|(key, successors)| {
                let mut successors = successors.clone();
                let mut touched = false;
                for (pruned, replacement) in replacements.iter() {
                    if successors.contains(pruned) {
                        successors = successors.replace(pruned, replacement);
                        touched = true;
                    }
                }
                if touched {
                    rewritten += 1;
                }
                (*key, successors)
            })
            .collect();

        self.node_transition = node_transition;
        self.action_selection.retain(|q, _| !replacements.contains_key(q));
        self.nodes.retain(|q| !replacements.contains_key(q));
        Ok(rewritten)
    }
}
