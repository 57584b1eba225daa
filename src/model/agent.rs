use crate::error::ModelError;
use crate::model::controller::FiniteStateController;
use crate::model::distribution::Distribution;
use crate::model::symbols::{Action, Alphabet, Node, Observation};
use petgraph::dot::Dot;
use petgraph::graph::{Graph, NodeIndex};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// An agent of the Dec-POMDP: its action and observation alphabets and the finite state
/// controller representing its current policy.
#[derive(Debug, Clone)]
pub struct Agent {
    name: Arc<str>,
    actions: Alphabet<Action>,
    observations: Alphabet<Observation>,
    controller: FiniteStateController,
}

/// Serialisable view of a controller with every symbol replaced by its name
#[derive(Debug, Clone, Serialize)]
pub struct ControllerSnapshot {
    pub agent: String,
    pub nodes: Vec<NodeSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub name: String,
    pub actions: BTreeMap<String, f64>,
    pub transitions: Vec<TransitionSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransitionSnapshot {
    pub action: String,
    pub observation: String,
    pub successors: BTreeMap<String, f64>,
}

impl Agent {
    /// Builds an agent, checking that its controller is complete: every node selects actions
    /// of this agent and has a transition for each (selectable action, observation) pair.
    pub fn new(name: &str, actions: Alphabet<Action>, observations: Alphabet<Observation>, controller: FiniteStateController)
        -> Result<Agent, ModelError> {
        if actions.is_empty() {
            return Err(ModelError::Empty("action"));
        }
        if observations.is_empty() {
            return Err(ModelError::Empty("observation"));
        }
        if controller.is_empty() {
            return Err(ModelError::Empty("controller node"));
        }
        let agent = Agent {
            name: Arc::from(name),
            actions,
            observations,
            controller,
        };
        agent.validate_controller()?;
        Ok(agent)
    }

    /// An agent whose controller is a single node drawing from `initial` forever
    pub fn with_single_node<S: AsRef<str>>(name: &str, action_names: &[S], observation_names: &[S], initial: &[(S, f64)])
        -> Result<Agent, ModelError> {
        let actions: Alphabet<Action> = Alphabet::from_names(action_names.iter().map(|a| a.as_ref()))?;
        let observations: Alphabet<Observation> = Alphabet::from_names(observation_names.iter().map(|o| o.as_ref()))?;
        let selection = Distribution::new(initial.iter()
            .map(|(a, p)| actions.get(a.as_ref()).map(|a| (a, *p)))
            .collect::<Result<Vec<_>, _>>()?)?;
        let mut controller = FiniteStateController::new(name);
        let selectable: Vec<Action> = selection.support().copied().collect();
        let obs: Vec<Observation> = observations.iter().collect();
        controller.add_node(selection, |node| {
            selectable.iter()
                .flat_map(|a| obs.iter().map(move |o| ((*a, *o), Distribution::single(node))))
                .collect()
        })?;
        Agent::new(name, actions, observations, controller)
    }

    fn validate_controller(&self) -> Result<(), ModelError> {
        for node in self.controller.nodes() {
            let selection = self.controller.action_selection(node)
                .ok_or_else(|| ModelError::Undefined { function: "action selection", context: self.controller.node_name(node) })?;
            for a in selection.support() {
                if !self.actions.contains(*a) {
                    return Err(ModelError::UnknownSymbol { kind: "action", name: format!("#{} of {}", a.0, self.name) });
                }
                for o in self.observations.iter() {
                    if self.controller.transition(node, *a, o).is_none() {
                        return Err(ModelError::Undefined {
                            function: "node transition",
                            context: format!("({}, {}, {})", self.controller.node_name(node), self.actions.name(*a), self.observations.name(o)),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn actions(&self) -> &Alphabet<Action> {
        &self.actions
    }

    pub fn observations(&self) -> &Alphabet<Observation> {
        &self.observations
    }

    pub fn controller(&self) -> &FiniteStateController {
        &self.controller
    }

    pub(crate) fn controller_mut(&mut self) -> &mut FiniteStateController {
        &mut self.controller
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.controller.node_list()
    }

    pub fn action_probability(&self, node: Node, action: Action) -> f64 {
        self.controller.action_probability(node, action)
    }

    pub fn node_transition_probability(&self, node: Node, action: Action, observation: Observation, next: Node) -> f64 {
        self.controller.node_transition_probability(node, action, observation, next)
    }

    /// Prunes one node, see [`FiniteStateController::prune_all`]
    pub fn prune_node(&mut self, node: Node, replacement: &Distribution<Node>) -> Result<usize, ModelError> {
        self.controller.prune(node, replacement)
    }

    pub fn prune_nodes(&mut self, replacements: &BTreeMap<Node, Distribution<Node>>) -> Result<usize, ModelError> {
        self.controller.prune_all(replacements)
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        let nodes = self.controller.nodes().map(|node| {
            let mut actions = BTreeMap::new();
            let mut transitions = Vec::new();
            if let Some(selection) = self.controller.action_selection(node) {
                for (a, p) in selection.iter() {
                    actions.insert(self.actions.name(*a).to_string(), p);
                    for o in self.observations.iter() {
                        if let Some(successors) = self.controller.transition(node, *a, o) {
                            transitions.push(TransitionSnapshot {
                                action: self.actions.name(*a).to_string(),
                                observation: self.observations.name(o).to_string(),
                                successors: successors.iter().map(|(q, p)| (self.controller.node_name(*q), p)).collect(),
                            });
                        }
                    }
                }
            }
            NodeSnapshot {
                name: self.controller.node_name(node),
                actions,
                transitions,
            }
        }).collect();
        ControllerSnapshot {
            agent: self.name.to_string(),
            nodes,
        }
    }

    /// Renders the controller as a graphviz digraph, nodes labelled with their action
    /// distribution and edges with `action/observation: probability`
    pub fn to_dot(&self) -> String {
        let mut graph: Graph<String, String> = Graph::new();
        let mut index: HashMap<Node, NodeIndex> = HashMap::new();
        for node in self.controller.nodes() {
            let label = match self.controller.action_selection(node) {
                Some(selection) => {
                    let acts: Vec<String> = selection.iter()
                        .map(|(a, p)| format!("{}:{:.2}", self.actions.name(*a), p))
                        .collect();
                    format!("{} [{}]", self.controller.node_name(node), acts.join(", "))
                }
                None => self.controller.node_name(node),
            };
            index.insert(node, graph.add_node(label));
        }
        for node in self.controller.nodes() {
            let selection = match self.controller.action_selection(node) {
                Some(s) => s,
                None => continue,
            };
            for a in selection.support() {
                for o in self.observations.iter() {
                    if let Some(successors) = self.controller.transition(node, *a, o) {
                        for (next, p) in successors.iter() {
                            if let (Some(from), Some(to)) = (index.get(&node), index.get(next)) {
                                let label = format!("{}/{}: {:.2}", self.actions.name(*a), self.observations.name(o), p);
                                graph.add_edge(*from, *to, label);
                            }
                        }
                    }
                }
            }
        }
        format!("{}", Dot::new(&graph))
    }
}
