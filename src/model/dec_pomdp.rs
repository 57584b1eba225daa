use crate::error::{ModelError, SolverError};
use crate::model::agent::Agent;
use crate::model::distribution::Distribution;
use crate::model::symbols::{Action, Alphabet, Node, Observation, State, Symbol};
use crate::model::value_function::ValueFunction;
use crate::model::vector::Vector;
use itertools::Itertools;
use ndarray::{Array1, Array2};
use std::collections::HashMap;

/// Two joint values closer than this are considered equal when searching for a maximum
pub const TIE_TOLERANCE: f64 = 1e-9;

//#########################################################################################
//                              MODEL CAPABILITIES
//#########################################################################################

/// State transition function T(s, a⃗) -> Distribution over successor states
pub trait TransitionModel {
    fn transition(&self, state: State, actions: &Vector<Action>) -> Option<Distribution<State>>;
}

/// Reward function R(s, a⃗)
pub trait RewardModel {
    fn reward(&self, state: State, actions: &Vector<Action>) -> Option<f64>;
}

/// Observation function O(a⃗, s') -> Distribution over joint observations
pub trait ObservationModel {
    fn observation(&self, actions: &Vector<Action>, next: State) -> Option<Distribution<Vector<Observation>>>;
}

impl<F> TransitionModel for F where F: Fn(State, &Vector<Action>) -> Option<Distribution<State>> {
    fn transition(&self, state: State, actions: &Vector<Action>) -> Option<Distribution<State>> {
        self(state, actions)
    }
}

impl<F> RewardModel for F where F: Fn(State, &Vector<Action>) -> Option<f64> {
    fn reward(&self, state: State, actions: &Vector<Action>) -> Option<f64> {
        self(state, actions)
    }
}

impl<F> ObservationModel for F where F: Fn(&Vector<Action>, State) -> Option<Distribution<Vector<Observation>>> {
    fn observation(&self, actions: &Vector<Action>, next: State) -> Option<Distribution<Vector<Observation>>> {
        self(actions, next)
    }
}

/// Model functions stored as explicit tables, any entry not set is undefined
#[derive(Debug, Clone, Default)]
pub struct TabularModel {
    transitions: HashMap<(State, Vector<Action>), Distribution<State>>,
    rewards: HashMap<(State, Vector<Action>), f64>,
    observations: HashMap<(Vector<Action>, State), Distribution<Vector<Observation>>>,
}

impl TabularModel {
    pub fn new() -> TabularModel {
        TabularModel::default()
    }

    pub fn set_transition(&mut self, state: State, actions: Vector<Action>, successors: Distribution<State>) {
        self.transitions.insert((state, actions), successors);
    }

    pub fn set_reward(&mut self, state: State, actions: Vector<Action>, reward: f64) {
        self.rewards.insert((state, actions), reward);
    }

    pub fn set_observation(&mut self, actions: Vector<Action>, next: State, observations: Distribution<Vector<Observation>>) {
        self.observations.insert((actions, next), observations);
    }
}

impl TransitionModel for TabularModel {
    fn transition(&self, state: State, actions: &Vector<Action>) -> Option<Distribution<State>> {
        self.transitions.get(&(state, actions.clone())).cloned()
    }
}

impl RewardModel for TabularModel {
    fn reward(&self, state: State, actions: &Vector<Action>) -> Option<f64> {
        self.rewards.get(&(state, actions.clone())).copied()
    }
}

impl ObservationModel for TabularModel {
    fn observation(&self, actions: &Vector<Action>, next: State) -> Option<Distribution<Vector<Observation>>> {
        self.observations.get(&(actions.clone(), next)).cloned()
    }
}

//#########################################################################################
//                              DEC-POMDP WITH CONTROLLERS
//#########################################################################################

/// A Dec-POMDP together with the controllers of its agents and their joint value function.
///
/// The model functions are queried once at construction and kept as dense tables indexed by
/// state and joint action index. Joint actions are enumerated in the order of
/// `multi_cartesian_product` over the agents' action alphabets, the last agent varying fastest.
#[derive(Clone)]
pub struct DecPomdp {
    agents: Vec<Agent>,
    states: Alphabet<State>,
    discount: f64,
    initial_belief: Distribution<State>,
    joint_actions: Vec<Vector<Action>>,
    action_strides: Vec<usize>,
    /// [s * |A⃗| + a⃗]
    transitions: Vec<Distribution<State>>,
    /// (s, a⃗)
    rewards: Array2<f64>,
    /// [a⃗ * |S| + s']
    observations: Vec<Distribution<Vector<Observation>>>,
    value_function: ValueFunction,
}

fn joint_name<T: Symbol>(names: impl Fn(usize, T) -> String, joint: &Vector<T>) -> String {
    let parts: Vec<String> = joint.iter().enumerate().map(|(i, t)| names(i, *t)).collect();
    format!("<{}>", parts.join(", "))
}

impl DecPomdp {
    /// Builds the joint model, checking once that the discount factor is in [0, 1], that every
    /// model function is defined for all arguments and that every joint observation carries one
    /// observation per agent.
    pub fn new(
        agents: Vec<Agent>,
        states: Alphabet<State>,
        discount: f64,
        initial_belief: Distribution<State>,
        transition: &dyn TransitionModel,
        reward: &dyn RewardModel,
        observation: &dyn ObservationModel,
    ) -> Result<DecPomdp, ModelError> {
        if !(0. ..=1.).contains(&discount) {
            return Err(ModelError::InvalidDiscount(discount));
        }
        if agents.is_empty() {
            return Err(ModelError::Empty("agent"));
        }
        if states.is_empty() {
            return Err(ModelError::Empty("state"));
        }
        if let Some(s) = initial_belief.support().find(|s| !states.contains(**s)) {
            return Err(ModelError::UnknownSymbol { kind: State::KIND, name: format!("#{}", s.0) });
        }

        let joint_actions: Vec<Vector<Action>> = agents.iter()
            .map(|agent| agent.actions().iter().collect::<Vec<Action>>())
            .multi_cartesian_product()
            .map(Vector::new)
            .collect();
        let mut action_strides = vec![1; agents.len()];
        for i in (0..agents.len() - 1).rev() {
            action_strides[i] = action_strides[i + 1] * agents[i + 1].actions().len();
        }

        let action_name = |i: usize, a: Action| agents[i].actions().name(a).to_string();
        let num_states = states.len();
        let mut transitions = Vec::with_capacity(num_states * joint_actions.len());
        let mut rewards: Array2<f64> = Array2::zeros((num_states, joint_actions.len()));
        for s in states.iter() {
            for (ja, actions) in joint_actions.iter().enumerate() {
                let context = || format!("({}, {})", states.name(s), joint_name(action_name, actions));
                let successors = transition.transition(s, actions)
                    .ok_or_else(|| ModelError::Undefined { function: "transition", context: context() })?;
                if let Some(t) = successors.support().find(|t| !states.contains(**t)) {
                    return Err(ModelError::UnknownSymbol { kind: State::KIND, name: format!("#{}", t.0) });
                }
                transitions.push(successors);
                let r = reward.reward(s, actions)
                    .filter(|r| r.is_finite())
                    .ok_or_else(|| ModelError::Undefined { function: "reward", context: context() })?;
                rewards[[s.index(), ja]] = r;
            }
        }

        let mut observations = Vec::with_capacity(joint_actions.len() * num_states);
        for actions in joint_actions.iter() {
            for next in states.iter() {
                let joint_obs = observation.observation(actions, next)
                    .ok_or_else(|| ModelError::Undefined {
                        function: "observation",
                        context: format!("({}, {})", joint_name(action_name, actions), states.name(next)),
                    })?;
                for o in joint_obs.support() {
                    o.check_len(agents.len())?;
                    if let Some((i, obs)) = o.iter().enumerate().find(|(i, obs)| !agents[*i].observations().contains(**obs)) {
                        return Err(ModelError::UnknownSymbol {
                            kind: Observation::KIND,
                            name: format!("#{} of {}", obs.0, agents[i].name()),
                        });
                    }
                }
                observations.push(joint_obs);
            }
        }

        Ok(DecPomdp {
            agents,
            states,
            discount,
            initial_belief,
            joint_actions,
            action_strides,
            transitions,
            rewards,
            observations,
            value_function: ValueFunction::new(num_states),
        })
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, agent: usize) -> Option<&Agent> {
        self.agents.get(agent)
    }

    pub(crate) fn agent_mut(&mut self, agent: usize) -> Option<&mut Agent> {
        self.agents.get_mut(agent)
    }

    pub(crate) fn agents_mut(&mut self) -> &mut [Agent] {
        &mut self.agents
    }

    pub fn num_agents(&self) -> usize {
        self.agents.len()
    }

    pub fn states(&self) -> &Alphabet<State> {
        &self.states
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn discount(&self) -> f64 {
        self.discount
    }

    pub fn initial_belief(&self) -> &Distribution<State> {
        &self.initial_belief
    }

    pub fn joint_actions(&self) -> &[Vector<Action>] {
        &self.joint_actions
    }

    /// Position of a joint action in [`DecPomdp::joint_actions`]
    pub fn joint_action_index(&self, actions: &Vector<Action>) -> Result<usize, ModelError> {
        actions.check_len(self.agents.len())?;
        let mut ix = 0;
        for (i, a) in actions.iter().enumerate() {
            if !self.agents[i].actions().contains(*a) {
                return Err(ModelError::UnknownSymbol { kind: Action::KIND, name: format!("#{} of {}", a.0, self.agents[i].name()) });
            }
            ix += a.index() * self.action_strides[i];
        }
        Ok(ix)
    }

    fn check_state(&self, state: State) -> Result<(), ModelError> {
        if !self.states.contains(state) {
            return Err(ModelError::UnknownSymbol { kind: State::KIND, name: format!("#{}", state.0) });
        }
        Ok(())
    }

    pub fn transition(&self, state: State, actions: &Vector<Action>) -> Result<&Distribution<State>, ModelError> {
        self.check_state(state)?;
        let ja = self.joint_action_index(actions)?;
        Ok(self.transition_at(state, ja))
    }

    pub fn reward(&self, state: State, actions: &Vector<Action>) -> Result<f64, ModelError> {
        self.check_state(state)?;
        let ja = self.joint_action_index(actions)?;
        Ok(self.reward_at(state, ja))
    }

    pub fn observation(&self, actions: &Vector<Action>, next: State) -> Result<&Distribution<Vector<Observation>>, ModelError> {
        self.check_state(next)?;
        let ja = self.joint_action_index(actions)?;
        Ok(self.observation_at(ja, next))
    }

    pub(crate) fn transition_at(&self, state: State, ja: usize) -> &Distribution<State> {
        &self.transitions[state.index() * self.joint_actions.len() + ja]
    }

    pub(crate) fn reward_at(&self, state: State, ja: usize) -> f64 {
        self.rewards[[state.index(), ja]]
    }

    pub(crate) fn observation_at(&self, ja: usize, next: State) -> &Distribution<Vector<Observation>> {
        &self.observations[ja * self.states.len() + next.index()]
    }

    /// Smallest and largest immediate reward of the model
    pub fn reward_bounds(&self) -> (f64, f64) {
        self.rewards.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| (lo.min(*r), hi.max(*r)))
    }

    //######################################## CONTROLLERS ########################################

    /// Every combination of the agents' current nodes, in enumeration order
    pub fn node_combinations(&self) -> Vec<Vector<Node>> {
        self.agents.iter()
            .map(|agent| agent.nodes())
            .multi_cartesian_product()
            .map(Vector::new)
            .collect()
    }

    pub fn node_counts(&self) -> Vec<usize> {
        self.agents.iter().map(|agent| agent.controller().len()).collect()
    }

    fn check_nodes(&self, nodes: &Vector<Node>) -> Result<(), ModelError> {
        nodes.check_len(self.agents.len())?;
        for (agent, q) in self.agents.iter().zip(nodes.iter()) {
            if !agent.controller().contains(*q) {
                return Err(ModelError::UnknownNode { agent: agent.name().to_string(), node: agent.controller().node_name(*q) });
            }
        }
        Ok(())
    }

    /// P(a⃗ | q⃗) over the joint actions with positive probability, as (joint action index, probability)
    pub fn joint_action_distribution(&self, nodes: &Vector<Node>) -> Result<Vec<(usize, f64)>, ModelError> {
        self.check_nodes(nodes)?;
        let per_agent: Vec<Vec<(Action, f64)>> = self.agents.iter().zip(nodes.iter())
            .map(|(agent, q)| agent.controller().action_selection(*q)
                .map(|d| d.iter().map(|(a, p)| (*a, p)).collect())
                .ok_or_else(|| ModelError::Undefined { function: "action selection", context: agent.controller().node_name(*q) }))
            .collect::<Result<_, _>>()?;
        Ok(per_agent.into_iter()
            .multi_cartesian_product()
            .map(|choice| {
                let ja: usize = choice.iter().enumerate().map(|(i, (a, _))| a.index() * self.action_strides[i]).sum();
                let p: f64 = choice.iter().map(|(_, p)| p).product();
                (ja, p)
            })
            .collect())
    }

    /// P(q⃗' | q⃗, a⃗, o⃗) over the successor combinations with positive probability
    pub fn joint_node_transition(&self, nodes: &Vector<Node>, actions: &Vector<Action>, observations: &Vector<Observation>)
        -> Result<Vec<(Vector<Node>, f64)>, ModelError> {
        nodes.check_len(self.agents.len())?;
        actions.check_len(self.agents.len())?;
        observations.check_len(self.agents.len())?;
        let per_agent: Vec<Vec<(Node, f64)>> = (0..self.agents.len())
            .map(|i| {
                let controller = self.agents[i].controller();
                controller.transition(nodes[i], actions[i], observations[i])
                    .map(|d| d.iter().map(|(q, p)| (*q, p)).collect())
                    .ok_or_else(|| ModelError::Undefined {
                        function: "node transition",
                        context: format!("({}, {}, {})",
                            controller.node_name(nodes[i]),
                            self.agents[i].actions().name(actions[i]),
                            self.agents[i].observations().name(observations[i])),
                    })
            })
            .collect::<Result<_, _>>()?;
        Ok(per_agent.into_iter()
            .multi_cartesian_product()
            .map(|choice| {
                let p: f64 = choice.iter().map(|(_, p)| p).product();
                (Vector::new(choice.into_iter().map(|(q, _)| q).collect()), p)
            })
            .collect())
    }

    pub fn describe_nodes(&self, nodes: &Vector<Node>) -> String {
        let names: Vec<String> = self.agents.iter().zip(nodes.iter())
            .map(|(agent, q)| agent.controller().node_name(*q))
            .collect();
        format!("<{}>", names.join(", "))
    }

    //######################################## VALUES ########################################

    pub fn value_function(&self) -> &ValueFunction {
        &self.value_function
    }

    pub(crate) fn value_function_mut(&mut self) -> &mut ValueFunction {
        &mut self.value_function
    }

    /// Dense belief vector indexed by state
    pub fn belief_vector(&self, belief: &Distribution<State>) -> Array1<f64> {
        let mut b: Array1<f64> = Array1::zeros(self.states.len());
        for (s, p) in belief.iter() {
            if s.index() < b.len() {
                b[s.index()] = p;
            }
        }
        b
    }

    /// Σ_s b(s) V(s, q⃗) for one node combination
    pub fn value_of(&self, belief: &Array1<f64>, nodes: &Vector<Node>) -> Result<f64, SolverError> {
        self.value_function.value_at(belief, nodes).ok_or_else(|| SolverError::MissingValue {
            state: "belief".to_string(),
            nodes: self.describe_nodes(nodes),
        })
    }

    /// The node combination with the highest value at `belief`. Ties go to the combination
    /// enumerated first.
    pub fn best_combination(&self, belief: &Distribution<State>) -> Result<(Vector<Node>, f64), SolverError> {
        self.best_among(&self.node_combinations(), belief)
    }

    /// [`DecPomdp::best_combination`] restricted to `combinations`
    pub fn best_among(&self, combinations: &[Vector<Node>], belief: &Distribution<State>)
        -> Result<(Vector<Node>, f64), SolverError> {
        let b = self.belief_vector(belief);
        let mut best: Option<(&Vector<Node>, f64)> = None;
        for nodes in combinations.iter() {
            let v = self.value_of(&b, nodes)?;
            match best {
                Some((_, top)) if v <= top + TIE_TOLERANCE => {}
                _ => best = Some((nodes, v)),
            }
        }
        best.map(|(nodes, v)| (nodes.clone(), v))
            .ok_or_else(|| SolverError::IllegalState("no node combinations".to_string()))
    }

    /// Joint value at `belief`: the best value any current node combination achieves
    pub fn value_at(&self, belief: &Distribution<State>) -> Result<f64, SolverError> {
        self.best_combination(belief).map(|(_, v)| v)
    }
}
