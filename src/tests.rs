use crate::config::SolverConfig;
use crate::error::{ModelError, SolverError};
use crate::model::{Action, Agent, Alphabet, DecPomdp, DistanceNorm, Distribution, FiniteStateController, Node,
                   Observation, State, Vector};
use crate::policy_iteration::belief_points::BeliefPoints;
use crate::policy_iteration::evaluation::ValueFunctionEvaluater;
use crate::problems::dec_tiger;
use ndarray::Array1;

const EPS: f64 = 1e-6;

fn assert_close(a: f64, b: f64, tol: f64) {
    assert!((a - b).abs() <= tol, "{} and {} differ by more than {}", a, b, tol);
}

/// Single agent, single state model that collects `reward` forever
fn self_loop_model(discount: f64, reward: f64) -> DecPomdp {
    let agent = Agent::with_single_node("solo", &["go"], &["ping"], &[("go", 1.)]).unwrap();
    let ping = agent.observations().get("ping").unwrap();
    let states: Alphabet<State> = Alphabet::from_names(["here"]).unwrap();
    let here = states.get("here").unwrap();
    let transition = |s: State, _: &Vector<Action>| -> Option<Distribution<State>> { Some(Distribution::single(s)) };
    let reward_fn = move |_: State, _: &Vector<Action>| -> Option<f64> { Some(reward) };
    let observation = move |_: &Vector<Action>, _: State| -> Option<Distribution<Vector<Observation>>> {
        Some(Distribution::single(Vector::new(vec![ping])))
    };
    DecPomdp::new(vec![agent], states, discount, Distribution::single(here), &transition, &reward_fn, &observation).unwrap()
}

/// Every transition of every node only references nodes of the controller
fn controller_is_closed(controller: &FiniteStateController, actions: &[Action], observations: &[Observation]) -> bool {
    controller.nodes().all(|q| {
        actions.iter().all(|a| observations.iter().all(|o| {
            controller.transition(q, *a, *o)
                .map(|d| d.support().all(|next| controller.contains(*next)))
                .unwrap_or(true)
        }))
    })
}

fn evaluated_tiger() -> DecPomdp {
    let mut model = dec_tiger::dec_tiger().unwrap();
    ValueFunctionEvaluater::new().evaluate(&mut model).unwrap();
    model
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy_iteration::backup::{backup_size, exhaustive_backup};
    use crate::policy_iteration::belief_points::BeliefPointGenerator;
    use crate::policy_iteration::pruning::CombinatorialNodePruner;
    use crate::policy_iteration::retention::retain_dominating_nodes;
    use crate::policy_iteration::solver::{resolve_policies, HeuristicPolicyIteration, Phase, Termination};
    use crate::problems::{random_dec_pomdp, RandomModelSpec};

    //######################################## MODEL ########################################

    #[test]
    /// Distributions must be non-negative and sum to one
    fn distribution_validation() {
        assert!(matches!(Distribution::new(vec![(0, 0.5), (1, 0.6)]), Err(ModelError::NotNormalized { .. })));
        assert!(matches!(Distribution::new(vec![(0, -0.5), (1, 1.5)]), Err(ModelError::InvalidProbability { .. })));
        assert!(matches!(Distribution::<usize>::new(vec![]), Err(ModelError::EmptyDistribution)));
        assert!(matches!(Distribution::new(vec![(0, f64::NAN)]), Err(ModelError::InvalidProbability { .. })));
    }

    #[test]
    /// Repeated keys are merged, zero entries dropped and keys sorted
    fn distribution_canonical_form() {
        let d = Distribution::new(vec![(2, 0.25), (1, 0.5), (2, 0.25), (3, 0.)]).unwrap();
        assert_eq!(d.support().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_close(d.probability(&2), 0.5, 1e-12);
        assert_eq!(d.probability(&3), 0.);
        assert_close(d.total(), 1., 1e-9);
        let u = Distribution::uniform(0..4).unwrap();
        assert_close(u.probability(&3), 0.25, 1e-12);
    }

    #[test]
    /// Closeness is symmetric and zero for identical distributions
    fn distribution_distance() {
        let a = Distribution::new(vec![(0, 0.5), (1, 0.5)]).unwrap();
        let b = Distribution::new(vec![(0, 0.6), (1, 0.4)]).unwrap();
        let c = Distribution::single(2);
        assert_eq!(a.distance(&a, DistanceNorm::L1), 0.);
        assert_close(a.distance(&b, DistanceNorm::L1), 0.2, 1e-12);
        assert_close(a.distance(&b, DistanceNorm::Linf), 0.1, 1e-12);
        assert_close(a.distance(&c, DistanceNorm::L1), 2., 1e-12);
        assert_eq!(a.distance(&b, DistanceNorm::L1), b.distance(&a, DistanceNorm::L1));
        assert_eq!(a.close_to(&b, 0.15, DistanceNorm::L1), b.close_to(&a, 0.15, DistanceNorm::L1));
        assert!(!a.close_to(&b, 0.15, DistanceNorm::L1));
        assert!(a.close_to(&b, 0.15, DistanceNorm::Linf));
        assert!(a.close_to(&a, 0., DistanceNorm::L1));
    }

    #[test]
    /// Replacing a key spreads its mass over the replacement
    fn distribution_replace() {
        let d = Distribution::new(vec![(0, 0.5), (1, 0.5)]).unwrap();
        let r = Distribution::new(vec![(1, 0.5), (2, 0.5)]).unwrap();
        let replaced = d.replace(&0, &r);
        assert_close(replaced.probability(&1), 0.75, 1e-12);
        assert_close(replaced.probability(&2), 0.25, 1e-12);
        assert!(!replaced.contains(&0));
        assert_close(replaced.total(), 1., 1e-12);
        assert_eq!(d.replace(&5, &r), d);
    }

    #[test]
    fn alphabets_and_vectors() {
        assert!(matches!(Alphabet::<State>::from_names(["a", "b", "a"]), Err(ModelError::DuplicateSymbol { .. })));
        let alphabet: Alphabet<Action> = Alphabet::from_names(["listen", "open"]).unwrap();
        let open = alphabet.get("open").unwrap();
        assert_eq!(alphabet.name(open), "open");
        assert!(matches!(alphabet.get("jump"), Err(ModelError::UnknownSymbol { .. })));
        assert!(matches!(Vector::with_len(vec![open], 2), Err(ModelError::DimensionMismatch { expected: 2, got: 1 })));
        let v = Vector::new(vec![Node(0), Node(1)]);
        assert_eq!(v.with(1, Node(5)), Vector::new(vec![Node(0), Node(5)]));
        assert_eq!(format!("{}", v), "<Q0, Q1>");
    }

    #[test]
    /// After pruning no entry mentions the pruned node and its incoming mass moved to the
    /// replacement
    fn controller_prune_consistency() {
        let (a, o) = (Action(0), Observation(0));
        let mut controller = FiniteStateController::new("x");
        let q0 = controller.add_node(Distribution::single(a), |q| vec![((a, o), Distribution::single(q))]).unwrap();
        let q1 = controller.add_deterministic_node(a, &[(o, q0)]).unwrap();
        let q2 = controller.add_node(Distribution::single(a), |_| {
            vec![((a, o), Distribution::new(vec![(q0, 0.5), (q1, 0.5)]).unwrap())]
        }).unwrap();
        assert_close(controller.incoming_mass(q0), 2.5, 1e-12);
        assert_eq!(controller.node_name(q2), "x-Q2");

        // a replacement may not reference the node it replaces
        assert!(matches!(controller.prune(q0, &Distribution::single(q0)), Err(ModelError::InvalidReplacement { .. })));
        assert_eq!(controller.len(), 3);

        let rewritten = controller.prune(q0, &Distribution::single(q1)).unwrap();
        assert_eq!(rewritten, 2);
        assert!(!controller.contains(q0));
        assert!(controller.action_selection(q0).is_none());
        assert!(controller.transition(q0, a, o).is_none());
        assert_eq!(controller.incoming_mass(q0), 0.);
        assert_close(controller.incoming_mass(q1), 2., 1e-12);
        assert!(controller_is_closed(&controller, &[a], &[o]));
        assert!(matches!(controller.prune(q0, &Distribution::single(q1)), Err(ModelError::UnknownNode { .. })));
    }

    #[test]
    fn unknown_transition_target_is_rejected() {
        let (a, o) = (Action(0), Observation(0));
        let mut controller = FiniteStateController::new("x");
        assert!(controller.add_deterministic_node(a, &[(o, Node(7))]).is_err());
        assert!(controller.is_empty());
    }

    #[test]
    fn agent_export() {
        let agent = Agent::with_single_node("a", &["listen", "open"], &["left", "right"], &[("listen", 0.8), ("open", 0.2)]).unwrap();
        let snapshot = agent.snapshot();
        assert_eq!(snapshot.nodes.len(), 1);
        assert_eq!(snapshot.nodes[0].name, "a-Q0");
        assert_eq!(snapshot.nodes[0].transitions.len(), 4);
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"listen\":0.8"));
        let dot = agent.to_dot();
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("a-Q0"));
        assert!(Agent::with_single_node("a", &["listen"], &["left"], &[("jump", 1.)]).is_err());
    }

    #[test]
    fn dec_pomdp_validation() {
        let agent = || Agent::with_single_node("solo", &["go"], &["ping"], &[("go", 1.)]).unwrap();
        let states: Alphabet<State> = Alphabet::from_names(["here"]).unwrap();
        let here = states.get("here").unwrap();
        let transition = |s: State, _: &Vector<Action>| -> Option<Distribution<State>> { Some(Distribution::single(s)) };
        let reward = |_: State, _: &Vector<Action>| -> Option<f64> { None };
        let observation = |_: &Vector<Action>, _: State| -> Option<Distribution<Vector<Observation>>> {
            Some(Distribution::single(Vector::new(vec![Observation(0), Observation(0)])))
        };
        let defined = |_: State, _: &Vector<Action>| -> Option<f64> { Some(0.) };
        assert!(matches!(
            DecPomdp::new(vec![agent()], states.clone(), 1.5, Distribution::single(here), &transition, &defined, &observation),
            Err(ModelError::InvalidDiscount(_))));
        assert!(matches!(
            DecPomdp::new(vec![agent()], states.clone(), 0.9, Distribution::single(here), &transition, &reward, &observation),
            Err(ModelError::Undefined { function: "reward", .. })));
        // joint observations carry two entries for a single agent
        assert!(matches!(
            DecPomdp::new(vec![agent()], states, 0.9, Distribution::single(here), &transition, &defined, &observation),
            Err(ModelError::DimensionMismatch { expected: 1, got: 2 })));
    }

    #[test]
    fn dec_tiger_tables() {
        let model = dec_tiger::dec_tiger().unwrap();
        assert_eq!(model.num_agents(), 2);
        assert_eq!(model.joint_actions().len(), 9);
        for (ix, actions) in model.joint_actions().iter().enumerate() {
            assert_eq!(model.joint_action_index(actions).unwrap(), ix);
        }
        let a = model.agents()[0].actions();
        let listen = a.get("listen").unwrap();
        let open_left = a.get("open-left").unwrap();
        let open_right = a.get("open-right").unwrap();
        let tiger_left = model.states().get("tiger-left").unwrap();
        let tiger_right = model.states().get("tiger-right").unwrap();
        assert_eq!(model.reward(tiger_left, &Vector::new(vec![listen, listen])).unwrap(), -2.);
        assert_eq!(model.reward(tiger_left, &Vector::new(vec![open_right, open_right])).unwrap(), 20.);
        assert_eq!(model.reward(tiger_right, &Vector::new(vec![open_right, open_right])).unwrap(), -50.);
        assert_eq!(model.reward(tiger_right, &Vector::new(vec![listen, open_left])).unwrap(), 9.);
        assert_eq!(model.reward(tiger_left, &Vector::new(vec![open_left, open_right])).unwrap(), -100.);
        assert_eq!(model.transition(tiger_left, &Vector::new(vec![listen, listen])).unwrap(), &Distribution::single(tiger_left));
        let obs = model.observation(&Vector::new(vec![listen, listen]), tiger_left).unwrap();
        assert_close(obs.total(), 1., 1e-9);
        let hear_left = model.agents()[0].observations().get("hear-left").unwrap();
        assert_close(obs.probability(&Vector::new(vec![hear_left, hear_left])), 0.85 * 0.85, 1e-12);
        assert!(matches!(model.reward(tiger_left, &Vector::new(vec![listen])), Err(ModelError::DimensionMismatch { .. })));
        assert_eq!(model.reward_bounds(), (-101., 20.));
    }

    #[test]
    fn value_function_has_value() {
        let mut values = crate::model::ValueFunction::new(2);
        let nodes = Vector::new(vec![Node(0)]);
        assert!(!values.has_value(State(0), &nodes));
        values.set(State(1), &nodes, 3.);
        assert_eq!(values.get(State(1), &nodes), Some(3.));
        assert_eq!(values.get(State(0), &nodes), None);
        assert!(!values.has_row(&nodes));
        assert_eq!(values.value_at(&Array1::from(vec![0., 1.]), &nodes), Some(3.));
        assert_eq!(values.value_at(&Array1::from(vec![0.5, 0.5]), &nodes), None);
        assert_eq!(values.len(), 1);
    }

    //######################################## EVALUATION ########################################

    #[test]
    /// Listening forever costs 2 per step
    fn evaluate_listen_forever() {
        let model = evaluated_tiger();
        let nodes = Vector::new(vec![Node(0), Node(0)]);
        for s in model.states().iter() {
            assert_close(model.value_function().get(s, &nodes).unwrap(), -2. / (1. - dec_tiger::DISCOUNT), EPS);
        }
        assert_close(model.value_at(model.initial_belief()).unwrap(), -200., EPS);
    }

    #[test]
    /// Evaluating twice without touching the controllers gives the same values
    fn evaluation_is_idempotent() {
        let evaluater = ValueFunctionEvaluater::new();
        let mut model = random_dec_pomdp(RandomModelSpec::default(), 3).unwrap();
        evaluater.evaluate(&mut model).unwrap();
        exhaustive_backup(&mut model).unwrap();
        evaluater.evaluate(&mut model).unwrap();
        let first = model.value_function().clone();
        evaluater.evaluate(&mut model).unwrap();
        for nodes in model.node_combinations() {
            for s in model.states().iter() {
                assert_close(first.get(s, &nodes).unwrap(), model.value_function().get(s, &nodes).unwrap(), 1e-9);
            }
        }
    }

    #[test]
    /// The exact solution is a fixed point of the Bellman backup used to top up values
    fn top_up_agrees_with_evaluation() {
        let evaluater = ValueFunctionEvaluater::new();
        let mut model = random_dec_pomdp(RandomModelSpec::default(), 11).unwrap();
        evaluater.evaluate(&mut model).unwrap();
        exhaustive_backup(&mut model).unwrap();
        let topped_up = model.value_function().clone();
        evaluater.evaluate(&mut model).unwrap();
        for nodes in model.node_combinations() {
            for s in model.states().iter() {
                assert_close(topped_up.get(s, &nodes).unwrap(), model.value_function().get(s, &nodes).unwrap(), 1e-6);
            }
        }
    }

    #[test]
    /// A zero equation system is reported as unsolvable and leaves no values behind
    fn singular_system_is_unsolvable() {
        let mut model = self_loop_model(1., 1.);
        let result = ValueFunctionEvaluater::new().evaluate(&mut model);
        assert!(matches!(result, Err(SolverError::ValueFunctionUnsolvable { unknowns: 1 })));
        assert!(model.value_function().is_empty());
    }

    #[test]
    fn undiscounted_model_is_rejected() {
        let model = self_loop_model(1., 1.);
        assert!(matches!(HeuristicPolicyIteration::new(model, SolverConfig::default()), Err(SolverError::UndiscountedModel)));
    }

    #[test]
    fn evaluate_reachable_combinations() {
        let mut model = evaluated_tiger();
        exhaustive_backup(&mut model).unwrap();
        let evaluater = ValueFunctionEvaluater::new();
        // Q2 opens the left door and then falls back to listening forever
        evaluater.evaluate_reachable(&mut model, &Vector::new(vec![Node(2), Node(2)])).unwrap();
        assert_eq!(model.value_function().combinations(), 2);
        let root = Vector::new(vec![Node(0), Node(0)]);
        for s in model.states().iter() {
            assert_close(model.value_function().get(s, &root).unwrap(), -200., EPS);
        }
        let opened = model.value_function().value_at(&model.belief_vector(model.initial_belief()), &Vector::new(vec![Node(2), Node(2)])).unwrap();
        assert_close(opened, -15. + dec_tiger::DISCOUNT * -200., EPS);
    }

    //######################################## BACKUP ########################################

    #[test]
    /// |A| n^|O| deterministic nodes are added, all pointing at pre-backup nodes
    fn backup_growth_law() {
        let mut model = evaluated_tiger();
        for expected_before in [1usize, 4] {
            let before: Vec<Vec<Node>> = model.agents().iter().map(|a| a.nodes()).collect();
            let added = exhaustive_backup(&mut model).unwrap();
            for (i, agent) in model.agents().iter().enumerate() {
                assert_eq!(before[i].len(), expected_before);
                assert_eq!(Some(added[i].len()), backup_size(3, 2, expected_before));
                assert_eq!(agent.controller().len(), expected_before + added[i].len());
                for q in added[i].iter() {
                    let selection = agent.controller().action_selection(*q).unwrap();
                    assert_eq!(selection.len(), 1);
                    let a = *selection.support().next().unwrap();
                    for o in agent.observations().iter() {
                        let next = agent.controller().transition(*q, a, o).unwrap();
                        assert_eq!(next.len(), 1);
                        assert!(before[i].contains(next.support().next().unwrap()));
                    }
                }
            }
            assert_eq!(model.value_function().combinations(), model.node_combinations().len());
        }
    }

    #[test]
    /// Backup keeps the old nodes so the value at the initial belief can not drop
    fn backup_does_not_degrade_value() {
        let evaluater = ValueFunctionEvaluater::new();
        for seed in 1..=10 {
            let mut model = random_dec_pomdp(RandomModelSpec::default(), seed).unwrap();
            evaluater.evaluate(&mut model).unwrap();
            let before = model.value_at(model.initial_belief()).unwrap();
            exhaustive_backup(&mut model).unwrap();
            let after = model.value_at(model.initial_belief()).unwrap();
            assert!(after >= before - 1e-9, "seed {}: {} < {}", seed, after, before);
        }
    }

    #[test]
    /// A backup that can not fill in its values leaves the controllers as they were
    fn failed_backup_restores_controllers() {
        let mut model = evaluated_tiger();
        exhaustive_backup(&mut model).unwrap();
        let before: Vec<Vec<Node>> = model.agents().iter().map(|a| a.nodes()).collect();
        // only <Q2, Q2> and what it reaches keep values, <Q0, Q1> has none
        ValueFunctionEvaluater::new().evaluate_reachable(&mut model, &Vector::new(vec![Node(2), Node(2)])).unwrap();
        let result = exhaustive_backup(&mut model);
        assert!(matches!(result, Err(SolverError::MissingValue { .. })));
        assert_eq!(model.node_counts(), vec![4, 4]);
        for (agent, nodes) in model.agents().iter().zip(before.iter()) {
            assert_eq!(&agent.nodes(), nodes);
        }
        assert_eq!(model.value_function().combinations(), 2);
        // the restored controllers back up normally once evaluated
        ValueFunctionEvaluater::new().evaluate(&mut model).unwrap();
        let added = exhaustive_backup(&mut model).unwrap();
        assert_eq!(Some(added[0].len()), backup_size(3, 2, 4));
        assert_eq!(model.node_counts(), vec![52, 52]);
    }

    #[test]
    fn backup_size_overflow_is_detected() {
        assert_eq!(backup_size(3, 2, 4), Some(48));
        assert_eq!(backup_size(3, 0, 7), Some(3));
        assert_eq!(backup_size(3, 64, 2), None);
        assert_eq!(backup_size(usize::MAX, 1, 2), None);
    }

    //######################################## RETENTION AND PRUNING ########################################

    #[test]
    fn empty_belief_points_are_rejected() {
        let mut model = evaluated_tiger();
        let empty = BeliefPoints::new(vec![]);
        assert!(matches!(retain_dominating_nodes(&mut model, &empty), Err(SolverError::IllegalState(_))));
        let pruner = CombinatorialNodePruner::new(1e-9);
        assert!(matches!(pruner.prune(&mut model, 0, &empty), Err(SolverError::IllegalState(_))));
    }

    #[test]
    /// Only the nodes of the best combination at each belief survive
    fn retention_keeps_argmax_nodes() {
        let mut model = evaluated_tiger();
        exhaustive_backup(&mut model).unwrap();
        let beliefs = BeliefPoints::new(vec![model.initial_belief().clone()]);
        let pruned = retain_dominating_nodes(&mut model, &beliefs).unwrap();
        assert_eq!(pruned, vec![3, 3]);
        assert_eq!(model.node_counts(), vec![1, 1]);
        assert_eq!(model.agents()[0].nodes(), vec![Node(0)]);
        assert_eq!(model.value_function().combinations(), 1);
        ValueFunctionEvaluater::new().evaluate(&mut model).unwrap();
        assert_close(model.value_at(model.initial_belief()).unwrap(), -200., EPS);
    }

    #[test]
    /// Retained nodes keep every node they can move to, so their transitions and values survive
    fn retention_keeps_successors_of_argmax_nodes() {
        let evaluater = ValueFunctionEvaluater::new();
        let mut model = evaluated_tiger();
        exhaustive_backup(&mut model).unwrap();
        evaluater.evaluate(&mut model).unwrap();
        exhaustive_backup(&mut model).unwrap();
        let left = model.states().get("tiger-left").unwrap();
        let right = model.states().get("tiger-right").unwrap();
        let beliefs = BeliefPoints::new(vec![
            model.initial_belief().clone(),
            Distribution::new(vec![(left, 0.95), (right, 0.05)]).unwrap(),
            Distribution::new(vec![(left, 0.05), (right, 0.95)]).unwrap(),
        ]);
        let values: Vec<f64> = beliefs.iter().map(|b| model.value_at(b).unwrap()).collect();
        let controllers: Vec<FiniteStateController> = model.agents().iter().map(|a| a.controller().clone()).collect();

        retain_dominating_nodes(&mut model, &beliefs).unwrap();
        for (agent, before) in model.agents().iter().zip(controllers.iter()) {
            let kept = agent.nodes();
            for q in kept.iter() {
                assert!(agent.controller().successors(*q).iter().all(|next| kept.contains(next)));
                let selection = agent.controller().action_selection(*q).unwrap();
                for a in selection.support() {
                    for o in agent.observations().iter() {
                        assert_eq!(agent.controller().transition(*q, *a, o), before.transition(*q, *a, o));
                    }
                }
            }
        }
        evaluater.evaluate(&mut model).unwrap();
        for (b, v) in beliefs.iter().zip(values.iter()) {
            assert_close(model.value_at(b).unwrap(), *v, 1e-6);
        }
        assert!(values[1] > -200. && values[2] > -200.);
    }

    #[test]
    /// With V(s, <a, b>) = u(a) + w(b) the node with the highest u dominates every other node
    fn combinatorial_pruning() {
        let mut model = evaluated_tiger();
        exhaustive_backup(&mut model).unwrap();
        let u = [0., 10., 5., 5.];
        let w = [0., 1., 2., 3.];
        for nodes in model.node_combinations() {
            let v = u[nodes[0].0] + w[nodes[1].0];
            model.value_function_mut().insert_row(nodes, Array1::from(vec![v, v]));
        }
        let beliefs = BeliefPoints::new(vec![model.initial_belief().clone()]);
        let pruner = CombinatorialNodePruner::new(1e-9);
        let pruned = pruner.prune(&mut model, 0, &beliefs).unwrap();
        assert_eq!(pruned, 3);
        assert_eq!(model.agents()[0].nodes(), vec![Node(1)]);
        assert_eq!(model.value_function().combinations(), 4);
        let agent = &model.agents()[0];
        let actions: Vec<Action> = agent.actions().iter().collect();
        let observations: Vec<Observation> = agent.observations().iter().collect();
        assert!(controller_is_closed(agent.controller(), &actions, &observations));
        // Q1 listened and moved to the pruned Q0, it now loops onto itself
        let listen = agent.actions().get("listen").unwrap();
        for o in observations.iter() {
            assert_eq!(agent.controller().transition(Node(1), listen, *o).unwrap(), &Distribution::single(Node(1)));
        }
    }

    #[test]
    fn equal_nodes_are_not_strictly_dominated() {
        let mut model = evaluated_tiger();
        exhaustive_backup(&mut model).unwrap();
        for nodes in model.node_combinations() {
            model.value_function_mut().insert_row(nodes, Array1::from(vec![1., 1.]));
        }
        let beliefs = BeliefPoints::new(vec![model.initial_belief().clone()]);
        let pruned = CombinatorialNodePruner::new(1e-9).prune(&mut model, 1, &beliefs).unwrap();
        assert_eq!(pruned, 0);
        assert_eq!(model.node_counts(), vec![4, 4]);
    }

    //######################################## BELIEF POINTS ########################################

    #[test]
    /// Seeded generation is reproducible, starts at the initial belief and yields distinct points
    fn belief_points_are_reproducible() {
        let model = dec_tiger::dec_tiger().unwrap();
        let policies = resolve_policies(&model, &dec_tiger::initial_policies()).unwrap();
        let config = SolverConfig { belief_point_generation_seed: 7, ..SolverConfig::default() };
        let generator = BeliefPointGenerator::from_config(&config);
        let first = generator.generate(&model, Some(&policies)).unwrap();
        let second = generator.generate(&model, Some(&policies)).unwrap();
        assert_eq!(first, second);
        assert!(first.len() >= 1 && first.len() <= config.number_of_belief_points);
        assert_eq!(&first.points()[0], model.initial_belief());
        for (i, a) in first.iter().enumerate() {
            assert_close(a.total(), 1., 1e-9);
            for b in first.iter().skip(i + 1) {
                assert!(a.distance(b, config.belief_point_distance_norm) > config.belief_point_distance_threshold);
            }
        }
    }

    #[test]
    fn belief_points_without_initial_policies() {
        let model = random_dec_pomdp(RandomModelSpec { states: 3, ..RandomModelSpec::default() }, 5).unwrap();
        let generator = BeliefPointGenerator::new(6, 20, 1e-3, DistanceNorm::Linf, 5);
        let points = generator.generate(&model, None).unwrap();
        assert!(!points.is_empty() && points.len() <= 6);
        assert!(matches!(BeliefPointGenerator::new(0, 20, 1e-3, DistanceNorm::L1, 5).generate(&model, None),
            Err(SolverError::Config(_))));
    }

    //######################################## CONFIGURATION ########################################

    #[test]
    fn config_parsing() {
        let config = SolverConfig::from_json_str(r#"{
            "numberOfBeliefPoints": 5,
            "maxIterations": 3,
            "beliefPointDistanceNorm": "linf",
            "initialPolicies": { "agent1": { "tiger-left": { "listen": 1.0 } } }
        }"#).unwrap();
        assert_eq!(config.number_of_belief_points, 5);
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.belief_point_distance_norm, DistanceNorm::Linf);
        assert_eq!(config.belief_point_generation_max_runs, SolverConfig::default().belief_point_generation_max_runs);
        assert!(config.initial_policies.is_some());

        assert!(matches!(SolverConfig::from_json_str(r#"{ "numberOfBeliefPonts": 5 }"#), Err(SolverError::ConfigParse(_))));
        assert!(matches!(SolverConfig::from_json_str(r#"{ "numberOfBeliefPoints": 0 }"#), Err(SolverError::Config(_))));
        assert!(matches!(SolverConfig::from_json_str(r#"{ "maxIterations": 0, "valueChangeThreshold": 0.0 }"#),
            Err(SolverError::Config(_))));
        assert!(matches!(SolverConfig::from_json_str(r#"{ "dominanceTolerance": -1.0 }"#), Err(SolverError::Config(_))));
    }

    #[test]
    fn initial_policies_resolution() {
        let model = dec_tiger::dec_tiger().unwrap();
        let policies = resolve_policies(&model, &dec_tiger::initial_policies()).unwrap();
        assert_eq!(policies.len(), 2);
        assert_eq!(policies[0].len(), 2);
        let listen = model.agents()[0].actions().get("listen").unwrap();
        assert_close(policies[0][1].probability(&listen), 0.8, 1e-12);

        let mut unknown_agent = dec_tiger::initial_policies();
        let entry = unknown_agent["agent1"].clone();
        unknown_agent.insert("agent3".to_string(), entry);
        let config = SolverConfig::default().with_initial_policies(unknown_agent);
        assert!(matches!(HeuristicPolicyIteration::new(dec_tiger::dec_tiger().unwrap(), config), Err(SolverError::Config(_))));

        let config = SolverConfig::from_json_str(r#"{ "initialPolicies": { "agent1": { "tiger-left": { "dance": 1.0 } } } }"#).unwrap();
        assert!(matches!(HeuristicPolicyIteration::new(dec_tiger::dec_tiger().unwrap(), config), Err(SolverError::Config(_))));
    }

    //######################################## SOLVER ########################################

    #[test]
    /// Dec-Tiger with 10 belief points and at most 20 iterations
    fn dec_tiger_end_to_end() {
        let model = dec_tiger::dec_tiger().unwrap();
        let mut solver = HeuristicPolicyIteration::new(model, dec_tiger::config()).unwrap();
        assert_eq!(solver.phase(), Phase::Uninitialized);
        let report = solver.solve_with_report().unwrap();
        assert_eq!(solver.phase(), Phase::Terminated);
        assert!(report.value.is_finite());
        // never worse than listening forever
        assert!(report.value >= -200. - EPS, "value {}", report.value);
        assert!(report.iterations >= 1 && report.iterations <= 20);
        assert_eq!(report.history.len(), report.iterations + 1);
        assert_close(report.history[0], -200., EPS);
        assert!(report.history.iter().all(|v| *v >= report.history[0] - EPS), "{:?}", report.history);
        assert_eq!(report.value, report.history[report.iterations]);
        assert!(report.belief_points >= 1 && report.belief_points <= 10);
        assert!(solver.model().node_counts().iter().all(|n| *n >= 1));
        assert_close(solver.model().value_at(solver.model().initial_belief()).unwrap(), report.value, 1e-9);
        let last_change = (report.history[report.iterations] - report.history[report.iterations - 1]).abs();
        match report.termination {
            Termination::Converged => assert!(last_change < solver.config().value_change_threshold),
            Termination::IterationLimit => assert_eq!(report.iterations, 20),
        }
    }

    #[test]
    /// The loop stops as soon as the value at the initial belief stops moving
    fn converges_on_initial_belief_value() {
        let model = self_loop_model(0.5, 1.);
        let config = SolverConfig { belief_point_generation_seed: 1, ..SolverConfig::default() };
        let mut solver = HeuristicPolicyIteration::new(model, config).unwrap();
        let report = solver.solve_with_report().unwrap();
        assert_eq!(report.termination, Termination::Converged);
        assert_eq!(report.iterations, 1);
        assert_close(report.value, 2., EPS);
        assert_eq!(report.history.len(), 2);
    }

    #[test]
    /// No full iteration lowers the value at the initial belief
    fn iterations_never_degrade_random_models() {
        for seed in 1..=30 {
            let model = random_dec_pomdp(RandomModelSpec::default(), seed).unwrap();
            let config = SolverConfig {
                max_iterations: 3,
                value_change_threshold: 0.,
                belief_point_generation_seed: seed,
                ..SolverConfig::default()
            };
            let mut solver = HeuristicPolicyIteration::new(model, config).unwrap();
            let report = solver.solve_with_report().unwrap();
            for (it, pair) in report.history.windows(2).enumerate() {
                assert!(pair[1] >= pair[0] - 1e-9, "seed {} iteration {}: {} -> {}", seed, it + 1, pair[0], pair[1]);
            }
            assert_close(solver.model().value_at(solver.model().initial_belief()).unwrap(), report.value, 1e-9);
        }
    }

    #[test]
    fn random_models_solve() {
        for seed in 1..=3 {
            let model = random_dec_pomdp(RandomModelSpec::default(), seed).unwrap();
            let config = SolverConfig { max_iterations: 3, belief_point_generation_seed: seed, ..SolverConfig::default() };
            let mut solver = HeuristicPolicyIteration::new(model, config).unwrap();
            let value = solver.solve().unwrap();
            assert!(value.is_finite());
            assert!(solver.belief_points().is_some());
        }
    }
}
