//! End-to-end black-box coverage of the engine's public API, driving a small diamond
//! DAG across multiple iterations the way a real control loop would.

use std::cell::Cell;
use std::rc::Rc;

use increngine::node::{HandlerResult, NodeState};
use increngine::{Engine, NodeSpec};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A source node whose `run` reports whatever the shared cell currently holds, then
/// resets it to `Unchanged` so a later iteration doesn't repeat the same report.
fn flaky_source(name: &'static str, next: Rc<Cell<NodeState>>) -> NodeSpec {
    NodeSpec::new(name, move |_data, _engine| next.replace(NodeState::Unchanged))
}

fn handled_updated(_data: &mut Option<Box<dyn std::any::Any>>, _engine: &Engine, _input: increngine::NodeId) -> HandlerResult {
    HandlerResult::HandledUpdated
}

#[test]
fn diamond_dag_across_two_iterations() {
    init_logging();
    let mut engine = Engine::new();
    let a_next = Rc::new(Cell::new(NodeState::Updated));
    let b_next = Rc::new(Cell::new(NodeState::Unchanged));

    let a = engine.add_node(flaky_source("a", a_next.clone())).unwrap();
    let b = engine.add_node(flaky_source("b", b_next.clone())).unwrap();
    let c = engine
        .add_node(NodeSpec::new("c", |_, _| NodeState::Updated))
        .unwrap();
    let d = engine
        .add_node(NodeSpec::new("d", |_, _| NodeState::Updated))
        .unwrap();

    engine.add_input(c, a, Some(Box::new(handled_updated))).unwrap();
    engine.add_input(c, b, None).unwrap();
    engine.add_input(d, c, Some(Box::new(handled_updated))).unwrap();

    engine.init(&());

    // Iteration 1: A updates, B doesn't. C's A-input is handled; its B-input has no
    // handler but B didn't change, so it's never consulted. D's C-input is handled.
    engine.run_from(&[d], true);
    assert!(engine.has_updated());
    assert_eq!(engine.node_state(c), NodeState::Updated);
    assert_eq!(engine.node_state(d), NodeState::Updated);
    assert_eq!(engine.stats(c).compute, 1);
    assert_eq!(engine.stats(c).recompute, 0);
    assert_eq!(engine.stats(d).compute, 1);

    // Iteration 2: B updates this time. C has no handler for B, so it must recompute.
    a_next.set(NodeState::Unchanged);
    b_next.set(NodeState::Updated);
    engine.run_from(&[d], true);
    assert_eq!(engine.stats(c).recompute, 1);
    assert_eq!(engine.stats(c).compute, 1, "compute count from iteration 1 should not change");
    assert_eq!(engine.node_state(c), NodeState::Updated);
    // D's C-input is UPDATED again, so its handler runs once more.
    assert_eq!(engine.stats(d).compute, 2);
}

#[test]
fn recompute_disallowed_leaves_force_recompute_sticky_across_calls() {
    init_logging();
    let mut engine = Engine::new();
    let a = engine
        .add_node(NodeSpec::new("a", |_, _| NodeState::Updated))
        .unwrap();
    let b = engine
        .add_node(NodeSpec::new("b", |_, _| NodeState::Updated))
        .unwrap();
    engine.add_input(b, a, None).unwrap();

    engine.init(&());
    engine.run_from(&[b], false);

    assert!(engine.canceled());
    assert!(engine.need_run());
    assert!(engine.force_recompute_pending());
    assert_eq!(engine.node_state(a), NodeState::Canceled);
    assert_eq!(engine.node_state(b), NodeState::Canceled);
    assert_eq!(engine.stats(a).recompute, 0, "a's own recompute was refused by the same gate");

    // A subsequent call with recompute allowed consumes the sticky flag and clears it.
    engine.run_from(&[b], true);
    assert!(!engine.force_recompute_pending());
    assert_eq!(engine.stats(a).recompute, 1);
    assert_eq!(engine.node_state(b), NodeState::Updated);
}

#[test]
fn force_recompute_touches_every_reachable_node_then_clears() {
    init_logging();
    let mut engine = Engine::new();
    let a = engine
        .add_node(NodeSpec::new("a", |_, _| NodeState::Unchanged))
        .unwrap();
    let b = engine
        .add_node(NodeSpec::new("b", |_, _| NodeState::Unchanged))
        .unwrap();
    engine
        .add_input(
            b,
            a,
            Some(Box::new(|_, _, _| HandlerResult::HandledUnchanged)),
        )
        .unwrap();

    engine.init(&());
    engine.run_from(&[b], true);
    assert_eq!(engine.stats(a).recompute, 1, "a is a source: it always recomputes");
    assert_eq!(engine.stats(b).compute, 1, "a never reported UPDATED, so b settles via its handler loop");
    assert_eq!(engine.stats(b).recompute, 0);

    engine.set_force_recompute();
    assert!(engine.need_run());
    engine.run_from(&[b], true);
    assert_eq!(engine.stats(a).recompute, 2);
    assert_eq!(engine.stats(b).recompute, 1, "force shortcuts b straight to recompute this time");
    assert!(!engine.force_recompute_pending());
}

#[test]
fn unhandled_change_runs_failure_hook_then_recomputes() {
    init_logging();
    let mut engine = Engine::new();
    let y = engine
        .add_node(NodeSpec::new("y", |_, _| NodeState::Updated))
        .unwrap();
    let x = engine
        .add_node(NodeSpec::new("x", |_, _| NodeState::Updated))
        .unwrap();

    let fired = Rc::new(Cell::new(0u32));
    let fired_cb = fired.clone();
    engine
        .add_input_with_failure_info(
            x,
            y,
            Some(Box::new(|_, _, _| HandlerResult::Unhandled)),
            Box::new(move |_, _, _| fired_cb.set(fired_cb.get() + 1)),
        )
        .unwrap();

    engine.init(&());
    engine.run_from(&[x], true);

    assert_eq!(fired.get(), 1);
    assert_eq!(engine.stats(x).recompute, 1);
}

#[test]
fn cycle_is_rejected_and_leaves_dag_unchanged() {
    init_logging();
    let mut engine = Engine::new();
    let a = engine.add_node(NodeSpec::new("a", |_, _| NodeState::Unchanged)).unwrap();
    let b = engine.add_node(NodeSpec::new("b", |_, _| NodeState::Unchanged)).unwrap();
    engine.add_input(b, a, None).unwrap();

    let err = engine.add_input(a, b, None).unwrap_err();
    assert!(matches!(err, increngine::ConstructionError::WouldCycle { .. }));

    // The DAG is unchanged: a is still input-less, so it remains a source and b still
    // depends only on a.
    assert_eq!(engine.get_input(b, "a"), Some(a));
    assert_eq!(engine.get_input(a, "b"), None);
}

#[test]
fn duplicate_node_name_is_rejected() {
    init_logging();
    let mut engine = Engine::new();
    engine.add_node(NodeSpec::new("a", |_, _| NodeState::Unchanged)).unwrap();
    let err = engine
        .add_node(NodeSpec::new("a", |_, _| NodeState::Unchanged))
        .unwrap_err();
    assert!(matches!(err, increngine::ConstructionError::DuplicateNode(name) if name == "a"));
}

#[test]
fn idempotent_rerun_with_no_source_changes_settles_unchanged() {
    init_logging();
    // A handler-backed pair settles to UNCHANGED once its source stops reporting changes,
    // and a second call with nothing new to report leaves has_updated false.
    let source_updated = Rc::new(Cell::new(true));
    let source_updated_cb = source_updated.clone();
    let mut engine = Engine::new();
    let s = engine
        .add_node(NodeSpec::new("s", move |_, _| {
            if source_updated_cb.get() {
                NodeState::Updated
            } else {
                NodeState::Unchanged
            }
        }))
        .unwrap();
    let d = engine
        .add_node(NodeSpec::new("d", |_, _| NodeState::Updated))
        .unwrap();
    engine
        .add_input(d, s, Some(Box::new(|_, _, _| HandlerResult::HandledUnchanged)))
        .unwrap();
    engine.init(&());

    engine.run_from(&[d], true);
    assert_eq!(engine.node_state(s), NodeState::Updated);
    assert_eq!(engine.node_state(d), NodeState::Unchanged);
    assert!(engine.has_updated(), "s itself ended UPDATED even though d's handler absorbed it");

    source_updated.set(false);
    engine.run_from(&[d], true);
    assert_eq!(engine.node_state(s), NodeState::Unchanged);
    assert_eq!(engine.node_state(d), NodeState::Unchanged);
    assert!(!engine.has_updated());
}
