//! The iteration driver: walks the DAG in topological order, dispatching each node
//! through its change handlers (or straight to `run`) per §4.E, and propagates
//! cancellation when a recompute is required but not permitted (§4.D.4).

use log::{debug, info, trace};

use crate::engine::{Engine, Phase};
use crate::node::{HandlerResult, Node, NodeId, NodeState};

/// Returned internally when a node needed to recompute but `recompute_allowed` was
/// false. Never escapes the driver: [`Engine::run_from`] turns it into cancellation
/// state on the engine instead of propagating an error to the caller.
struct GateTripped;

impl Engine {
    /// Runs one iteration over every sink (node with no dependents), the default entry
    /// point for the main control loop.
    ///
    /// `recompute_allowed` gates whether a node that cannot be handled incrementally is
    /// permitted to fall back to `run` this iteration; see [`Engine::run_from`] for the
    /// full contract.
    pub fn run(&mut self, recompute_allowed: bool) {
        let roots = self.sinks();
        self.run_from(&roots, recompute_allowed);
    }

    /// Runs one iteration over the sub-DAG reachable from `roots`, in topological order
    /// (every input evaluated before its dependents).
    ///
    /// Afterward, [`Engine::has_run`] and [`Engine::has_updated`] report what happened;
    /// if the iteration was canceled (a node needed to recompute while
    /// `recompute_allowed` was false) both read false regardless of work already done
    /// earlier in the walk, and [`Engine::need_run`] becomes true.
    ///
    /// # Panics
    ///
    /// Panics if the engine has not been initialized, or has been cleaned up.
    pub fn run_from(&mut self, roots: &[NodeId], recompute_allowed: bool) {
        assert_eq!(
            self.phase,
            Phase::Initialized,
            "Engine::run_from called before init or after cleanup"
        );

        self.begin_iteration();
        let order = self.topo_order(roots);
        let force = self.force_recompute;
        info!(
            "run_from: walking {} node(s), force_recompute={}, recompute_allowed={}",
            order.len(),
            force,
            recompute_allowed
        );

        let mut touched = false;
        let mut updated = false;
        let mut gate_tripped = false;

        for &id in &order {
            if gate_tripped {
                self.cancel_node(id);
                continue;
            }
            match self.evaluate(id, force, recompute_allowed) {
                Ok(state) => {
                    touched = true;
                    if state == NodeState::Updated {
                        updated = true;
                    }
                }
                Err(GateTripped) => {
                    info!(
                        "run_from: recompute gate tripped at {:?} ({:?}); canceling remainder of walk",
                        id,
                        self.name_of(id)
                    );
                    gate_tripped = true;
                    self.cancel_node(id);
                }
            }
        }

        if gate_tripped {
            self.canceled = true;
            self.force_recompute = true;
            self.has_run = false;
            self.has_updated = false;
        } else {
            self.has_run = touched;
            self.has_updated = updated;
            self.force_recompute = false;
        }
    }

    fn begin_iteration(&mut self) {
        for slot in &mut self.nodes {
            let node = slot.as_mut().expect("node taken between iterations");
            if let Some(clear) = node.clear_tracked_data.as_mut() {
                if let Some(data) = node.data.as_deref_mut() {
                    clear(data);
                }
            }
        }
        self.has_run = false;
        self.has_updated = false;
        self.canceled = false;
    }

    fn cancel_node(&mut self, id: NodeId) {
        let node = self.nodes[id.0].as_mut().expect("node taken during evaluation");
        debug!("cancel_node: {:?} canceled", node.name);
        node.state = NodeState::Canceled;
        node.stats.cancel += 1;
    }

    /// Evaluates one node. Temporarily removes it from the arena so its `run`/handler
    /// callbacks can be handed `&Engine` (to read sibling nodes' data) while this
    /// function still holds the only mutable reference to the node's own data.
    fn evaluate(
        &mut self,
        id: NodeId,
        force: bool,
        recompute_allowed: bool,
    ) -> Result<NodeState, GateTripped> {
        let mut node = self.nodes[id.0].take().expect("node missing during evaluation");
        let result = self.evaluate_taken(&mut node, force, recompute_allowed);
        self.nodes[id.0] = Some(node);
        result
    }

    fn evaluate_taken(
        &self,
        node: &mut Node,
        force: bool,
        recompute_allowed: bool,
    ) -> Result<NodeState, GateTripped> {
        if node.inputs.is_empty() {
            trace!("evaluate: {:?} is a source, routing to recompute", node.name);
            return self.recompute(node, recompute_allowed);
        }

        let mut verdict = NodeState::Unchanged;
        for i in 0..node.inputs.len() {
            if force {
                trace!("evaluate: {:?} short-circuited to recompute (force)", node.name);
                return self.recompute(node, recompute_allowed);
            }

            let input_id = node.inputs[i].node;
            let input_state = self.nodes[input_id.0]
                .as_ref()
                .expect("input node present during evaluation")
                .state;
            if input_state != NodeState::Updated {
                continue;
            }

            if node.inputs[i].handler.is_none() {
                trace!(
                    "evaluate: {:?} has no handler for changed input {:?}, recomputing",
                    node.name,
                    node.inputs[i].name
                );
                return self.recompute(node, recompute_allowed);
            }

            let handler = node.inputs[i].handler.as_mut().expect("checked above");
            let verdict_for_input = handler(&mut node.data, self, input_id);
            trace!(
                "evaluate: {:?}.{:?} handler returned {:?}",
                node.name,
                node.inputs[i].name,
                verdict_for_input
            );

            match verdict_for_input {
                HandlerResult::Unhandled => {
                    if let Some(failure_info) = node.inputs[i].failure_info.as_mut() {
                        failure_info(node.data.as_deref(), self, input_id);
                    }
                    debug!(
                        "evaluate: {:?} degraded handling {:?}, recomputing",
                        node.name, node.inputs[i].name
                    );
                    return self.recompute(node, recompute_allowed);
                }
                HandlerResult::HandledUpdated => verdict = NodeState::Updated,
                HandlerResult::HandledUnchanged => {}
            }
        }

        debug!("evaluate: {:?} computed via handlers -> {:?}", node.name, verdict);
        node.state = verdict;
        node.stats.compute += 1;
        Ok(verdict)
    }

    fn recompute(&self, node: &mut Node, recompute_allowed: bool) -> Result<NodeState, GateTripped> {
        if !recompute_allowed {
            return Err(GateTripped);
        }
        let state = (node.run)(&mut node.data, self);
        debug!("recompute: {:?} ran -> {:?}", node.name, state);
        node.state = state;
        node.stats.recompute += 1;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use crate::context::ContextBuilder;
    use crate::node::{HandlerResult, NodeState};
    use crate::{Engine, NodeSpec};
    use std::cell::Cell;
    use std::rc::Rc;

    fn source(name: &str, updated: Rc<Cell<bool>>) -> NodeSpec {
        NodeSpec::new(name, move |_data, _engine| {
            if updated.get() {
                NodeState::Updated
            } else {
                NodeState::Unchanged
            }
        })
    }

    #[test]
    fn diamond_dag_partial_handlers() {
        let mut engine = Engine::new();
        let a_updated = Rc::new(Cell::new(true));
        let b_updated = Rc::new(Cell::new(false));
        let a = engine.add_node(source("a", a_updated)).unwrap();
        let b = engine.add_node(source("b", b_updated)).unwrap();
        let c = engine
            .add_node(NodeSpec::new("c", |_, _| NodeState::Unchanged))
            .unwrap();
        let d = engine
            .add_node(NodeSpec::new("d", |_, _| NodeState::Unchanged))
            .unwrap();

        engine
            .add_input(
                c,
                a,
                Some(Box::new(|_data, _engine, _input| HandlerResult::HandledUpdated)),
            )
            .unwrap();
        engine.add_input(c, b, None).unwrap();
        engine
            .add_input(
                d,
                c,
                Some(Box::new(|_data, _engine, _input| HandlerResult::HandledUpdated)),
            )
            .unwrap();

        engine.init(&());
        engine.set_context(ContextBuilder::new().build());
        engine.run_from(&[d], true);

        assert!(engine.has_run());
        assert!(engine.has_updated());
        assert_eq!(engine.node_state(c), NodeState::Updated);
        assert_eq!(engine.node_state(d), NodeState::Updated);
        assert_eq!(engine.stats(c).compute, 1);
        assert_eq!(engine.stats(c).recompute, 0);
        assert_eq!(engine.stats(d).compute, 1);
    }

    #[test]
    fn missing_handler_forces_recompute() {
        let mut engine = Engine::new();
        let a_updated = Rc::new(Cell::new(true));
        let a = engine.add_node(source("a", a_updated)).unwrap();
        let c = engine
            .add_node(NodeSpec::new("c", |_, _| NodeState::Updated))
            .unwrap();
        engine.add_input(c, a, None).unwrap();

        engine.init(&());
        engine.run_from(&[c], true);

        assert_eq!(engine.node_state(c), NodeState::Updated);
        assert_eq!(engine.stats(c).recompute, 1);
        assert_eq!(engine.stats(c).compute, 0);
    }

    #[test]
    fn recompute_disallowed_cancels_remainder() {
        let mut engine = Engine::new();
        let a_updated = Rc::new(Cell::new(true));
        let a = engine.add_node(source("a", a_updated)).unwrap();
        let c = engine
            .add_node(NodeSpec::new("c", |_, _| NodeState::Updated))
            .unwrap();
        let d = engine
            .add_node(NodeSpec::new("d", |_, _| NodeState::Updated))
            .unwrap();
        engine.add_input(c, a, None).unwrap();
        engine.add_input(d, c, None).unwrap();

        engine.init(&());
        engine.run_from(&[d], false);

        assert!(!engine.has_run());
        assert!(!engine.has_updated());
        assert!(engine.canceled());
        assert!(engine.need_run());
        assert_eq!(engine.node_state(c), NodeState::Canceled);
        assert_eq!(engine.node_state(d), NodeState::Canceled);
        assert_eq!(engine.stats(c).cancel, 1);
        assert_eq!(engine.stats(d).cancel, 1);
        assert!(engine.force_recompute_pending());
    }

    #[test]
    fn force_recompute_touches_every_node() {
        let mut engine = Engine::new();
        let a_updated = Rc::new(Cell::new(false));
        let a = engine.add_node(source("a", a_updated)).unwrap();
        let c = engine
            .add_node(NodeSpec::new("c", |_, _| NodeState::Unchanged))
            .unwrap();
        engine
            .add_input(
                c,
                a,
                Some(Box::new(|_data, _engine, _input| HandlerResult::HandledUnchanged)),
            )
            .unwrap();

        engine.init(&());
        engine.set_force_recompute();
        engine.run_from(&[c], true);

        assert_eq!(engine.stats(a).recompute, 1);
        assert_eq!(engine.stats(c).recompute, 1);
        assert!(!engine.force_recompute_pending());
    }

    #[test]
    fn unhandled_invokes_failure_info_hook() {
        let mut engine = Engine::new();
        let y_updated = Rc::new(Cell::new(true));
        let y = engine.add_node(source("y", y_updated)).unwrap();
        let x = engine
            .add_node(NodeSpec::new("x", |_, _| NodeState::Updated))
            .unwrap();

        let hook_calls = Rc::new(Cell::new(0u32));
        let hook_calls_cb = hook_calls.clone();
        engine
            .add_input_with_failure_info(
                x,
                y,
                Some(Box::new(|_data, _engine, _input| HandlerResult::Unhandled)),
                Box::new(move |_data, _engine, _input| {
                    hook_calls_cb.set(hook_calls_cb.get() + 1);
                }),
            )
            .unwrap();

        engine.init(&());
        engine.run_from(&[x], true);

        assert_eq!(hook_calls.get(), 1);
        assert_eq!(engine.stats(x).recompute, 1);
    }
}
