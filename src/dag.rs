//! DAG-shape helpers: cycle detection at construction time and topological ordering
//! for the driver. Kept separate from [`crate::engine::Engine`]'s public surface since
//! both are pure graph-walking concerns over the frozen arena of nodes.

use rustc_hash::FxHashSet;

use crate::engine::Engine;
use crate::node::NodeId;

impl Engine {
    /// Would adding the edge `dependent -> input` (dependent depends on input) close a
    /// cycle? True if `input` can already reach `dependent` by following existing input
    /// edges, or if they're the same node.
    pub(crate) fn would_cycle(&self, dependent: NodeId, input: NodeId) -> bool {
        if dependent == input {
            return true;
        }
        let mut stack = vec![input];
        let mut seen = FxHashSet::default();
        while let Some(cur) = stack.pop() {
            if cur == dependent {
                return true;
            }
            if !seen.insert(cur) {
                continue;
            }
            if let Some(node) = &self.nodes[cur.0] {
                stack.extend(node.inputs.iter().map(|edge| edge.node));
            }
        }
        false
    }

    /// Topological order (inputs before dependents) of every node reachable from
    /// `roots` by following input edges, computed fresh on every call.
    ///
    /// The DAG is frozen after construction, so this could be cached; it is recomputed
    /// per call for simplicity, since one pass over a few thousand nodes is cheap next
    /// to the per-node `run`/handler work it schedules.
    pub(crate) fn topo_order(&self, roots: &[NodeId]) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut visited = FxHashSet::default();
        for &root in roots {
            self.visit_postorder(root, &mut visited, &mut order);
        }
        order
    }

    fn visit_postorder(&self, id: NodeId, visited: &mut FxHashSet<NodeId>, order: &mut Vec<NodeId>) {
        if !visited.insert(id) {
            return;
        }
        if let Some(node) = &self.nodes[id.0] {
            for edge in &node.inputs {
                self.visit_postorder(edge.node, visited, order);
            }
        }
        order.push(id);
    }

    /// All sink nodes: nodes that no other node declares as an input. These are the
    /// default roots for [`Engine::run`](crate::Engine::run).
    pub(crate) fn sinks(&self) -> Vec<NodeId> {
        let mut has_dependent = vec![false; self.nodes.len()];
        for slot in &self.nodes {
            if let Some(node) = slot {
                for edge in &node.inputs {
                    has_dependent[edge.node.0] = true;
                }
            }
        }
        (0..self.nodes.len())
            .filter(|&i| !has_dependent[i] && self.nodes[i].is_some())
            .map(NodeId)
            .collect()
    }
}
