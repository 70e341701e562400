//! The public inspection API (§4.G): read-only views of node state, data, and
//! statistics, usable both mid-development (from within `run`/handler callbacks, via
//! the `&Engine` they're handed) and by the main loop after an iteration completes.

use std::any::Any;

use crate::error::ConstructionError;
use crate::node::{NodeId, NodeState, NodeStats};
use crate::Engine;

impl Engine {
    /// Resolves a node by name.
    pub fn node_id(&self, name: &str) -> Result<NodeId, ConstructionError> {
        self.name_to_id
            .get(name)
            .copied()
            .ok_or_else(|| ConstructionError::UnknownNode(name.to_owned()))
    }

    /// Looks up `name` among `node`'s declared inputs, returning the input's id.
    pub fn get_input(&self, node: NodeId, name: &str) -> Option<NodeId> {
        self.nodes[node.0]
            .as_ref()
            .expect("node taken")
            .inputs
            .iter()
            .find(|edge| edge.name == name)
            .map(|edge| edge.node)
    }

    /// As [`Engine::get_input`], but reports which lookup failed instead of collapsing
    /// both to `None` — useful for callers building tooling around node names rather
    /// than ids.
    pub fn get_input_checked(&self, node: NodeId, name: &str) -> Result<NodeId, ConstructionError> {
        self.get_input(node, name).ok_or_else(|| ConstructionError::UnknownInput {
            node: self.name_of(node).to_owned(),
            name: name.to_owned(),
        })
    }

    /// As [`Engine::get_input`], then reads that input's data through [`Engine::get_data`].
    pub fn get_input_data(&self, node: NodeId, name: &str) -> Option<&dyn Any> {
        let input = self.get_input(node, name)?;
        self.get_data(input)
    }

    /// True iff `node`'s last-iteration state is `UPDATED`.
    pub fn node_changed(&self, node: NodeId) -> bool {
        self.node_state(node) == NodeState::Updated
    }

    /// A node's last-iteration state.
    pub fn node_state(&self, node: NodeId) -> NodeState {
        self.nodes[node.0].as_ref().expect("node taken").state
    }

    /// A node's recompute/compute/cancel counters, monotonic for the engine's lifetime.
    pub fn stats(&self, node: NodeId) -> NodeStats {
        self.nodes[node.0].as_ref().expect("node taken").stats
    }

    /// Returns `node`'s data, but only when it is safe to read: state `UPDATED` or
    /// `UNCHANGED`, or an attached `is_valid` predicate that returns true regardless of
    /// state. Returns `None` for `STALE` or `CANCELED` nodes with no such predicate.
    pub fn get_data(&self, node: NodeId) -> Option<&dyn Any> {
        let node = self.nodes[node.0].as_ref().expect("node taken");
        let data = node.data.as_deref()?;
        let readable = matches!(node.state, NodeState::Updated | NodeState::Unchanged)
            || node.is_valid.as_ref().map_or(false, |is_valid| is_valid(data));
        readable.then(|| data)
    }

    /// Returns `node`'s data unconditionally, with no state check. Intended for
    /// initialization-time use, where callers are responsible for judging validity
    /// themselves.
    pub fn get_internal_data(&self, node: NodeId) -> Option<&dyn Any> {
        self.nodes[node.0].as_ref().expect("node taken").data.as_deref()
    }
}
