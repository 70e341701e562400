//! The [`Engine`]: node registry, DAG builder, and the process-wide flags that drive
//! one iteration. A single owning value threaded through the public API, rather than
//! module-scoped global state.

use log::{debug, trace};
use rustc_hash::FxHasher;
use std::any::Any;
use std::hash::BuildHasherDefault;

use crate::context::Context;
use crate::error::{ConstructionError, MAX_INPUTS_PER_NODE};
use crate::node::{ChangeHandlerFn, FailureInfoFn, Input, Inputs, Node, NodeId, NodeSpec, NodeState};

/// An insertion-ordered map keyed by the fast, non-cryptographic hasher used
/// throughout: iterating node names comes out in declaration order for free.
pub(crate) type FxIndexMap<K, V> = indexmap::IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// Lifecycle phase of an [`Engine`].
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum Phase {
    /// Nodes may still be added; no iteration has run yet.
    Uninitialized,
    /// `init` has run; the engine is ready to drive iterations.
    Initialized,
    /// `cleanup` has run; the engine must not be used again.
    Cleaned,
}

/// A self-consuming builder for engine-wide construction options.
///
/// There is currently exactly one: a capacity hint for the node arena. Defaults are
/// fine for small DAGs; `with_node_capacity` avoids reallocation when the caller knows
/// roughly how many nodes it will declare.
#[derive(Default)]
pub struct EngineConfig {
    node_capacity: usize,
}

impl EngineConfig {
    /// Starts a config with no capacity hint.
    pub fn new() -> Self {
        Self::default()
    }

    /// Preallocates room for `capacity` nodes.
    pub fn with_node_capacity(mut self, capacity: usize) -> Self {
        self.node_capacity = capacity;
        self
    }

    /// Builds the (empty, uninitialized) engine.
    pub fn build(self) -> Engine {
        Engine {
            nodes: Vec::with_capacity(self.node_capacity),
            name_to_id: FxIndexMap::default(),
            phase: Phase::Uninitialized,
            context: None,
            force_recompute: false,
            immediate_wake: false,
            has_run: false,
            has_updated: false,
            canceled: false,
        }
    }
}

/// The incremental processing engine: a frozen node DAG plus the per-iteration and
/// cross-iteration state that drives it.
pub struct Engine {
    pub(crate) nodes: Vec<Option<Node>>,
    pub(crate) name_to_id: FxIndexMap<String, NodeId>,
    pub(crate) phase: Phase,
    pub(crate) context: Option<Context>,
    pub(crate) force_recompute: bool,
    pub(crate) immediate_wake: bool,
    pub(crate) has_run: bool,
    pub(crate) has_updated: bool,
    pub(crate) canceled: bool,
}

impl Default for Engine {
    fn default() -> Self {
        EngineConfig::default().build()
    }
}

impl Engine {
    /// Creates an empty, uninitialized engine. Equivalent to `EngineConfig::new().build()`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a new node. Fails if a node with this name already exists.
    ///
    /// Must be called before [`Engine::init`]; the DAG is frozen once the engine has
    /// run its first iteration.
    pub fn add_node(&mut self, spec: NodeSpec) -> Result<NodeId, ConstructionError> {
        self.assert_under_construction();
        if self.name_to_id.contains_key(&spec.name) {
            return Err(ConstructionError::DuplicateNode(spec.name));
        }

        let id = NodeId(self.nodes.len());
        debug!("add_node: {:?} -> {:?}", spec.name, id);
        self.name_to_id.insert(spec.name.clone(), id);
        self.nodes.push(Some(Node {
            name: spec.name,
            inputs: Inputs::new(),
            data: None,
            state: NodeState::Stale,
            stats: Default::default(),
            init: spec.init,
            run: spec.run,
            cleanup: spec.cleanup,
            is_valid: spec.is_valid,
            clear_tracked_data: spec.clear_tracked_data,
        }));
        Ok(id)
    }

    /// Attaches `input` as an input of `dependent`, with an optional change handler.
    ///
    /// Fails if the edge would exceed [`MAX_INPUTS_PER_NODE`], would create a cycle, or
    /// duplicates an input already declared on `dependent`.
    pub fn add_input(
        &mut self,
        dependent: NodeId,
        input: NodeId,
        handler: Option<ChangeHandlerFn>,
    ) -> Result<(), ConstructionError> {
        self.add_input_impl(dependent, input, handler, None)
    }

    /// As [`Engine::add_input`], additionally attaching a diagnostic callback invoked
    /// whenever the handler degrades (returns `Unhandled`).
    pub fn add_input_with_failure_info(
        &mut self,
        dependent: NodeId,
        input: NodeId,
        handler: Option<ChangeHandlerFn>,
        failure_info: FailureInfoFn,
    ) -> Result<(), ConstructionError> {
        self.add_input_impl(dependent, input, handler, Some(failure_info))
    }

    fn add_input_impl(
        &mut self,
        dependent: NodeId,
        input: NodeId,
        handler: Option<ChangeHandlerFn>,
        failure_info: Option<FailureInfoFn>,
    ) -> Result<(), ConstructionError> {
        self.assert_under_construction();

        let dependent_name = self.name_of(dependent).to_owned();
        let input_name = self.name_of(input).to_owned();

        {
            let node = self.nodes[dependent.0].as_ref().expect("node taken during construction");
            if node.inputs.len() >= MAX_INPUTS_PER_NODE {
                return Err(ConstructionError::TooManyInputs {
                    node: dependent_name,
                    limit: MAX_INPUTS_PER_NODE,
                });
            }
            if node.inputs.iter().any(|edge| edge.node == input) {
                return Err(ConstructionError::DuplicateInput {
                    dependent: dependent_name,
                    input: input_name,
                });
            }
        }

        if self.would_cycle(dependent, input) {
            return Err(ConstructionError::WouldCycle {
                dependent: dependent_name,
                input: input_name,
            });
        }

        trace!("add_input: {:?} depends on {:?}", dependent, input);
        let node = self.nodes[dependent.0].as_mut().expect("node taken during construction");
        node.inputs.push(Input {
            node: input,
            name: input_name,
            handler,
            failure_info,
        });
        Ok(())
    }

    /// Runs every node's `init` callback (if any) with the shared `arg`, storing its
    /// returned data on the node. Invoked exactly once, in the `Uninitialized ->
    /// Initialized` transition.
    ///
    /// # Panics
    ///
    /// Panics if the engine has already been initialized or cleaned up.
    pub fn init(&mut self, arg: &dyn Any) {
        assert_eq!(
            self.phase,
            Phase::Uninitialized,
            "Engine::init called more than once"
        );
        debug!("init: initializing {} nodes", self.nodes.len());
        for idx in 0..self.nodes.len() {
            let mut node = self.nodes[idx].take().expect("node present during init");
            if let Some(init) = node.init.take() {
                node.data = Some(init(arg, self));
            }
            self.nodes[idx] = Some(node);
        }
        self.phase = Phase::Initialized;
    }

    /// Runs every node's `cleanup` callback (if any) on its stored data, then nulls the
    /// pointer. Invoked exactly once, in the `Initialized -> Cleaned` transition.
    ///
    /// # Panics
    ///
    /// Panics if the engine was never initialized, or has already been cleaned up.
    pub fn cleanup(&mut self) {
        assert_eq!(
            self.phase,
            Phase::Initialized,
            "Engine::cleanup called before init, or more than once"
        );
        debug!("cleanup: tearing down {} nodes", self.nodes.len());
        for slot in &mut self.nodes {
            let mut node = slot.take().expect("node present during cleanup");
            if let (Some(cleanup), Some(data)) = (node.cleanup.take(), node.data.take()) {
                cleanup(data);
            }
            *slot = Some(node);
        }
        self.phase = Phase::Cleaned;
    }

    pub(crate) fn name_of(&self, id: NodeId) -> &str {
        &self.nodes[id.0].as_ref().expect("node taken during construction").name
    }

    fn assert_under_construction(&self) {
        assert_eq!(
            self.phase,
            Phase::Uninitialized,
            "the DAG is frozen once the engine has been initialized"
        );
    }
}
