//! Per-node state: the data pointer, last-iteration state, counters, and the
//! author-supplied callbacks that give a node its behavior.

use std::any::Any;
use std::fmt;

use smallvec::SmallVec;

use crate::engine::Engine;

/// Most nodes declare a handful of inputs; this keeps the common case off the heap.
pub(crate) type Inputs = SmallVec<[Input; 4]>;

/// A stable handle to a node, valid for the lifetime of the [`Engine`] that created it.
///
/// Indices are assigned in creation order and never reused (nodes cannot be removed
/// once added), so a `NodeId` obtained from one engine must never be used with another.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl fmt::Debug for NodeId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "NodeId({})", self.0)
    }
}

/// A node's last-iteration state.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum NodeState {
    /// Has never been evaluated (or not since the last `cleanup`).
    Stale,
    /// Valid, and changed during the iteration that produced it.
    Updated,
    /// Valid, and unchanged during the iteration that produced it.
    Unchanged,
    /// This iteration's processing was abandoned for this node.
    Canceled,
}

impl Default for NodeState {
    fn default() -> Self {
        NodeState::Stale
    }
}

/// The verdict a per-input change handler hands back to the dispatcher.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum HandlerResult {
    /// The handler could not incrementally absorb the change; the node must recompute.
    Unhandled,
    /// The handler absorbed the change and the dependent's data changed as a result.
    HandledUpdated,
    /// The handler absorbed the change and concluded there was no net effect.
    ///
    /// Legal, but a documented hazard: returning this when the input's change was in
    /// fact consequential silently suppresses propagation. The engine cannot tell the
    /// difference between "correctly no-op" and "author forgot to account for this".
    HandledUnchanged,
}

/// Recompute / compute / cancel counters for one node, monotonically non-decreasing
/// across the lifetime of the engine.
#[derive(Copy, Clone, Default, Debug)]
pub struct NodeStats {
    /// Number of iterations in which this node's `run` was invoked to rebuild from scratch.
    pub recompute: u64,
    /// Number of iterations in which this node's verdict was derived purely from handlers.
    pub compute: u64,
    /// Number of iterations in which this node was canceled instead of evaluated.
    pub cancel: u64,
}

pub(crate) type InitFn = Box<dyn FnOnce(&dyn Any, &Engine) -> Box<dyn Any>>;
pub(crate) type RunFn = Box<dyn FnMut(&mut Option<Box<dyn Any>>, &Engine) -> NodeState>;
pub(crate) type CleanupFn = Box<dyn FnOnce(Box<dyn Any>)>;
pub(crate) type IsValidFn = Box<dyn Fn(&dyn Any) -> bool>;
pub(crate) type ClearTrackedFn = Box<dyn FnMut(&mut dyn Any)>;
/// A per-input change handler: given the dependent's own data, the engine, and the
/// input's id, incrementally absorbs that input's change and reports the verdict.
///
/// Boxed so that [`Engine::add_input`](crate::Engine::add_input) can accept any
/// closure regardless of its captures, the same way [`RunFn`] does for `run`.
pub type ChangeHandlerFn = Box<dyn FnMut(&mut Option<Box<dyn Any>>, &Engine, NodeId) -> HandlerResult>;

/// A diagnostic hook invoked when a [`ChangeHandlerFn`] returns [`HandlerResult::Unhandled`].
pub type FailureInfoFn = Box<dyn FnMut(Option<&dyn Any>, &Engine, NodeId)>;

/// One declared input edge: the input node plus its optional change handler and
/// optional compute-failure diagnostic hook.
pub(crate) struct Input {
    pub(crate) node: NodeId,
    pub(crate) name: String,
    pub(crate) handler: Option<ChangeHandlerFn>,
    pub(crate) failure_info: Option<FailureInfoFn>,
}

/// A node: its identity, its declared inputs, its data, and its lifecycle callbacks.
///
/// Built via [`NodeSpec`] and handed to [`Engine::add_node`](crate::Engine::add_node).
pub(crate) struct Node {
    pub(crate) name: String,
    pub(crate) inputs: Inputs,
    pub(crate) data: Option<Box<dyn Any>>,
    pub(crate) state: NodeState,
    pub(crate) stats: NodeStats,
    pub(crate) init: Option<InitFn>,
    pub(crate) run: RunFn,
    pub(crate) cleanup: Option<CleanupFn>,
    pub(crate) is_valid: Option<IsValidFn>,
    pub(crate) clear_tracked_data: Option<ClearTrackedFn>,
}

impl fmt::Debug for Node {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("Node")
            .field("name", &self.name)
            .field("inputs", &self.inputs.len())
            .field("state", &self.state)
            .field("stats", &(self.stats.recompute, self.stats.compute, self.stats.cancel))
            .finish()
    }
}

/// A builder for a node's identity and callbacks, consumed by
/// [`Engine::add_node`](crate::Engine::add_node).
///
/// Only `run` is mandatory: a source node with no `init`/`cleanup` is common, since its
/// `run` alone is enough to produce data from nothing the first time it executes.
pub struct NodeSpec {
    pub(crate) name: String,
    pub(crate) init: Option<InitFn>,
    pub(crate) run: RunFn,
    pub(crate) cleanup: Option<CleanupFn>,
    pub(crate) is_valid: Option<IsValidFn>,
    pub(crate) clear_tracked_data: Option<ClearTrackedFn>,
}

impl NodeSpec {
    /// Starts a node builder with the mandatory `run` callback.
    ///
    /// `run` rebuilds the node's data from scratch against the current values of all
    /// inputs; it is invoked whenever the dispatcher cannot (or is configured not to)
    /// absorb a change incrementally, and is the only callback ever invoked on a source.
    pub fn new(
        name: impl Into<String>,
        run: impl FnMut(&mut Option<Box<dyn Any>>, &Engine) -> NodeState + 'static,
    ) -> Self {
        NodeSpec {
            name: name.into(),
            init: None,
            run: Box::new(run),
            cleanup: None,
            is_valid: None,
            clear_tracked_data: None,
        }
    }

    /// Attaches an `init` callback, invoked exactly once when the engine initializes.
    pub fn with_init(
        mut self,
        init: impl FnOnce(&dyn Any, &Engine) -> Box<dyn Any> + 'static,
    ) -> Self {
        self.init = Some(Box::new(init));
        self
    }

    /// Attaches a `cleanup` callback, invoked exactly once when the engine tears down.
    pub fn with_cleanup(mut self, cleanup: impl FnOnce(Box<dyn Any>) + 'static) -> Self {
        self.cleanup = Some(Box::new(cleanup));
        self
    }

    /// Attaches an `is_valid` predicate, consulted by `get_data` for nodes whose state
    /// alone (`UPDATED`/`UNCHANGED`) would otherwise make the data inaccessible.
    pub fn with_is_valid(mut self, is_valid: impl Fn(&dyn Any) -> bool + 'static) -> Self {
        self.is_valid = Some(Box::new(is_valid));
        self
    }

    /// Attaches a `clear_tracked_data` hook, run at the start of every iteration before
    /// any node is evaluated.
    pub fn with_clear_tracked_data(
        mut self,
        clear: impl FnMut(&mut dyn Any) + 'static,
    ) -> Self {
        self.clear_tracked_data = Some(Box::new(clear));
        self
    }
}
