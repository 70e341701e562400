#![warn(rust_2018_idioms)]
#![warn(missing_docs)]

//! A generic incremental processing engine.
//!
//! An [`Engine`] holds a DAG of named nodes. Each node declares zero or more inputs;
//! nodes with no inputs are sources, fed by whatever external subscription their `run`
//! consults. Every iteration walks the DAG in topological order, asking each node's
//! inputs whether they changed and, for each one that did, dispatching to a per-input
//! change handler that tries to update the node's data incrementally. A node recomputes
//! from scratch (via `run`) whenever an input lacks a handler, a handler declines the
//! change, or the caller has asked for a full recompute.
//!
//! ```
//! use increngine::{Engine, NodeSpec};
//! use increngine::node::{HandlerResult, NodeState};
//!
//! let mut engine = Engine::new();
//! let source = engine
//!     .add_node(NodeSpec::new("source", |data, _engine| {
//!         *data = Some(Box::new(1i32));
//!         NodeState::Updated
//!     }))
//!     .unwrap();
//! let doubled = engine
//!     .add_node(NodeSpec::new("doubled", |data, engine| {
//!         let n = engine.get_internal_data(engine.node_id("source").unwrap())
//!             .and_then(|d| d.downcast_ref::<i32>())
//!             .copied()
//!             .unwrap_or_default();
//!         *data = Some(Box::new(n * 2));
//!         NodeState::Updated
//!     }))
//!     .unwrap();
//! engine
//!     .add_input(
//!         doubled,
//!         source,
//!         Some(Box::new(|_data, _engine, _input| HandlerResult::Unhandled)),
//!     )
//!     .unwrap();
//!
//! engine.init(&());
//! engine.run(true);
//! assert_eq!(
//!     engine.get_data(doubled).and_then(|d| d.downcast_ref::<i32>()),
//!     Some(&2)
//! );
//! ```

mod context;
mod dag;
mod driver;
mod engine;
mod error;
mod force;
mod inspect;
pub mod node;

pub use context::{Context, ContextBuilder};
pub use engine::{Engine, EngineConfig};
pub use error::{ConstructionError, MAX_INPUTS_PER_NODE};
pub use node::{HandlerResult, NodeId, NodeSpec, NodeState, NodeStats};
