//! Errors returned while building a node DAG.
//!
//! All of these are construction-time refusals: the graph is left exactly as it was
//! before the failed call, there is never a partially-applied edge.

use thiserror::Error;

/// The hard per-node limit on declared inputs (see the data model section of the spec).
pub const MAX_INPUTS_PER_NODE: usize = 256;

/// Everything that can go wrong while assembling the node DAG.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    /// A node with this name already exists in the engine.
    #[error("a node named {0:?} already exists")]
    DuplicateNode(String),

    /// `input` is already declared as an input of `dependent`.
    #[error("{input:?} is already an input of {dependent:?}")]
    DuplicateInput {
        /// The node the input was being added to.
        dependent: String,
        /// The input that was already present.
        input: String,
    },

    /// Adding this edge would exceed [`MAX_INPUTS_PER_NODE`].
    #[error("{node:?} already has the maximum of {limit} inputs")]
    TooManyInputs {
        /// The node the input was being added to.
        node: String,
        /// The limit that was hit ([`MAX_INPUTS_PER_NODE`]).
        limit: usize,
    },

    /// Adding `dependent -> input` would close a cycle.
    #[error("adding {input:?} as an input of {dependent:?} would create a cycle")]
    WouldCycle {
        /// The node the input was being added to.
        dependent: String,
        /// The input that would have closed the cycle.
        input: String,
    },

    /// A name passed to a by-name lookup does not refer to a node that exists at all.
    #[error("no node named {0:?} exists")]
    UnknownNode(String),

    /// `name` is not among the inputs declared on `node`.
    #[error("{name:?} is not a declared input of {node:?}")]
    UnknownInput {
        /// The node whose inputs were searched.
        node: String,
        /// The name that was not found among them.
        name: String,
    },
}
