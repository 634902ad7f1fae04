//! Error and warning types for graph lowering.
//!
//! Fatal errors abort a pass and carry the source location of the offending
//! node where one exists. Warnings are collected next to a best-effort
//! result.

use thiserror::Error;

use crate::ir::{NodeKind, SourceRange};

/// Result type for lowering operations.
pub type Result<T> = std::result::Result<T, LowerError>;

#[derive(Debug, Error)]
pub enum LowerError {
    /// A module value reaches a node that is not an attribute read, an
    /// attribute write or a fork.
    #[error(
        "{source_range}: a module can only be read from, written to or passed to a fork, \
         but it flows into `{kind}`"
    )]
    UnsupportedOperation {
        kind: NodeKind,
        source_range: SourceRange,
    },

    /// A module value is passed to an opaque Python call.
    #[error("{source_range}: couldn't export Python method `{name}`")]
    UnexportableCall {
        name: String,
        source_range: SourceRange,
    },

    #[error("{source_range}: module `{class}` has no attribute `{name}`")]
    UnknownAttribute {
        class: String,
        name: String,
        source_range: SourceRange,
    },

    /// A node is missing an attribute its kind requires.
    #[error("{source_range}: malformed `{kind}` node: {reason}")]
    MalformedNode {
        kind: NodeKind,
        reason: &'static str,
        source_range: SourceRange,
    },

    #[error("input {offset} cannot be lowered as the module input: {reason}")]
    InvalidSelfInput { offset: usize, reason: String },

    #[error("fork nesting exceeds the limit of {limit}")]
    ForkDepthExceeded { limit: usize },

    #[error("{source_range}: inlining `{function}` exceeds the depth limit of {limit}")]
    InlineDepthExceeded {
        function: String,
        limit: usize,
        source_range: SourceRange,
    },

    /// The pass left the graph in a state it should never produce. This is a
    /// bug in the pass, not in the input graph.
    #[error("internal invariant violated: {0}")]
    InternalInvariantViolation(String),

    /// A slot no longer holds the kind of value it held when the graph was
    /// lowered.
    #[error("slot {slot} holds {found}, expected {expected}")]
    SlotContentMismatch {
        slot: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A tensor-list slot changed length after lowering, so its elements no
    /// longer line up with the graph's inputs.
    #[error("slot {slot} holds {found} tensors but the graph takes {expected}")]
    SlotLengthMismatch {
        slot: String,
        expected: usize,
        found: usize,
    },
}

/// Non-fatal findings reported alongside a lowered graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LowerWarning {
    /// An attribute write inside a conditional body was dropped.
    #[error(
        "{source_range}: assignment to `{attribute}` inside a conditional branch is not \
         supported; the exported graph may behave differently from the original"
    )]
    UnsupportedConditionalMutation {
        attribute: String,
        source_range: SourceRange,
    },
}
