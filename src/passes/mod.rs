//! Graph transformations.

pub mod inliner;
pub mod lower_graph;
pub mod remove_inplace;

pub use inliner::inline_calls;
pub use lower_graph::{
    load_slot_values, lower_graph, lower_graph_with_values, ExtraInput, LoweredGraph, Slot,
};
pub use remove_inplace::remove_inplace_ops;
