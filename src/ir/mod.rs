mod display;
mod graph_impl;
pub mod types;

#[cfg(test)]
mod tests;

pub use graph_impl::{BlockData, Graph, NodeData, ValueData};
pub use types::{
    BlockKey, DType, InsertPoint, NodeAttrs, NodeKey, NodeKind, SourceRange, TensorType, Type,
    Use, ValueKey, MAX_NODE_BLOCKS,
};
