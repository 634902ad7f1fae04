pub mod config;
pub mod error;
pub mod ir;
pub mod object;
pub mod passes;

pub use config::LowerOptions;
pub use error::{LowerError, LowerWarning, Result};
pub use ir::Graph;
pub use object::{IValue, ModuleBuilder, ObjectRef, Tensor};
pub use passes::lower_graph::{
    load_slot_values, lower_graph, lower_graph_with_values, ExtraInput, LoweredGraph, Slot,
};
