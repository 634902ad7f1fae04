//! Eliminates module objects from a graph.
//!
//! A graph whose first-class module input is read (`self.weight`), written
//! (`self.state = x`) or handed to forks is rewritten into a graph over plain
//! values. Tensor attributes become extra formal inputs, appended in the
//! order the program first needs them, and other attributes become constants.
//! The returned [`ExtraInput`] list says which object attribute feeds each
//! extra input; [`load_slot_values`] fetches the matching runtime values.
//!
//! ```
//! use modlower::config::LowerOptions;
//! use modlower::ir::{Graph, Type};
//! use modlower::object::{ModuleBuilder, Tensor};
//! use modlower::passes::lower_graph::{load_slot_values, lower_graph};
//!
//! let module = ModuleBuilder::new("Linear")
//!     .attr("weight", Tensor::zeros(vec![3, 3]))
//!     .build();
//!
//! let mut graph = Graph::new();
//! let this = graph.add_named_input("self", Type::Class(module.class().clone()));
//! let x = graph.add_named_input("x", Type::tensor());
//! let weight = graph.insert_get_attr(this, "weight", Type::tensor());
//! let y = graph.insert_op("aten::matmul", &[x, weight], Type::tensor());
//! graph.register_output(y);
//!
//! let lowered = lower_graph(&graph, &module, &LowerOptions::default()).unwrap();
//! assert_eq!(lowered.graph.inputs().len(), 2);
//! assert_eq!(load_slot_values(&lowered.slots).unwrap().len(), 1);
//! ```

mod loader;
mod slot;
mod worklist;


use tracing::debug;

use crate::config::LowerOptions;
use crate::error::{LowerWarning, Result};
use crate::ir::Graph;
use crate::object::{ObjectRef, Tensor};

pub use loader::load_slot_values;
pub use slot::{ExtraInput, Slot, SlotState};

/// Output of [`lower_graph`].
#[derive(Debug)]
pub struct LoweredGraph {
    /// The rewritten graph. Its formal inputs are the original ones without
    /// the module, followed by one input per tensor slot and per list element.
    pub graph: Graph,
    /// Slots backing the extra inputs, in input order.
    pub slots: Vec<ExtraInput>,
    pub warnings: Vec<LowerWarning>,
}

/// Removes the module input `options.self_offset` of `graph`.
///
/// The input graph is left untouched. Fatal errors discard the partial
/// result; attribute writes that cannot be modelled are reported in
/// [`LoweredGraph::warnings`] instead.
pub fn lower_graph(
    graph: &Graph,
    module: &ObjectRef,
    options: &LowerOptions,
) -> Result<LoweredGraph> {
    debug!(
        module = module.class().name(),
        self_offset = options.self_offset,
        "lowering graph"
    );
    let lowered = worklist::lower_owned(graph.clone(), module, options.self_offset, options, 0)?;
    Ok(LoweredGraph {
        graph: lowered.graph,
        slots: lowered.extra,
        warnings: lowered.warnings,
    })
}

/// Lowers the first input of `graph` against `module` and loads the values
/// for the new inputs.
pub fn lower_graph_with_values(
    graph: &Graph,
    module: &ObjectRef,
) -> Result<(Graph, Vec<Tensor>)> {
    let lowered = lower_graph(graph, module, &LowerOptions::default())?;
    let values = load_slot_values(&lowered.slots)?;
    Ok((lowered.graph, values))
}
