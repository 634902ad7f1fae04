use std::sync::Arc;

use crate::ir::Graph;

/// A named graph that `Call` nodes refer to.
#[derive(Debug)]
pub struct Function {
    name: String,
    graph: Graph,
}

impl Function {
    pub fn new(name: impl Into<String>, graph: Graph) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            graph,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }
}
