use std::collections::HashSet;
use std::fmt::{self, Write};

use slotmap::SecondaryMap;

use super::graph_impl::Graph;
use super::types::{BlockKey, NodeKey, ValueKey};

/// Assigns printable names to values in first-definition order.
struct Namer {
    names: SecondaryMap<ValueKey, String>,
    taken: HashSet<String>,
    next: usize,
}

impl Namer {
    fn new() -> Self {
        Self {
            names: SecondaryMap::new(),
            taken: HashSet::new(),
            next: 0,
        }
    }

    fn name(&mut self, graph: &Graph, value: ValueKey) -> String {
        if let Some(name) = self.names.get(value) {
            return name.clone();
        }
        let base = match graph.value(value).debug_name() {
            Some(debug) => debug.to_string(),
            None => {
                let n = self.next;
                self.next += 1;
                n.to_string()
            }
        };
        let mut candidate = base.clone();
        let mut suffix = 1;
        while self.taken.contains(&candidate) {
            candidate = format!("{}.{}", base, suffix);
            suffix += 1;
        }
        self.taken.insert(candidate.clone());
        let name = format!("%{}", candidate);
        self.names.insert(value, name.clone());
        name
    }

    fn list(&mut self, graph: &Graph, values: &[ValueKey]) -> String {
        values
            .iter()
            .map(|&v| self.name(graph, v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn typed_list(&mut self, graph: &Graph, values: &[ValueKey]) -> String {
        values
            .iter()
            .map(|&v| format!("{} : {}", self.name(graph, v), graph.value_type(v)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str("  ");
    }
}

fn print_graph(graph: &Graph, header: &str, level: usize, out: &mut String) {
    let mut namer = Namer::new();
    indent(out, level);
    let _ = writeln!(
        out,
        "{}({}):",
        header,
        namer.typed_list(graph, graph.inputs())
    );
    print_block_body(graph, graph.root(), level + 1, &mut namer, out);
    indent(out, level + 1);
    let _ = writeln!(out, "return ({})", namer.list(graph, graph.outputs()));
}

fn print_block_body(
    graph: &Graph,
    block: BlockKey,
    level: usize,
    namer: &mut Namer,
    out: &mut String,
) {
    for &node in graph.block_nodes(block) {
        print_node(graph, node, level, namer, out);
    }
}

fn print_node(graph: &Graph, node: NodeKey, level: usize, namer: &mut Namer, out: &mut String) {
    let data = graph.node(node);
    indent(out, level);
    if !data.outputs().is_empty() {
        out.push_str(&namer.typed_list(graph, data.outputs()));
        out.push(' ');
    }
    let _ = write!(out, "= {}", data.kind());

    let mut attrs = Vec::new();
    if let Some(name) = data.name() {
        attrs.push(format!("name=\"{}\"", name));
    }
    if let Some(value) = &data.attrs.value {
        attrs.push(format!("value={}", value));
    }
    if let Some(function) = &data.attrs.function {
        attrs.push(format!("function={}", function.name()));
    }
    if !attrs.is_empty() {
        let _ = write!(out, "[{}]", attrs.join(", "));
    }
    let _ = writeln!(out, "({})", namer.list(graph, data.inputs()));

    for (idx, &block) in data.blocks().iter().enumerate() {
        indent(out, level + 1);
        let _ = writeln!(
            out,
            "block{}({}):",
            idx,
            namer.typed_list(graph, graph.block_inputs(block))
        );
        print_block_body(graph, block, level + 2, namer, out);
        indent(out, level + 2);
        let _ = writeln!(out, "-> ({})", namer.list(graph, graph.block_outputs(block)));
    }

    if let Some(subgraph) = &data.attrs.subgraph {
        print_graph(subgraph, "subgraph", level + 1, out);
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        print_graph(self, "graph", 0, &mut out);
        f.write_str(&out)
    }
}
