use std::collections::HashMap;

use tracing::debug;

use crate::error::{LowerError, Result};
use crate::ir::{Graph, NodeKey, NodeKind};

/// Replaces every `Call` node in `graph` by a copy of its callee's body.
///
/// Calls exposed by inlining are inlined in turn, up to `max_depth` levels
/// of nesting. Fork subgraphs are left alone; they are separate graphs.
pub fn inline_calls(graph: &mut Graph, max_depth: usize) -> Result<()> {
    let nodes = graph.nodes().to_vec();
    inline_nodes(graph, nodes, 0, max_depth)
}

fn inline_nodes(
    graph: &mut Graph,
    nodes: Vec<NodeKey>,
    depth: usize,
    max_depth: usize,
) -> Result<()> {
    for node in nodes {
        if *graph.node(node).kind() == NodeKind::Call {
            if depth >= max_depth {
                let data = graph.node(node);
                return Err(LowerError::InlineDepthExceeded {
                    function: data
                        .attrs
                        .function
                        .as_ref()
                        .map_or_else(|| "<unknown>".to_string(), |f| f.name().to_string()),
                    limit: max_depth,
                    source_range: data.source.clone(),
                });
            }
            let inserted = inline_call(graph, node)?;
            inline_nodes(graph, inserted, depth + 1, max_depth)?;
        } else {
            let blocks = graph.node(node).blocks().to_vec();
            for block in blocks {
                let inner = graph.block_nodes(block).to_vec();
                inline_nodes(graph, inner, depth, max_depth)?;
            }
        }
    }
    Ok(())
}

/// Splices the callee of `call` in front of it and removes the call.
/// Returns the spliced nodes in program order.
fn inline_call(graph: &mut Graph, call: NodeKey) -> Result<Vec<NodeKey>> {
    let data = graph.node(call);
    let malformed = |reason| LowerError::MalformedNode {
        kind: NodeKind::Call,
        reason,
        source_range: data.source.clone(),
    };

    let function = data
        .attrs
        .function
        .clone()
        .ok_or_else(|| malformed("call has no function attached"))?;
    let callee = function.graph();
    if callee.inputs().len() != data.inputs().len() {
        return Err(malformed("argument count does not match the function's inputs"));
    }
    if callee.outputs().len() != data.outputs().len() {
        return Err(malformed("output count does not match the function's outputs"));
    }

    debug!(function = function.name(), "inlining call");

    let mut value_map: HashMap<_, _> = callee
        .inputs()
        .iter()
        .copied()
        .zip(data.inputs().iter().copied())
        .collect();
    let call_outputs = data.outputs().to_vec();

    let mut inserted = Vec::with_capacity(callee.nodes().len());
    for &inner in callee.nodes() {
        let copy = graph.copy_node_from(callee, inner, &mut value_map);
        graph.insert_before(copy, call);
        inserted.push(copy);
    }

    for (&output, callee_output) in call_outputs.iter().zip(callee.outputs()) {
        let replacement = value_map[callee_output];
        graph.replace_all_uses_with(output, replacement);
    }
    graph.destroy_node(call);

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Type;
    use crate::object::Function;

    fn add_function() -> std::sync::Arc<Function> {
        let mut body = Graph::new();
        let a = body.add_named_input("a", Type::tensor());
        let b = body.add_named_input("b", Type::tensor());
        let sum = body.insert_op("aten::add", &[a, b], Type::tensor());
        body.register_output(sum);
        Function::new("add", body)
    }

    #[test]
    fn test_inline_single_call() {
        let mut graph = Graph::new();
        let x = graph.add_input(Type::tensor());
        let call = graph.insert_call(add_function(), &[x, x]);
        let out = graph.node(call).output();
        let relu = graph.insert_op("aten::relu", &[out], Type::tensor());
        graph.register_output(relu);

        assert!(inline_calls(&mut graph, 8).is_ok());
        assert!(!graph.contains_node(call));
        assert!(graph.lint().is_ok());

        let kinds: Vec<String> = graph
            .nodes()
            .iter()
            .map(|&n| graph.node(n).kind().to_string())
            .collect();
        assert_eq!(kinds, vec!["aten::add", "aten::relu"]);

        let add = graph.nodes()[0];
        assert_eq!(graph.node(add).inputs(), &[x, x]);
    }

    #[test]
    fn test_inline_nested_calls() {
        let inner = add_function();
        let mut outer_body = Graph::new();
        let a = outer_body.add_input(Type::tensor());
        let call = outer_body.insert_call(inner, &[a, a]);
        let out = outer_body.node(call).output();
        outer_body.register_output(out);
        let outer = Function::new("double", outer_body);

        let mut graph = Graph::new();
        let x = graph.add_input(Type::tensor());
        let call = graph.insert_call(outer, &[x]);
        let out = graph.node(call).output();
        graph.register_output(out);

        assert!(inline_calls(&mut graph, 8).is_ok());
        assert_eq!(graph.nodes().len(), 1);
        assert_eq!(
            *graph.node(graph.nodes()[0]).kind(),
            NodeKind::op("aten::add")
        );
        assert!(graph.lint().is_ok());
    }

    #[test]
    fn test_inline_inside_if_block() {
        let mut graph = Graph::new();
        let x = graph.add_input(Type::tensor());
        let cond = graph.add_input(Type::Bool);
        let node_if = graph.insert_if(cond, &[Type::tensor()]);
        let then_block = graph.node(node_if).blocks()[0];
        let else_block = graph.node(node_if).blocks()[1];

        let inner = graph.with_insert_point(crate::ir::InsertPoint::EndOf(then_block), |g| {
            g.insert_call(add_function(), &[x, x])
        });
        let inner_out = graph.node(inner).output();
        graph.register_block_output(then_block, inner_out);
        graph.register_block_output(else_block, x);
        let out = graph.node(node_if).output();
        graph.register_output(out);

        assert!(inline_calls(&mut graph, 8).is_ok());
        let then_nodes = graph.block_nodes(then_block);
        assert_eq!(then_nodes.len(), 1);
        assert_eq!(*graph.node(then_nodes[0]).kind(), NodeKind::op("aten::add"));
        assert!(graph.lint().is_ok());
    }

    #[test]
    fn test_inline_depth_limit() {
        let mut graph = Graph::new();
        let x = graph.add_input(Type::tensor());
        graph.insert_call(add_function(), &[x, x]);

        let result = inline_calls(&mut graph, 0);
        assert!(matches!(
            result,
            Err(LowerError::InlineDepthExceeded { limit: 0, .. })
        ));
    }

    #[test]
    fn test_inline_argument_mismatch() {
        let mut graph = Graph::new();
        let x = graph.add_input(Type::tensor());
        graph.insert_call(add_function(), &[x]);

        assert!(matches!(
            inline_calls(&mut graph, 8),
            Err(LowerError::MalformedNode { .. })
        ));
    }
}
