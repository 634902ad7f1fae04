use tracing::trace;

use crate::ir::{BlockKey, Graph, NodeKind, Type};

const INPLACE_TO_OUT_OF_PLACE: [(&str, &str); 4] = [
    ("aten::add_", "aten::add"),
    ("aten::sub_", "aten::sub"),
    ("aten::mul_", "aten::mul"),
    ("aten::div_", "aten::div"),
];

fn out_of_place(name: &str) -> Option<&'static str> {
    INPLACE_TO_OUT_OF_PLACE
        .iter()
        .find(|(inplace, _)| *inplace == name)
        .map(|(_, functional)| *functional)
}

/// Rewrites in-place arithmetic into out-of-place operators.
///
/// `%y = aten::add_(%x, %n)` becomes `%y.1 = aten::add(%x, %n)` and every
/// use of `%y` is redirected. Only sound when `%x` is not aliased.
pub fn remove_inplace_ops(graph: &mut Graph) {
    let root = graph.root();
    remove_in_block(graph, root);
}

fn remove_in_block(graph: &mut Graph, block: BlockKey) {
    let nodes = graph.block_nodes(block).to_vec();
    for node in nodes {
        let blocks = graph.node(node).blocks().to_vec();
        for child in blocks {
            remove_in_block(graph, child);
        }

        let replacement_kind = match graph.node(node).kind() {
            NodeKind::Op(name) => match out_of_place(name) {
                Some(functional) => NodeKind::op(functional),
                None => continue,
            },
            _ => continue,
        };
        trace!(op = %graph.node(node).kind(), "removing in-place op");

        let data = graph.node(node);
        let inputs = data.inputs().to_vec();
        let outputs = data.outputs().to_vec();
        let source = data.source.clone();
        let output_types: Vec<Type> = outputs
            .iter()
            .map(|&v| graph.value_type(v).clone())
            .collect();

        let replacement = graph.create_node(replacement_kind, &inputs, &output_types);
        graph.node_mut(replacement).source = source;
        graph.insert_before(replacement, node);

        let new_outputs = graph.node(replacement).outputs().to_vec();
        for (old, new) in outputs.into_iter().zip(new_outputs) {
            if let Some(name) = graph.value(old).debug_name().map(str::to_string) {
                graph.set_debug_name(new, name);
            }
            graph.replace_all_uses_with(old, new);
        }
        graph.destroy_node(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::InsertPoint;

    #[test]
    fn test_replaces_inplace_add() {
        let mut graph = Graph::new();
        let x = graph.add_input(Type::tensor());
        let y = graph.add_input(Type::tensor());
        let added = graph.insert_op("aten::add_", &[x, y], Type::tensor());
        let relu = graph.insert_op("aten::relu", &[added], Type::tensor());
        graph.register_output(relu);

        remove_inplace_ops(&mut graph);

        let first = graph.nodes()[0];
        assert_eq!(*graph.node(first).kind(), NodeKind::op("aten::add"));
        assert_eq!(graph.node(first).inputs(), &[x, y]);
        let second = graph.nodes()[1];
        assert_eq!(graph.node(second).input(0), graph.node(first).output());
        assert!(graph.lint().is_ok());
    }

    #[test]
    fn test_leaves_other_ops() {
        let mut graph = Graph::new();
        let x = graph.add_input(Type::tensor());
        let out = graph.insert_op("aten::relu_", &[x], Type::tensor());
        graph.register_output(out);

        remove_inplace_ops(&mut graph);
        assert_eq!(
            *graph.node(graph.nodes()[0]).kind(),
            NodeKind::op("aten::relu_")
        );
    }

    #[test]
    fn test_rewrites_nested_blocks() {
        let mut graph = Graph::new();
        let x = graph.add_input(Type::tensor());
        let cond = graph.add_input(Type::Bool);
        let node_if = graph.insert_if(cond, &[Type::tensor()]);
        let then_block = graph.node(node_if).blocks()[0];
        let else_block = graph.node(node_if).blocks()[1];
        let scaled = graph.with_insert_point(InsertPoint::EndOf(then_block), |g| {
            g.insert_op("aten::mul_", &[x, x], Type::tensor())
        });
        graph.register_block_output(then_block, scaled);
        graph.register_block_output(else_block, x);
        let out = graph.node(node_if).output();
        graph.register_output(out);

        remove_inplace_ops(&mut graph);

        let inner = graph.block_nodes(then_block)[0];
        assert_eq!(*graph.node(inner).kind(), NodeKind::op("aten::mul"));
        assert_eq!(graph.block_outputs(then_block), &[graph.node(inner).output()]);
        assert!(graph.lint().is_ok());
    }
}
