use std::collections::HashMap;

use super::*;
use crate::object::{IValue, ModuleBuilder};

fn relu_graph() -> (Graph, ValueKey, ValueKey) {
    let mut graph = Graph::new();
    let x = graph.add_named_input("x", Type::tensor());
    let y = graph.insert_op("aten::relu", &[x], Type::tensor());
    graph.register_output(y);
    (graph, x, y)
}

#[test]
fn test_builders_maintain_use_lists() {
    let (graph, x, y) = relu_graph();
    let relu = graph.producer(y);

    assert_eq!(graph.uses(x), &[Use::new(relu, 0)]);
    assert_eq!(graph.uses(y).len(), 1);
    assert_eq!(graph.uses(y)[0].user, graph.block_return(graph.root()));
    assert_eq!(graph.owning_block(relu), Some(graph.root()));
    assert!(graph.lint().is_ok());
}

#[test]
fn test_replace_all_uses_with() {
    let (mut graph, x, y) = relu_graph();
    graph.replace_all_uses_with(y, x);

    assert!(!graph.has_uses(y));
    assert_eq!(graph.outputs(), &[x]);
    assert_eq!(graph.uses(x).len(), 2);

    let relu = graph.producer(y);
    graph.destroy_node(relu);
    assert!(graph.nodes().is_empty());
    assert_eq!(graph.uses(x), &[Use::new(graph.block_return(graph.root()), 0)]);
    assert!(graph.lint().is_ok());
}

#[test]
#[should_panic]
fn test_destroy_node_with_uses_panics() {
    let (mut graph, _, y) = relu_graph();
    let relu = graph.producer(y);
    graph.destroy_node(relu);
}

#[test]
fn test_remove_node_input_shifts_offsets() {
    let mut graph = Graph::new();
    let a = graph.add_input(Type::tensor());
    let b = graph.add_input(Type::tensor());
    let c = graph.add_input(Type::tensor());
    let cat = graph.insert(NodeKind::op("aten::cat"), &[a, b, c], &[Type::tensor()]);

    graph.remove_node_input(cat, 0);
    assert_eq!(graph.node(cat).inputs(), &[b, c]);
    assert_eq!(graph.uses(b), &[Use::new(cat, 0)]);
    assert_eq!(graph.uses(c), &[Use::new(cat, 1)]);
    assert!(!graph.has_uses(a));
    assert!(graph.lint().is_ok());
}

#[test]
fn test_erase_input_renumbers() {
    let mut graph = Graph::new();
    graph.add_input(Type::Int);
    let b = graph.add_input(Type::tensor());
    graph.register_output(b);

    graph.erase_input(0);
    assert_eq!(graph.inputs(), &[b]);
    assert_eq!(graph.value(b).offset(), 0);
    assert!(graph.lint().is_ok());
}

#[test]
fn test_insert_point_after_keeps_order() {
    let (mut graph, x, y) = relu_graph();
    let relu = graph.producer(y);

    let (first, second) = graph.with_insert_point(InsertPoint::After(relu), |g| {
        let first = g.insert_op("aten::neg", &[x], Type::tensor());
        let second = g.insert_op("aten::abs", &[first], Type::tensor());
        (first, second)
    });

    let order: Vec<ValueKey> = graph.nodes().iter().map(|&n| graph.node(n).output()).collect();
    assert_eq!(order, vec![y, first, second]);
    assert_eq!(graph.insert_point(), InsertPoint::EndOf(graph.root()));
}

#[test]
fn test_enclosing_nodes_innermost_first() {
    let mut graph = Graph::new();
    let cond = graph.add_input(Type::Bool);
    let trips = graph.add_input(Type::Int);
    let outer = graph.insert_loop(trips, cond, &[]);
    let body = graph.node(outer).blocks()[0];
    let inner = graph.with_insert_point(InsertPoint::EndOf(body), |g| g.insert_if(cond, &[]));
    let then_block = graph.node(inner).blocks()[0];
    let leaf = graph.with_insert_point(InsertPoint::EndOf(then_block), |g| {
        let c = g.insert_constant(IValue::Int(1));
        g.producer(c)
    });

    assert_eq!(graph.enclosing_nodes(leaf), vec![inner, outer]);
    assert!(graph.enclosing_nodes(outer).is_empty());
    assert_eq!(graph.all_nodes(), vec![outer, inner, leaf]);
}

#[test]
fn test_destroy_node_removes_blocks() {
    let mut graph = Graph::new();
    let cond = graph.add_input(Type::Bool);
    let node_if = graph.insert_if(cond, &[]);
    let then_block = graph.node(node_if).blocks()[0];
    graph.with_insert_point(InsertPoint::EndOf(then_block), |g| {
        g.insert_op("aten::print", &[cond], Type::NoneType);
    });
    let before = graph.node_count();

    graph.destroy_node(node_if);
    assert!(!graph.has_uses(cond));
    assert!(graph.nodes().is_empty());
    // If node, print node and two blocks' param/return nodes.
    assert_eq!(graph.node_count(), before - 6);
}

#[test]
fn test_clone_preserves_keys() {
    let (graph, x, y) = relu_graph();
    let mut copy = graph.clone();
    let relu = copy.producer(y);
    copy.replace_all_uses_with(y, x);
    copy.destroy_node(relu);

    assert!(copy.nodes().is_empty());
    assert_eq!(graph.nodes().len(), 1);
    assert_eq!(graph.outputs(), &[y]);
}

#[test]
fn test_copy_node_from_copies_blocks() {
    let mut src = Graph::new();
    let cond = src.add_input(Type::Bool);
    let x = src.add_input(Type::tensor());
    let node_if = src.insert_if(cond, &[Type::tensor()]);
    let then_block = src.node(node_if).blocks()[0];
    let else_block = src.node(node_if).blocks()[1];
    let neg = src.with_insert_point(InsertPoint::EndOf(then_block), |g| {
        g.insert_op("aten::neg", &[x], Type::tensor())
    });
    src.register_block_output(then_block, neg);
    src.register_block_output(else_block, x);

    let mut dst = Graph::new();
    let dst_cond = dst.add_input(Type::Bool);
    let dst_x = dst.add_input(Type::tensor());
    let mut map = HashMap::new();
    map.insert(cond, dst_cond);
    map.insert(x, dst_x);

    let copy = dst.copy_node_from(&src, node_if, &mut map);
    dst.append_node(dst.root(), copy);
    let out = dst.node(copy).output();
    dst.register_output(out);

    assert_eq!(dst.node(copy).blocks().len(), 2);
    assert_eq!(dst.all_nodes().len(), 2);
    assert!(dst.lint().is_ok());
    assert_eq!(map[&src.node(node_if).output()], out);
}

#[test]
fn test_lint_rejects_out_of_scope_use() {
    let mut graph = Graph::new();
    let cond = graph.add_input(Type::Bool);
    let x = graph.add_input(Type::tensor());
    let node_if = graph.insert_if(cond, &[]);
    let then_block = graph.node(node_if).blocks()[0];
    let inner = graph.with_insert_point(InsertPoint::EndOf(then_block), |g| {
        g.insert_op("aten::neg", &[x], Type::tensor())
    });
    graph.register_output(inner);

    let err = graph.lint().unwrap_err();
    assert!(err.contains("outside of its scope"));
}

#[test]
fn test_lint_rejects_use_before_definition() {
    let mut graph = Graph::new();
    let x = graph.add_input(Type::tensor());
    let late = graph.create_node(NodeKind::op("aten::neg"), &[x], &[Type::tensor()]);
    let late_out = graph.node(late).output();
    graph.insert_op("aten::abs", &[late_out], Type::tensor());
    graph.append_node(graph.root(), late);

    assert!(graph.lint().is_err());
}

#[test]
fn test_fork_result_type() {
    let mut body = Graph::new();
    let a = body.add_input(Type::tensor());
    let b = body.insert_op("aten::neg", &[a], Type::tensor());
    body.register_output(b);

    let mut graph = Graph::new();
    let x = graph.add_input(Type::tensor());
    let future = graph.insert_fork(body, &[x]);
    assert_eq!(
        *graph.value_type(future),
        Type::future_of(Type::tensor())
    );
    assert!(graph.node(graph.producer(future)).attrs.subgraph.is_some());
}

#[test]
fn test_display() {
    let (graph, _, _) = relu_graph();
    let text = graph.to_string();
    assert_eq!(
        text,
        "graph(%x : Tensor):\n  %0 : Tensor = aten::relu(%x)\n  return (%0)\n"
    );
}

#[test]
fn test_display_attributes_and_blocks() {
    let module = ModuleBuilder::new("Net").attr("depth", 2i64).build();
    let mut graph = Graph::new();
    let this = graph.add_named_input("self", Type::Class(module.class().clone()));
    let cond = graph.add_named_input("cond", Type::Bool);
    let depth = graph.insert_get_attr(this, "depth", Type::Int);
    let node_if = graph.insert_if(cond, &[Type::Int]);
    let then_block = graph.node(node_if).blocks()[0];
    let else_block = graph.node(node_if).blocks()[1];
    let one = graph.with_insert_point(InsertPoint::EndOf(else_block), |g| {
        g.insert_constant(IValue::Int(1))
    });
    graph.register_block_output(then_block, depth);
    graph.register_block_output(else_block, one);
    let out = graph.node(node_if).output();
    graph.register_output(out);

    let text = graph.to_string();
    assert!(text.starts_with("graph(%self : Net, %cond : bool):\n"));
    assert!(text.contains("%0 : int = prim::GetAttr[name=\"depth\"](%self)"));
    assert!(text.contains("block0():"));
    assert!(text.contains("= prim::Constant[value=1]()"));
    assert!(text.contains("-> (%0)"));
}

#[test]
fn test_type_display() {
    assert_eq!(Type::tensor().to_string(), "Tensor");
    assert_eq!(
        Type::Tensor(TensorType::new(DType::Float32, vec![2, 3])).to_string(),
        "Float(2, 3)"
    );
    assert_eq!(Type::list_of(Type::tensor()).to_string(), "Tensor[]");
    assert_eq!(Type::list_of(Type::Int).to_string(), "int[]");
    assert_eq!(Type::future_of(Type::Int).to_string(), "Future[int]");
}

#[test]
fn test_class_types_are_nominal() {
    let a = ModuleBuilder::new("Net").build();
    let b = ModuleBuilder::new("Net").attr("w", 1i64).build();
    let c = ModuleBuilder::new("Other").build();

    assert_eq!(Type::Class(a.class().clone()), Type::Class(b.class().clone()));
    assert_ne!(Type::Class(a.class().clone()), Type::Class(c.class().clone()));
    assert!(Type::Class(a.class().clone()).is_module());
}

#[test]
fn test_source_range_display() {
    assert_eq!(SourceRange::new("net.py", 3, 9).to_string(), "net.py:3:9");
    assert_eq!(SourceRange::default().to_string(), "<unknown location>");
    assert!(SourceRange::default().is_unknown());
}
