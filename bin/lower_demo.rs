//! Lowers a small two-layer model and prints the graph before and after.
//!
//! Run with `RUST_LOG=modlower=debug` to see each visited module use.

use modlower::ir::{Graph, InsertPoint, Type};
use modlower::object::{ModuleBuilder, ObjectRef, Tensor};
use modlower::{load_slot_values, lower_graph, LowerOptions};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn module_type(module: &ObjectRef) -> Type {
    Type::Class(module.class().clone())
}

fn build_model() -> (ObjectRef, Graph) {
    let encoder = ModuleBuilder::new("Encoder")
        .attr("weight", Tensor::full(vec![8, 8], 0.02))
        .attr("bias", Tensor::zeros(vec![8]))
        .build();
    let module = ModuleBuilder::new("Model")
        .attr("encoder", encoder.clone())
        .attr("running_mean", Tensor::zeros(vec![8]))
        .attr("momentum", 0.1f64)
        .build();

    let mut graph = Graph::new();
    let this = graph.add_named_input("self", module_type(&module));
    let x = graph.add_named_input("x", Type::tensor());
    let training = graph.add_named_input("training", Type::Bool);

    let enc = graph.insert_get_attr(this, "encoder", module_type(&encoder));
    let w = graph.insert_get_attr(enc, "weight", Type::tensor());
    let b = graph.insert_get_attr(enc, "bias", Type::tensor());
    let mm = graph.insert_op("aten::matmul", &[x, w], Type::tensor());
    let h = graph.insert_op("aten::add", &[mm, b], Type::tensor());

    // Running statistics are only updated while training.
    let node_if = graph.insert_if(training, &[]);
    let then_block = graph.node(node_if).blocks()[0];
    graph.with_insert_point(InsertPoint::EndOf(then_block), |g| {
        let momentum = g.insert_get_attr(this, "momentum", Type::Float);
        let mean = g.insert_op("aten::mean", &[h], Type::tensor());
        let scaled = g.insert_op("aten::mul", &[mean, momentum], Type::tensor());
        g.insert_set_attr(this, "running_mean", scaled);
    });

    let mean = graph.insert_get_attr(this, "running_mean", Type::tensor());
    let out = graph.insert_op("aten::sub", &[h, mean], Type::tensor());
    graph.register_output(out);
    (module, graph)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let (module, graph) = build_model();
    println!("{}", graph);

    let lowered = match lower_graph(&graph, &module, &LowerOptions::default()) {
        Ok(lowered) => lowered,
        Err(err) => {
            error!("lowering failed: {}", err);
            std::process::exit(1);
        }
    };
    for warning in &lowered.warnings {
        info!("{}", warning);
    }
    println!("{}", lowered.graph);

    match load_slot_values(&lowered.slots) {
        Ok(values) => {
            let mut values = values.iter();
            for input in &lowered.slots {
                for value in values.by_ref().take(input.width()) {
                    println!("{} = {:?}", input, value);
                }
            }
        }
        Err(err) => error!("loading slot values failed: {}", err),
    }
}
