use slotmap::SecondaryMap;
use tracing::{debug, trace, warn};

use crate::config::LowerOptions;
use crate::error::{LowerError, LowerWarning, Result};
use crate::ir::{Graph, NodeKey, NodeKind, SourceRange, Type, ValueKey};
use crate::object::{IValue, ObjectRef};
use crate::passes::inliner::inline_calls;

use super::slot::{ExtraInput, Slot, SlotTable};

/// A pending use of a module value: `node.inputs[offset]` refers to `object`.
#[derive(Clone, Debug)]
struct WorklistItem {
    object: ObjectRef,
    node: NodeKey,
    offset: usize,
}

/// A slot access found while resolving module uses. Accesses are applied in
/// program order after every module use has been resolved, so a read sees
/// exactly the writes that precede it.
#[derive(Debug)]
enum Access {
    Read { node: NodeKey, slot: Slot },
    Write { node: NodeKey, slot: Slot },
    Fork(WorklistItem),
}

impl Access {
    fn node(&self) -> NodeKey {
        match self {
            Access::Read { node, .. } | Access::Write { node, .. } => *node,
            Access::Fork(item) => item.node,
        }
    }

    /// Orders several module arguments of one fork by input position.
    fn offset(&self) -> usize {
        match self {
            Access::Fork(item) => item.offset,
            _ => 0,
        }
    }
}

/// Result of lowering one graph, before slots are exposed to callers.
pub(crate) struct Lowered {
    pub graph: Graph,
    pub extra: Vec<ExtraInput>,
    pub warnings: Vec<LowerWarning>,
}

/// Lowers `graph` in place of its owner. `depth` counts enclosing forks.
pub(crate) fn lower_owned(
    mut graph: Graph,
    module: &ObjectRef,
    self_offset: usize,
    options: &LowerOptions,
    depth: usize,
) -> Result<Lowered> {
    if depth > options.max_fork_depth {
        return Err(LowerError::ForkDepthExceeded {
            limit: options.max_fork_depth,
        });
    }

    if options.inline {
        inline_calls(&mut graph, options.max_inline_depth)?;
    }

    let self_value = check_self_input(&graph, module, self_offset)?;

    let mut lowering = Lowering {
        graph,
        options,
        depth,
        slots: SlotTable::new(),
        worklist: Vec::new(),
        accesses: Vec::new(),
        to_clean: Vec::new(),
        warnings: Vec::new(),
    };
    lowering.push_uses(self_value, module);
    lowering.run()?;
    lowering.apply_accesses()?;
    lowering.cleanup(self_value, self_offset)?;

    let Lowering {
        graph,
        slots,
        warnings,
        ..
    } = lowering;
    Ok(Lowered {
        graph,
        extra: slots.into_extra_inputs(),
        warnings,
    })
}

fn check_self_input(graph: &Graph, module: &ObjectRef, offset: usize) -> Result<ValueKey> {
    let invalid = |reason: String| LowerError::InvalidSelfInput { offset, reason };

    let Some(&value) = graph.inputs().get(offset) else {
        return Err(invalid(format!(
            "the graph has only {} inputs",
            graph.inputs().len()
        )));
    };
    let ty = graph.value_type(value);
    match ty.as_class() {
        Some(class) if class.is_module() => {
            if class.name() != module.class().name() {
                return Err(invalid(format!(
                    "the graph expects `{}` but the module is `{}`",
                    class.name(),
                    module.class().name()
                )));
            }
            Ok(value)
        }
        _ => Err(invalid(format!("`{}` is not a module type", ty))),
    }
}

struct Lowering<'a> {
    graph: Graph,
    options: &'a LowerOptions,
    depth: usize,
    slots: SlotTable,
    worklist: Vec<WorklistItem>,
    accesses: Vec<Access>,
    /// Module-valued reads, deleted once every use is gone.
    to_clean: Vec<NodeKey>,
    warnings: Vec<LowerWarning>,
}

impl Lowering<'_> {
    /// Schedules every use of `value`. Uses are pushed in reverse so the
    /// first use is visited first.
    fn push_uses(&mut self, value: ValueKey, object: &ObjectRef) {
        for entry in self.graph.uses(value).iter().rev() {
            self.worklist.push(WorklistItem {
                object: object.clone(),
                node: entry.user,
                offset: entry.offset,
            });
        }
    }

    fn run(&mut self) -> Result<()> {
        while let Some(item) = self.worklist.pop() {
            if !self.graph.contains_node(item.node) {
                return Err(LowerError::InternalInvariantViolation(
                    "a scheduled module use refers to a deleted node".to_string(),
                ));
            }

            let kind = self.graph.node(item.node).kind().clone();
            debug!(
                node = %kind,
                offset = item.offset,
                module = item.object.class().name(),
                depth = self.depth,
                "visiting module use"
            );

            match kind {
                NodeKind::GetAttr => self.visit_get_attr(item)?,
                NodeKind::SetAttr if item.offset == 0 => self.visit_set_attr(item)?,
                NodeKind::Fork => self.accesses.push(Access::Fork(item)),
                NodeKind::PythonOp => {
                    let data = self.graph.node(item.node);
                    return Err(LowerError::UnexportableCall {
                        name: data.name().unwrap_or("<unnamed>").to_string(),
                        source_range: data.source.clone(),
                    });
                }
                kind => {
                    return Err(LowerError::UnsupportedOperation {
                        kind,
                        source_range: self.source(item.node),
                    })
                }
            }
        }
        Ok(())
    }

    fn source(&self, node: NodeKey) -> SourceRange {
        self.graph.node(node).source.clone()
    }

    /// Slot named by the `name` attribute of an attribute access.
    fn attribute_slot(&self, object: &ObjectRef, node: NodeKey) -> Result<Slot> {
        let data = self.graph.node(node);
        let name = data.name().ok_or_else(|| LowerError::MalformedNode {
            kind: data.kind().clone(),
            reason: "attribute access without a name",
            source_range: data.source.clone(),
        })?;
        let offset =
            object
                .class()
                .attribute_slot(name)
                .ok_or_else(|| LowerError::UnknownAttribute {
                    class: object.class().name().to_string(),
                    name: name.to_string(),
                    source_range: data.source.clone(),
                })?;
        Ok(Slot::new(object.clone(), offset))
    }

    fn visit_get_attr(&mut self, item: WorklistItem) -> Result<()> {
        let slot = self.attribute_slot(&item.object, item.node)?;
        let output = self.graph.node(item.node).output();
        let reads_module = self.graph.value_type(output).is_module();

        match slot.content() {
            IValue::Object(nested) if reads_module || nested.class().is_module() => {
                trace!(slot = %slot, "descending into submodule");
                self.push_uses(output, &nested);
                self.to_clean.push(item.node);
            }
            _ if reads_module => {
                return Err(LowerError::MalformedNode {
                    kind: NodeKind::GetAttr,
                    reason: "attribute typed as a module does not hold an object",
                    source_range: self.source(item.node),
                });
            }
            _ => self.accesses.push(Access::Read {
                node: item.node,
                slot,
            }),
        }
        Ok(())
    }

    fn visit_set_attr(&mut self, item: WorklistItem) -> Result<()> {
        let slot = self.attribute_slot(&item.object, item.node)?;
        self.written_value(item.node)?;
        self.accesses.push(Access::Write {
            node: item.node,
            slot,
        });
        Ok(())
    }

    /// The value stored by an attribute write, which must not be a module.
    fn written_value(&self, node: NodeKey) -> Result<ValueKey> {
        let data = self.graph.node(node);
        let &value = data
            .inputs()
            .get(1)
            .ok_or_else(|| LowerError::MalformedNode {
                kind: NodeKind::SetAttr,
                reason: "attribute write without a value",
                source_range: data.source.clone(),
            })?;
        if self.graph.value_type(value).is_module() {
            return Err(LowerError::UnsupportedOperation {
                kind: NodeKind::SetAttr,
                source_range: data.source.clone(),
            });
        }
        Ok(value)
    }

    /// Applies the collected slot accesses in program order.
    fn apply_accesses(&mut self) -> Result<()> {
        let mut position = SecondaryMap::new();
        for (index, node) in self.graph.all_nodes().into_iter().enumerate() {
            position.insert(node, index);
        }

        let mut ordered = Vec::with_capacity(self.accesses.len());
        for access in std::mem::take(&mut self.accesses) {
            let Some(&index) = position.get(access.node()) else {
                return Err(LowerError::InternalInvariantViolation(
                    "a slot access refers to a node outside the graph".to_string(),
                ));
            };
            ordered.push((index, access));
        }
        ordered.sort_by_key(|(index, access)| (*index, access.offset()));
        ordered.reverse();

        while let Some((_, access)) = ordered.pop() {
            match access {
                Access::Read { node, slot } => self.apply_read(node, &slot)?,
                Access::Write { node, slot } => self.apply_write(node, slot)?,
                Access::Fork(item) => {
                    self.visit_fork(&item)?;
                    for (_, pending) in &mut ordered {
                        if let Access::Fork(other) = pending {
                            if other.node == item.node && other.offset > item.offset {
                                other.offset -= 1;
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn apply_read(&mut self, node: NodeKey, slot: &Slot) -> Result<()> {
        let value = self.slots.get_or_add_slot(&mut self.graph, slot)?;
        let output = self.graph.node(node).output();
        trace!(slot = %slot, "resolved attribute read");
        self.graph.replace_all_uses_with(output, value);
        self.graph.destroy_node(node);
        Ok(())
    }

    fn apply_write(&mut self, node: NodeKey, slot: Slot) -> Result<()> {
        let value = self.written_value(node)?;
        let conditional = self
            .graph
            .enclosing_nodes(node)
            .into_iter()
            .any(|owner| self.graph.node(owner).kind().is_control_flow());

        if conditional {
            let source_range = self.source(node);
            warn!(
                slot = %slot,
                location = %source_range,
                "dropping attribute write inside a conditional branch"
            );
            self.warnings
                .push(LowerWarning::UnsupportedConditionalMutation {
                    attribute: slot.attribute_name().to_string(),
                    source_range,
                });
        } else {
            debug!(slot = %slot, "tracking attribute write");
            self.slots.record_write(slot, value);
        }

        self.graph.destroy_node(node);
        Ok(())
    }

    /// Lowers the fork body against the module it receives, then threads the
    /// body's slots in as extra fork arguments.
    fn visit_fork(&mut self, item: &WorklistItem) -> Result<()> {
        let fork = item.node;
        let subgraph = self
            .graph
            .node_mut(fork)
            .attrs
            .subgraph
            .take()
            .ok_or_else(|| LowerError::MalformedNode {
                kind: NodeKind::Fork,
                reason: "fork without a subgraph",
                source_range: self.source(fork),
            })?;

        let lowered = lower_owned(
            *subgraph,
            &item.object,
            item.offset,
            self.options,
            self.depth + 1,
        )?;
        self.warnings.extend(lowered.warnings);
        self.graph.node_mut(fork).attrs.subgraph = Some(Box::new(lowered.graph));

        for extra in &lowered.extra {
            let value = self.slots.get_or_add_slot(&mut self.graph, &extra.slot)?;
            match extra.list_len {
                Some(len) => {
                    for element in self.list_elements(value, len, fork) {
                        self.graph.add_node_input(fork, element);
                    }
                }
                None => {
                    self.graph.add_node_input(fork, value);
                }
            }
        }
        debug!(
            slots = lowered.extra.len(),
            depth = self.depth,
            "lowered fork body"
        );

        self.graph.remove_node_input(fork, item.offset);
        Ok(())
    }

    /// Element values of the list `value`, as seen just before `user`.
    fn list_elements(&mut self, value: ValueKey, len: usize, user: NodeKey) -> Vec<ValueKey> {
        let producer = self.graph.node(self.graph.producer(value));
        if *producer.kind() == NodeKind::ListConstruct && producer.inputs().len() == len {
            return producer.inputs().to_vec();
        }

        let element_type = self
            .graph
            .value_type(value)
            .list_element()
            .cloned()
            .unwrap_or_else(Type::tensor);
        let unpack = self
            .graph
            .create_node(NodeKind::ListUnpack, &[value], &vec![element_type; len]);
        self.graph.insert_before(unpack, user);
        self.graph.node(unpack).outputs().to_vec()
    }

    fn cleanup(&mut self, self_value: ValueKey, self_offset: usize) -> Result<()> {
        while let Some(node) = self.to_clean.pop() {
            let output = self.graph.node(node).output();
            if self.graph.has_uses(output) {
                return Err(LowerError::InternalInvariantViolation(format!(
                    "submodule read `{}` still has {} uses after lowering",
                    self.graph.node(node).name().unwrap_or("<unnamed>"),
                    self.graph.uses(output).len()
                )));
            }
            trace!(
                attribute = self.graph.node(node).name().unwrap_or("<unnamed>"),
                "removing submodule read"
            );
            self.graph.destroy_node(node);
        }

        if self.graph.inputs().get(self_offset) != Some(&self_value) {
            return Err(LowerError::InternalInvariantViolation(
                "the module input moved during lowering".to_string(),
            ));
        }
        if self.graph.has_uses(self_value) {
            return Err(LowerError::InternalInvariantViolation(format!(
                "the module input still has {} uses after lowering",
                self.graph.uses(self_value).len()
            )));
        }
        self.graph.erase_input(self_offset);

        self.graph
            .lint()
            .map_err(|err| LowerError::InternalInvariantViolation(format!("lowered graph: {}", err)))
    }
}
