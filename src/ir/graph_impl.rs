use std::collections::{HashMap, HashSet};
use std::fmt;
use std::mem;
use std::sync::Arc;

use arrayvec::ArrayVec;
use slotmap::SlotMap;

use crate::object::{Function, IValue};

use super::types::{
    BlockKey, InsertPoint, NodeAttrs, NodeKey, NodeKind, SourceRange, Type, Use, ValueKey,
    MAX_NODE_BLOCKS,
};

#[derive(Clone)]
pub struct NodeData {
    kind: NodeKind,
    inputs: Vec<ValueKey>,
    outputs: Vec<ValueKey>,
    blocks: ArrayVec<BlockKey, MAX_NODE_BLOCKS>,
    owning_block: Option<BlockKey>,
    pub attrs: NodeAttrs,
    pub source: SourceRange,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
            blocks: ArrayVec::new(),
            owning_block: None,
            attrs: NodeAttrs::default(),
            source: SourceRange::default(),
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn inputs(&self) -> &[ValueKey] {
        &self.inputs
    }

    pub fn input(&self, offset: usize) -> ValueKey {
        self.inputs[offset]
    }

    pub fn outputs(&self) -> &[ValueKey] {
        &self.outputs
    }

    /// The single output of a node. Panics if the node has none.
    pub fn output(&self) -> ValueKey {
        self.outputs[0]
    }

    pub fn blocks(&self) -> &[BlockKey] {
        &self.blocks
    }

    pub fn owning_block(&self) -> Option<BlockKey> {
        self.owning_block
    }

    /// The `name` attribute, if any.
    pub fn name(&self) -> Option<&str> {
        self.attrs.name.as_deref()
    }
}

impl fmt::Debug for NodeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeData")
            .field("kind", &self.kind)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("blocks", &self.blocks)
            .field("name", &self.attrs.name)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct ValueData {
    ty: Type,
    node: NodeKey,
    offset: usize,
    uses: Vec<Use>,
    debug_name: Option<String>,
}

impl ValueData {
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// The node producing this value (a `Param` node for block inputs).
    pub fn node(&self) -> NodeKey {
        self.node
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn uses(&self) -> &[Use] {
        &self.uses
    }

    pub fn debug_name(&self) -> Option<&str> {
        self.debug_name.as_deref()
    }
}

#[derive(Clone, Debug)]
pub struct BlockData {
    param: NodeKey,
    ret: NodeKey,
    nodes: Vec<NodeKey>,
    owning_node: Option<NodeKey>,
}

/// Dataflow graph with nested blocks.
///
/// Nodes, values and blocks live in arenas owned by the graph. Cloning a
/// graph copies every arena, so keys stay valid across the copy and refer to
/// the corresponding entities of the clone.
#[derive(Clone, Debug)]
pub struct Graph {
    nodes: SlotMap<NodeKey, NodeData>,
    values: SlotMap<ValueKey, ValueData>,
    blocks: SlotMap<BlockKey, BlockData>,
    root: BlockKey,
    insert_point: InsertPoint,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        let mut graph = Self {
            nodes: SlotMap::with_key(),
            values: SlotMap::with_key(),
            blocks: SlotMap::with_key(),
            root: BlockKey::default(),
            insert_point: InsertPoint::EndOf(BlockKey::default()),
        };
        let root = graph.new_block(None);
        graph.root = root;
        graph.insert_point = InsertPoint::EndOf(root);
        graph
    }

    fn new_block(&mut self, owning_node: Option<NodeKey>) -> BlockKey {
        let param = self.nodes.insert(NodeData::new(NodeKind::Param));
        let ret = self.nodes.insert(NodeData::new(NodeKind::Return));
        let block = self.blocks.insert(BlockData {
            param,
            ret,
            nodes: Vec::new(),
            owning_node,
        });
        self.nodes[param].owning_block = Some(block);
        self.nodes[ret].owning_block = Some(block);
        block
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn root(&self) -> BlockKey {
        self.root
    }

    pub fn node(&self, node: NodeKey) -> &NodeData {
        &self.nodes[node]
    }

    pub fn node_mut(&mut self, node: NodeKey) -> &mut NodeData {
        &mut self.nodes[node]
    }

    pub fn contains_node(&self, node: NodeKey) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn value(&self, value: ValueKey) -> &ValueData {
        &self.values[value]
    }

    pub fn value_type(&self, value: ValueKey) -> &Type {
        &self.values[value].ty
    }

    pub fn set_value_type(&mut self, value: ValueKey, ty: Type) {
        self.values[value].ty = ty;
    }

    pub fn set_debug_name(&mut self, value: ValueKey, name: impl Into<String>) {
        self.values[value].debug_name = Some(name.into());
    }

    pub fn uses(&self, value: ValueKey) -> &[Use] {
        &self.values[value].uses
    }

    pub fn has_uses(&self, value: ValueKey) -> bool {
        !self.values[value].uses.is_empty()
    }

    pub fn producer(&self, value: ValueKey) -> NodeKey {
        self.values[value].node
    }

    /// Formal inputs of the graph.
    pub fn inputs(&self) -> &[ValueKey] {
        self.block_inputs(self.root)
    }

    pub fn outputs(&self) -> &[ValueKey] {
        self.block_outputs(self.root)
    }

    /// Top-level nodes in program order.
    pub fn nodes(&self) -> &[NodeKey] {
        self.block_nodes(self.root)
    }

    pub fn block_nodes(&self, block: BlockKey) -> &[NodeKey] {
        &self.blocks[block].nodes
    }

    pub fn block_inputs(&self, block: BlockKey) -> &[ValueKey] {
        &self.nodes[self.blocks[block].param].outputs
    }

    pub fn block_outputs(&self, block: BlockKey) -> &[ValueKey] {
        &self.nodes[self.blocks[block].ret].inputs
    }

    pub fn block_param(&self, block: BlockKey) -> NodeKey {
        self.blocks[block].param
    }

    pub fn block_return(&self, block: BlockKey) -> NodeKey {
        self.blocks[block].ret
    }

    pub fn block_owning_node(&self, block: BlockKey) -> Option<NodeKey> {
        self.blocks[block].owning_node
    }

    pub fn owning_block(&self, node: NodeKey) -> Option<BlockKey> {
        self.nodes[node].owning_block
    }

    /// Nodes owning the blocks that enclose `node`, innermost first.
    pub fn enclosing_nodes(&self, node: NodeKey) -> Vec<NodeKey> {
        let mut chain = Vec::new();
        let mut block = self.nodes[node].owning_block;
        while let Some(current) = block {
            match self.blocks[current].owning_node {
                Some(owner) => {
                    chain.push(owner);
                    block = self.nodes[owner].owning_block;
                }
                None => break,
            }
        }
        chain
    }

    /// Number of live nodes, including block parameter and return nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All nodes of the graph in program order, descending into blocks.
    pub fn all_nodes(&self) -> Vec<NodeKey> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.collect_block_nodes(self.root, &mut out);
        out
    }

    fn collect_block_nodes(&self, block: BlockKey, out: &mut Vec<NodeKey>) {
        for &node in &self.blocks[block].nodes {
            out.push(node);
            for &child in &self.nodes[node].blocks {
                self.collect_block_nodes(child, out);
            }
        }
    }

    // ------------------------------------------------------------------
    // Node creation and placement
    // ------------------------------------------------------------------

    /// Creates a detached node. Use one of the insertion methods to place it.
    pub fn create_node(
        &mut self,
        kind: NodeKind,
        inputs: &[ValueKey],
        output_types: &[Type],
    ) -> NodeKey {
        let node = self.nodes.insert(NodeData::new(kind));
        for &input in inputs {
            self.add_node_input(node, input);
        }
        for ty in output_types {
            self.add_node_output(node, ty.clone());
        }
        node
    }

    pub fn add_node_output(&mut self, node: NodeKey, ty: Type) -> ValueKey {
        let offset = self.nodes[node].outputs.len();
        let value = self.values.insert(ValueData {
            ty,
            node,
            offset,
            uses: Vec::new(),
            debug_name: None,
        });
        self.nodes[node].outputs.push(value);
        value
    }

    /// Appends `value` to the inputs of `node`, returning its offset.
    pub fn add_node_input(&mut self, node: NodeKey, value: ValueKey) -> usize {
        let offset = self.nodes[node].inputs.len();
        self.nodes[node].inputs.push(value);
        self.values[value].uses.push(Use::new(node, offset));
        offset
    }

    /// Removes input `offset` of `node`, shifting the later inputs down.
    pub fn remove_node_input(&mut self, node: NodeKey, offset: usize) {
        let removed = self.nodes[node].inputs.remove(offset);
        self.drop_use(removed, Use::new(node, offset));

        let inputs = &self.nodes[node].inputs;
        for (idx, &value) in inputs.iter().enumerate().skip(offset) {
            let uses = &mut self.values[value].uses;
            if let Some(entry) = uses
                .iter_mut()
                .find(|u| u.user == node && u.offset == idx + 1)
            {
                entry.offset = idx;
            }
        }
    }

    pub fn replace_node_input(&mut self, node: NodeKey, offset: usize, value: ValueKey) {
        let previous = self.nodes[node].inputs[offset];
        if previous == value {
            return;
        }
        self.drop_use(previous, Use::new(node, offset));
        self.nodes[node].inputs[offset] = value;
        self.values[value].uses.push(Use::new(node, offset));
    }

    fn drop_use(&mut self, value: ValueKey, entry: Use) {
        let uses = &mut self.values[value].uses;
        if let Some(pos) = uses.iter().position(|u| *u == entry) {
            uses.remove(pos);
        }
    }

    pub fn replace_all_uses_with(&mut self, from: ValueKey, to: ValueKey) {
        if from == to {
            return;
        }
        let uses = mem::take(&mut self.values[from].uses);
        for entry in &uses {
            self.nodes[entry.user].inputs[entry.offset] = to;
        }
        self.values[to].uses.extend(uses);
    }

    /// Adds a sub-block owned by `node`.
    pub fn add_block(&mut self, node: NodeKey) -> BlockKey {
        let block = self.new_block(Some(node));
        self.nodes[node].blocks.push(block);
        block
    }

    pub fn add_block_input(&mut self, block: BlockKey, ty: Type) -> ValueKey {
        let param = self.blocks[block].param;
        self.add_node_output(param, ty)
    }

    pub fn register_block_output(&mut self, block: BlockKey, value: ValueKey) -> usize {
        let ret = self.blocks[block].ret;
        self.add_node_input(ret, value)
    }

    pub fn add_input(&mut self, ty: Type) -> ValueKey {
        self.add_block_input(self.root, ty)
    }

    pub fn add_named_input(&mut self, name: &str, ty: Type) -> ValueKey {
        let value = self.add_input(ty);
        self.set_debug_name(value, name);
        value
    }

    pub fn register_output(&mut self, value: ValueKey) -> usize {
        self.register_block_output(self.root, value)
    }

    /// Erases formal input `index`. The input must have no uses.
    pub fn erase_input(&mut self, index: usize) {
        self.erase_block_input(self.root, index);
    }

    pub fn erase_block_input(&mut self, block: BlockKey, index: usize) {
        let param = self.blocks[block].param;
        let value = self.nodes[param].outputs[index];
        assert!(
            self.values[value].uses.is_empty(),
            "cannot erase block input {} while it still has uses",
            index
        );
        self.nodes[param].outputs.remove(index);
        self.values.remove(value);
        let outputs = &self.nodes[param].outputs;
        for (idx, &value) in outputs.iter().enumerate().skip(index) {
            self.values[value].offset = idx;
        }
    }

    fn attach(&mut self, node: NodeKey, block: BlockKey, position: usize) {
        assert!(
            self.nodes[node].owning_block.is_none(),
            "node `{}` is already placed in a block",
            self.nodes[node].kind
        );
        self.blocks[block].nodes.insert(position, node);
        self.nodes[node].owning_block = Some(block);
    }

    fn position_in_block(&self, node: NodeKey) -> (BlockKey, usize) {
        let block = self.nodes[node]
            .owning_block
            .unwrap_or_else(|| panic!("node `{}` is not placed in a block", self.nodes[node].kind));
        let position = self.blocks[block]
            .nodes
            .iter()
            .position(|&n| n == node)
            .unwrap_or_else(|| panic!("block does not list node `{}`", self.nodes[node].kind));
        (block, position)
    }

    pub fn insert_before(&mut self, node: NodeKey, before: NodeKey) {
        let (block, position) = self.position_in_block(before);
        self.attach(node, block, position);
    }

    pub fn insert_after(&mut self, node: NodeKey, after: NodeKey) {
        let (block, position) = self.position_in_block(after);
        self.attach(node, block, position + 1);
    }

    pub fn append_node(&mut self, block: BlockKey, node: NodeKey) {
        let end = self.blocks[block].nodes.len();
        self.attach(node, block, end);
    }

    pub fn prepend_node(&mut self, block: BlockKey, node: NodeKey) {
        self.attach(node, block, 0);
    }

    pub fn insert_point(&self) -> InsertPoint {
        self.insert_point
    }

    pub fn set_insert_point(&mut self, point: InsertPoint) {
        self.insert_point = point;
    }

    /// Runs `f` with the insert point temporarily moved to `point`.
    pub fn with_insert_point<R>(&mut self, point: InsertPoint, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = mem::replace(&mut self.insert_point, point);
        let result = f(self);
        self.insert_point = saved;
        result
    }

    /// Places a detached node at the current insert point.
    pub fn insert_node(&mut self, node: NodeKey) -> NodeKey {
        match self.insert_point {
            InsertPoint::Before(anchor) => self.insert_before(node, anchor),
            InsertPoint::After(anchor) => {
                self.insert_after(node, anchor);
                // Keep program order for consecutive insertions.
                self.insert_point = InsertPoint::After(node);
            }
            InsertPoint::EndOf(block) => self.append_node(block, node),
        }
        node
    }

    /// Creates a node and places it at the current insert point.
    pub fn insert(&mut self, kind: NodeKind, inputs: &[ValueKey], output_types: &[Type]) -> NodeKey {
        let node = self.create_node(kind, inputs, output_types);
        self.insert_node(node)
    }

    // ------------------------------------------------------------------
    // Destruction
    // ------------------------------------------------------------------

    /// Removes `node` and its sub-blocks. Its outputs must have no uses.
    pub fn destroy_node(&mut self, node: NodeKey) {
        let data = &self.nodes[node];
        assert!(
            !matches!(data.kind, NodeKind::Param | NodeKind::Return),
            "block parameter and return nodes are destroyed with their block"
        );
        for &output in &data.outputs {
            assert!(
                self.values[output].uses.is_empty(),
                "destroying `{}` while one of its outputs still has uses",
                data.kind
            );
        }

        let blocks: Vec<BlockKey> = data.blocks.iter().copied().collect();
        for block in blocks.into_iter().rev() {
            self.destroy_block(block);
        }

        self.clear_inputs(node);

        if let Some(block) = self.nodes[node].owning_block {
            self.blocks[block].nodes.retain(|&n| n != node);
        }

        if let Some(data) = self.nodes.remove(node) {
            for output in data.outputs {
                self.values.remove(output);
            }
        }
    }

    fn clear_inputs(&mut self, node: NodeKey) {
        let inputs = mem::take(&mut self.nodes[node].inputs);
        for (offset, value) in inputs.into_iter().enumerate() {
            self.drop_use(value, Use::new(node, offset));
        }
    }

    fn destroy_block(&mut self, block: BlockKey) {
        let BlockData {
            param, ret, nodes, ..
        } = self.blocks[block].clone();

        self.clear_inputs(ret);
        for node in nodes.into_iter().rev() {
            self.destroy_node(node);
        }

        for key in [param, ret] {
            if let Some(data) = self.nodes.remove(key) {
                for output in data.outputs {
                    self.values.remove(output);
                }
            }
        }
        self.blocks.remove(block);
    }

    // ------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------

    pub fn insert_constant(&mut self, value: IValue) -> ValueKey {
        let ty = value.ty();
        let node = self.create_node(NodeKind::Constant, &[], &[ty]);
        self.nodes[node].attrs = NodeAttrs::constant(value);
        self.insert_node(node);
        self.nodes[node].outputs[0]
    }

    pub fn insert_get_attr(&mut self, object: ValueKey, name: &str, ty: Type) -> ValueKey {
        let node = self.create_node(NodeKind::GetAttr, &[object], &[ty]);
        self.nodes[node].attrs = NodeAttrs::named(name);
        self.insert_node(node);
        self.nodes[node].outputs[0]
    }

    pub fn insert_set_attr(&mut self, object: ValueKey, name: &str, value: ValueKey) -> NodeKey {
        let node = self.create_node(NodeKind::SetAttr, &[object, value], &[]);
        self.nodes[node].attrs = NodeAttrs::named(name);
        self.insert_node(node)
    }

    pub fn insert_op(&mut self, name: &str, inputs: &[ValueKey], ty: Type) -> ValueKey {
        let node = self.insert(NodeKind::op(name), inputs, &[ty]);
        self.nodes[node].outputs[0]
    }

    pub fn insert_python_op(&mut self, name: &str, inputs: &[ValueKey], ty: Type) -> ValueKey {
        let node = self.create_node(NodeKind::PythonOp, inputs, &[ty]);
        self.nodes[node].attrs = NodeAttrs::named(name);
        self.insert_node(node);
        self.nodes[node].outputs[0]
    }

    pub fn insert_list_construct(&mut self, elements: &[ValueKey], element_type: Type) -> ValueKey {
        let node = self.insert(
            NodeKind::ListConstruct,
            elements,
            &[Type::list_of(element_type)],
        );
        self.nodes[node].outputs[0]
    }

    /// Inserts an `If` with empty then/else blocks.
    pub fn insert_if(&mut self, condition: ValueKey, output_types: &[Type]) -> NodeKey {
        let node = self.insert(NodeKind::If, &[condition], output_types);
        self.add_block(node);
        self.add_block(node);
        node
    }

    /// Inserts a `Loop(max_trip_count, condition, carried...)`.
    ///
    /// The body block receives the iteration counter followed by the carried
    /// values and must return the continue condition followed by the carried
    /// values.
    pub fn insert_loop(
        &mut self,
        max_trip_count: ValueKey,
        condition: ValueKey,
        carried: &[ValueKey],
    ) -> NodeKey {
        let mut inputs = vec![max_trip_count, condition];
        inputs.extend_from_slice(carried);
        let carried_types: Vec<Type> = carried
            .iter()
            .map(|&v| self.values[v].ty.clone())
            .collect();
        let node = self.insert(NodeKind::Loop, &inputs, &carried_types);
        let body = self.add_block(node);
        self.add_block_input(body, Type::Int);
        for ty in carried_types {
            self.add_block_input(body, ty);
        }
        node
    }

    /// Inserts a `fork` of `subgraph`; `args` line up with its formal inputs.
    pub fn insert_fork(&mut self, subgraph: Graph, args: &[ValueKey]) -> ValueKey {
        let result_type = subgraph
            .outputs()
            .first()
            .map(|&v| subgraph.value_type(v).clone())
            .unwrap_or(Type::NoneType);
        let node = self.create_node(NodeKind::Fork, args, &[Type::future_of(result_type)]);
        self.nodes[node].attrs.subgraph = Some(Box::new(subgraph));
        self.insert_node(node);
        self.nodes[node].outputs[0]
    }

    pub fn insert_call(&mut self, function: Arc<Function>, args: &[ValueKey]) -> NodeKey {
        let output_types: Vec<Type> = function
            .graph()
            .outputs()
            .iter()
            .map(|&v| function.graph().value_type(v).clone())
            .collect();
        let node = self.create_node(NodeKind::Call, args, &output_types);
        self.nodes[node].attrs.function = Some(function);
        self.insert_node(node)
    }

    /// Copies `node` of `src` (with its sub-blocks) into this graph as a
    /// detached node. Inputs are translated through `value_map`, which must
    /// already contain every value the node reads; the copy's outputs and
    /// block-local values are added to it.
    pub fn copy_node_from(
        &mut self,
        src: &Graph,
        node: NodeKey,
        value_map: &mut HashMap<ValueKey, ValueKey>,
    ) -> NodeKey {
        let data = src.node(node);
        let inputs: Vec<ValueKey> = data.inputs.iter().map(|v| value_map[v]).collect();
        let output_types: Vec<Type> = data
            .outputs
            .iter()
            .map(|&v| src.value_type(v).clone())
            .collect();

        let copy = self.create_node(data.kind.clone(), &inputs, &output_types);
        self.nodes[copy].attrs = data.attrs.clone();
        self.nodes[copy].source = data.source.clone();

        let copied_outputs = self.nodes[copy].outputs.clone();
        for (&old, &new) in data.outputs.iter().zip(copied_outputs.iter()) {
            self.values[new].debug_name = src.value(old).debug_name.clone();
            value_map.insert(old, new);
        }

        for &block in data.blocks.iter() {
            let new_block = self.add_block(copy);
            for &input in src.block_inputs(block) {
                let mapped = self.add_block_input(new_block, src.value_type(input).clone());
                self.values[mapped].debug_name = src.value(input).debug_name.clone();
                value_map.insert(input, mapped);
            }
            for &inner in src.block_nodes(block) {
                let inner_copy = self.copy_node_from(src, inner, value_map);
                self.append_node(new_block, inner_copy);
            }
            for output in src.block_outputs(block) {
                self.register_block_output(new_block, value_map[output]);
            }
        }

        copy
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Checks use-lists, block membership and scoping of every value.
    pub fn lint(&self) -> Result<(), String> {
        for (key, node) in &self.nodes {
            for (offset, &input) in node.inputs.iter().enumerate() {
                let Some(value) = self.values.get(input) else {
                    return Err(format!(
                        "input {} of `{}` refers to a destroyed value",
                        offset, node.kind
                    ));
                };
                if !value.uses.contains(&Use::new(key, offset)) {
                    return Err(format!(
                        "input {} of `{}` is missing from its value's use-list",
                        offset, node.kind
                    ));
                }
            }
            for (offset, &output) in node.outputs.iter().enumerate() {
                match self.values.get(output) {
                    Some(value) if value.node == key && value.offset == offset => {}
                    _ => {
                        return Err(format!(
                            "output {} of `{}` does not point back to its node",
                            offset, node.kind
                        ))
                    }
                }
            }
        }

        for (key, value) in &self.values {
            for entry in &value.uses {
                let valid = self
                    .nodes
                    .get(entry.user)
                    .and_then(|user| user.inputs.get(entry.offset))
                    .map_or(false, |&input| input == key);
                if !valid {
                    return Err(format!(
                        "stale use of value {} at input {}",
                        self.describe_value(key),
                        entry.offset
                    ));
                }
            }
        }

        for (key, block) in &self.blocks {
            for &node in &block.nodes {
                if self.nodes[node].owning_block != Some(key) {
                    return Err(format!(
                        "`{}` is listed in a block it does not belong to",
                        self.nodes[node].kind
                    ));
                }
            }
        }

        let mut visible = HashSet::new();
        self.lint_block(self.root, &mut visible)
    }

    fn lint_block(&self, block: BlockKey, visible: &mut HashSet<ValueKey>) -> Result<(), String> {
        let mut defined: Vec<ValueKey> = self.block_inputs(block).to_vec();
        visible.extend(defined.iter().copied());

        for &node in &self.blocks[block].nodes {
            let data = &self.nodes[node];
            for &input in &data.inputs {
                if !visible.contains(&input) {
                    return Err(format!(
                        "value {} is used by `{}` outside of its scope",
                        self.describe_value(input),
                        data.kind
                    ));
                }
            }
            for &child in &data.blocks {
                self.lint_block(child, visible)?;
            }
            visible.extend(data.outputs.iter().copied());
            defined.extend(data.outputs.iter().copied());
        }

        for &output in self.block_outputs(block) {
            if !visible.contains(&output) {
                return Err(format!(
                    "block returns value {} outside of its scope",
                    self.describe_value(output)
                ));
            }
        }

        for value in defined {
            visible.remove(&value);
        }
        Ok(())
    }

    fn describe_value(&self, value: ValueKey) -> String {
        match self.values.get(value).and_then(|v| v.debug_name.as_deref()) {
            Some(name) => format!("%{}", name),
            None => format!("{:?}", value),
        }
    }
}
