use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::debug;

use crate::error::{LowerError, Result};
use crate::ir::{Graph, InsertPoint, Type, ValueKey};
use crate::object::{IValue, ObjectRef};

/// An attribute storage location: an object and an offset in its schema.
///
/// Slots compare by object identity. Two distinct objects with equal
/// contents are different slots.
#[derive(Clone)]
pub struct Slot {
    object: ObjectRef,
    offset: usize,
}

impl Slot {
    pub fn new(object: ObjectRef, offset: usize) -> Self {
        Self { object, offset }
    }

    pub fn object(&self) -> &ObjectRef {
        &self.object
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Current content of the slot, read from the object.
    pub fn content(&self) -> IValue {
        self.object.get_slot(self.offset)
    }

    pub fn attribute_name(&self) -> &str {
        self.object
            .class()
            .attribute_name(self.offset)
            .unwrap_or("<unknown>")
    }
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.object, &other.object) && self.offset == other.offset
    }
}

impl Eq for Slot {}

impl Hash for Slot {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.object) as *const () as usize).hash(state);
        self.offset.hash(state);
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.object.class().name(), self.attribute_name())
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Slot({} @ {:p}, {})",
            self,
            Arc::as_ptr(&self.object),
            self.offset
        )
    }
}

/// What the graph currently uses for a slot. A slot with no entry has not
/// been seen yet and is read from its object.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SlotState {
    /// Formal input at this position in the extra-input region.
    MaterializedInput(usize),
    /// Literal inserted at the graph entry.
    MaterializedConstant(ValueKey),
    /// A live value: the last unconditional write, or an expanded list.
    TrackedValue(ValueKey),
}

/// A slot that became formal inputs of the lowered graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtraInput {
    pub slot: Slot,
    /// Element count for tensor-list slots. A tensor slot takes one input.
    pub list_len: Option<usize>,
}

impl ExtraInput {
    pub fn tensor(slot: Slot) -> Self {
        Self {
            slot,
            list_len: None,
        }
    }

    pub fn list(slot: Slot, len: usize) -> Self {
        Self {
            slot,
            list_len: Some(len),
        }
    }

    /// Number of formal inputs this slot occupies.
    pub fn width(&self) -> usize {
        self.list_len.unwrap_or(1)
    }
}

impl fmt::Display for ExtraInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.list_len {
            Some(len) => write!(f, "{}[{}]", self.slot, len),
            None => write!(f, "{}", self.slot),
        }
    }
}

/// Pass-local overlay of slot states over the (read-only) object tree.
#[derive(Default)]
pub(crate) struct SlotTable {
    states: HashMap<Slot, SlotState>,
    extra: Vec<ExtraInput>,
    /// Formal inputs added so far, counting every list element.
    num_extra_inputs: usize,
}

impl SlotTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, slot: &Slot) -> Option<SlotState> {
        self.states.get(slot).copied()
    }

    #[cfg(test)]
    pub fn extra_inputs(&self) -> &[ExtraInput] {
        &self.extra
    }

    pub fn into_extra_inputs(self) -> Vec<ExtraInput> {
        self.extra
    }

    /// Makes `value` the content of `slot` for every later read.
    pub fn record_write(&mut self, slot: Slot, value: ValueKey) {
        self.states.insert(slot, SlotState::TrackedValue(value));
    }

    /// Returns a value holding the current content of `slot`, materializing
    /// it on first use.
    pub fn get_or_add_slot(&mut self, graph: &mut Graph, slot: &Slot) -> Result<ValueKey> {
        if let Some(state) = self.state(slot) {
            return match state {
                SlotState::MaterializedInput(position) => {
                    let inputs = graph.inputs();
                    let start = inputs.len().checked_sub(self.num_extra_inputs);
                    start
                        .and_then(|start| inputs.get(start + position))
                        .copied()
                        .ok_or_else(|| {
                            LowerError::InternalInvariantViolation(format!(
                                "extra input {} for {} is missing from the graph",
                                position, slot
                            ))
                        })
                }
                SlotState::MaterializedConstant(value) | SlotState::TrackedValue(value) => {
                    Ok(value)
                }
            };
        }

        let content = slot.content();
        let name = slot.attribute_name().to_string();
        let (value, state) = match content {
            IValue::TensorList(elements) => {
                let mut inputs = Vec::with_capacity(elements.len());
                for element in &elements {
                    let input = graph.add_input(element.ty());
                    graph.set_debug_name(input, name.as_str());
                    inputs.push(input);
                }
                let list = graph.with_insert_point(entry_point(graph), |g| {
                    g.insert_list_construct(&inputs, Type::tensor())
                });
                graph.set_debug_name(list, name.as_str());

                debug!(slot = %slot, elements = elements.len(), "materialized tensor list");
                self.num_extra_inputs += elements.len();
                self.extra.push(ExtraInput::list(slot.clone(), elements.len()));
                (list, SlotState::TrackedValue(list))
            }
            IValue::Tensor(tensor) => {
                let input = graph.add_input(tensor.ty());
                graph.set_debug_name(input, name.as_str());

                let position = self.num_extra_inputs;
                debug!(slot = %slot, position, "materialized input");
                self.num_extra_inputs += 1;
                self.extra.push(ExtraInput::tensor(slot.clone()));
                (input, SlotState::MaterializedInput(position))
            }
            IValue::Object(ref object) if object.class().is_module() => {
                return Err(LowerError::InternalInvariantViolation(format!(
                    "module {} cannot be materialized as a value",
                    slot
                )));
            }
            other => {
                let constant = graph.with_insert_point(entry_point(graph), |g| {
                    g.insert_constant(other)
                });
                graph.set_debug_name(constant, name.as_str());
                debug!(slot = %slot, "materialized constant");
                (constant, SlotState::MaterializedConstant(constant))
            }
        };

        self.states.insert(slot.clone(), state);
        Ok(value)
    }
}

/// Insert point at the top of the root block.
fn entry_point(graph: &Graph) -> InsertPoint {
    match graph.nodes().first() {
        Some(&first) => InsertPoint::Before(first),
        None => InsertPoint::EndOf(graph.root()),
    }
}
