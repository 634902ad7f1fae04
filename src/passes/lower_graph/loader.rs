use crate::error::{LowerError, Result};
use crate::object::{IValue, Tensor};

use super::ExtraInput;

/// Reads the runtime values for the extra inputs of a lowered graph.
///
/// Tensor slots contribute one value and tensor-list slots one value per
/// element, so the result lines up with the graph's extra formal inputs. A
/// slot whose content no longer fits its inputs is an error.
pub fn load_slot_values(inputs: &[ExtraInput]) -> Result<Vec<Tensor>> {
    let mut values = Vec::with_capacity(inputs.iter().map(ExtraInput::width).sum());
    for input in inputs {
        let slot = &input.slot;
        match (slot.content(), input.list_len) {
            (IValue::Tensor(tensor), None) => values.push(tensor),
            (IValue::TensorList(elements), Some(len)) => {
                if elements.len() != len {
                    return Err(LowerError::SlotLengthMismatch {
                        slot: slot.to_string(),
                        expected: len,
                        found: elements.len(),
                    });
                }
                values.extend(elements);
            }
            (other, list_len) => {
                return Err(LowerError::SlotContentMismatch {
                    slot: slot.to_string(),
                    expected: if list_len.is_some() { "Tensor[]" } else { "Tensor" },
                    found: other.kind_name(),
                })
            }
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ModuleBuilder;
    use crate::passes::lower_graph::Slot;

    #[test]
    fn test_flattens_lists_in_order() {
        let a = Tensor::zeros(vec![1]);
        let b = Tensor::zeros(vec![2]);
        let c = Tensor::zeros(vec![3]);
        let module = ModuleBuilder::new("M")
            .attr("a", a.clone())
            .attr("bc", IValue::TensorList(vec![b.clone(), c.clone()]))
            .build();

        let values = load_slot_values(&[
            ExtraInput::list(Slot::new(module.clone(), 1), 2),
            ExtraInput::tensor(Slot::new(module, 0)),
        ])
        .unwrap();
        assert_eq!(values.len(), 3);
        assert!(Tensor::ptr_eq(&values[0], &b));
        assert!(Tensor::ptr_eq(&values[1], &c));
        assert!(Tensor::ptr_eq(&values[2], &a));
    }

    #[test]
    fn test_reads_current_content() {
        let module = ModuleBuilder::new("M").attr("w", Tensor::zeros(vec![2])).build();
        let replacement = Tensor::full(vec![2], 1.0);
        module.set_slot(0, replacement.clone().into());

        let values = load_slot_values(&[ExtraInput::tensor(Slot::new(module, 0))]).unwrap();
        assert!(Tensor::ptr_eq(&values[0], &replacement));
    }

    #[test]
    fn test_rejects_changed_content() {
        let module = ModuleBuilder::new("M").attr("w", Tensor::zeros(vec![2])).build();
        module.set_slot(0, IValue::Int(3));

        let result = load_slot_values(&[ExtraInput::tensor(Slot::new(module, 0))]);
        assert!(matches!(
            result,
            Err(LowerError::SlotContentMismatch {
                expected: "Tensor",
                found: "int",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_list_where_tensor_was_lowered() {
        let module = ModuleBuilder::new("M").attr("w", Tensor::zeros(vec![2])).build();
        module.set_slot(0, IValue::TensorList(vec![Tensor::zeros(vec![2])]));

        let result = load_slot_values(&[ExtraInput::tensor(Slot::new(module, 0))]);
        assert!(matches!(
            result,
            Err(LowerError::SlotContentMismatch { found: "Tensor[]", .. })
        ));
    }

    #[test]
    fn test_rejects_resized_list() {
        let module = ModuleBuilder::new("M")
            .attr(
                "chunks",
                IValue::TensorList(vec![Tensor::zeros(vec![1]), Tensor::zeros(vec![1])]),
            )
            .build();
        let input = ExtraInput::list(Slot::new(module.clone(), 0), 2);
        assert_eq!(load_slot_values(&[input.clone()]).unwrap().len(), 2);

        module.set_slot(0, IValue::TensorList(vec![Tensor::zeros(vec![1]); 3]));
        assert!(matches!(
            load_slot_values(&[input]),
            Err(LowerError::SlotLengthMismatch {
                expected: 2,
                found: 3,
                ..
            })
        ));
    }
}
