use super::entry::EntryBuffer;
use super::node_table::NodeItem;
use crate::device::AllocatorAttributes;
use crate::error::{FastGraphError, FastGraphResult};
use crate::graph::Node;
use crate::kernel::TensorValue;

/// What a kernel invocation receives, built from the node's input entries
#[derive(Debug, Default)]
pub struct PreparedInputs {
    pub inputs: Vec<Option<TensorValue>>,
    pub alloc_attrs: Vec<AllocatorAttributes>,
    pub is_input_dead: bool,
}

/// Turn the input entries of `node` into its kernel's input view.
///
/// Missing inputs are skipped for merge nodes and make a transfer node's
/// whole invocation input-dead; for any other node they are an error.
/// Reference entries are bound directly when the slot expects a reference,
/// otherwise their current value is copied out under the guard into the
/// entry's cached value.
pub fn prepare_inputs(
    node: &Node,
    item: &NodeItem,
    entries: &mut EntryBuffer,
) -> FastGraphResult<PreparedInputs> {
    let mut prepared = PreparedInputs {
        inputs: Vec::with_capacity(item.num_inputs),
        alloc_attrs: Vec::with_capacity(item.num_inputs),
        is_input_dead: false,
    };

    for i in 0..item.num_inputs {
        let entry = &mut entries[item.input_start + i];
        prepared.alloc_attrs.push(entry.alloc_attr);

        if !entry.has_value {
            if node.is_merge() {
                prepared.inputs.push(None);
                continue;
            }
            if node.is_transfer() {
                prepared.is_input_dead = true;
                prepared.inputs.push(None);
                continue;
            }
            return Err(FastGraphError::invalid_argument(format!(
                "{}-th input has no value",
                i
            ))
            .attach_def(node.def()));
        }

        let expects_ref = node.input_type(i).is_ref;
        match &entry.reference {
            None => {
                if expects_ref {
                    return Err(FastGraphError::invalid_argument(format!(
                        "{}-th input expects a ref type",
                        i
                    ))
                    .attach_def(node.def()));
                }
                prepared
                    .inputs
                    .push(Some(TensorValue::Value(entry.val.clone())));
            }
            Some(reference) => {
                let guard = reference.lock();
                if !guard.is_initialized() && !node.is_initialization_op() {
                    let input_name = node.def().inputs.get(i).map(String::as_str).unwrap_or("?");
                    return Err(FastGraphError::failed_precondition(format!(
                        "Attempting to use uninitialized value {}",
                        input_name
                    ))
                    .attach_def(node.def()));
                }
                if expects_ref {
                    drop(guard);
                    prepared
                        .inputs
                        .push(Some(TensorValue::Ref(reference.clone())));
                } else {
                    let value = guard.clone();
                    drop(guard);
                    entry.val = value;
                    prepared
                        .inputs
                        .push(Some(TensorValue::Value(entry.val.clone())));
                }
            }
        }
    }

    Ok(prepared)
}
