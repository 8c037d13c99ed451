use super::entry::{Entry, EntryBuffer};
use super::node_table::NodeTable;
use crate::error::{FastGraphError, FastGraphResult};
use crate::graph::Node;
use crate::kernel::KernelContext;

/// Collect the outputs `ctx` produced into one entry per output slot.
///
/// Only switch- and receive-style nodes may leave an output unset or report
/// the invocation dead; their missing outputs become entries without a
/// value. Every produced output must match the node's declared slot type,
/// reference outputs included.
pub fn process_outputs(node: &Node, ctx: &mut KernelContext<'_>) -> FastGraphResult<Vec<Entry>> {
    let is_dead = ctx.is_output_dead();
    if is_dead && !node.may_skip_outputs() {
        return Err(FastGraphError::internal(format!(
            "Node '{}' reported dead outputs but is neither a switch nor a receive",
            node.name()
        ))
        .attach_def(node.def()));
    }

    let mut outputs = Vec::with_capacity(node.num_outputs());
    for i in 0..node.num_outputs() {
        let alloc_attr = ctx.output_alloc_attr(i);
        let value = match ctx.release_output(i) {
            Some(value) if !is_dead => value,
            _ => {
                if !node.may_skip_outputs() {
                    return Err(FastGraphError::internal(format!(
                        "Missing {}-th output from {}",
                        i,
                        node.def().summary()
                    )));
                }
                outputs.push(Entry {
                    alloc_attr,
                    ..Entry::default()
                });
                continue;
            }
        };

        let expected = node.output_type(i);
        if value.slot_type() != expected {
            return Err(FastGraphError::internal(format!(
                "Output {} of type {} does not match declared output type {}",
                i,
                value.slot_type(),
                expected
            ))
            .attach_def(node.def()));
        }
        outputs.push(Entry::from_output(value, alloc_attr));
    }
    Ok(outputs)
}

/// Copy each output entry into the input slot of every data consumer.
///
/// Control edges carry nothing and are skipped. Each consumer slot gets its
/// own copy.
pub fn propagate_outputs(
    node: &Node,
    outputs: &[Entry],
    table: &NodeTable,
    entries: &mut EntryBuffer,
) {
    for edge in node.out_edges() {
        if edge.is_control_edge() {
            continue;
        }
        let dst = table.item(edge.dst);
        debug_assert!(edge.dst_input < dst.num_inputs);
        entries[dst.input_start + edge.dst_input] = outputs[edge.src_output].clone();
    }
}
