use super::def::NodeDef;
use super::op_def::OpDef;
use crate::tensor::SlotType;
use std::sync::Arc;

/// A directed edge between two graph nodes.
///
/// Control edges only order execution; their slot fields are zero and no
/// tensor crosses them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub src: usize,
    pub src_output: usize,
    pub dst: usize,
    pub dst_input: usize,
    pub is_control: bool,
}

impl Edge {
    pub fn is_control_edge(&self) -> bool {
        self.is_control
    }
}

/// A typed graph node
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: usize,
    pub(crate) def: NodeDef,
    pub(crate) op_def: Arc<OpDef>,
    pub(crate) input_types: Vec<SlotType>,
    pub(crate) output_types: Vec<SlotType>,
    pub(crate) out_edges: Vec<Edge>,
    pub(crate) in_edges: Vec<Edge>,
}

impl Node {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn op(&self) -> &str {
        &self.def.op
    }

    pub fn def(&self) -> &NodeDef {
        &self.def
    }

    pub fn op_def(&self) -> &OpDef {
        &self.op_def
    }

    pub fn num_inputs(&self) -> usize {
        self.input_types.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.output_types.len()
    }

    pub fn input_type(&self, i: usize) -> SlotType {
        self.input_types[i]
    }

    pub fn output_type(&self, i: usize) -> SlotType {
        self.output_types[i]
    }

    pub fn input_types(&self) -> &[SlotType] {
        &self.input_types
    }

    pub fn output_types(&self) -> &[SlotType] {
        &self.output_types
    }

    pub fn out_edges(&self) -> &[Edge] {
        &self.out_edges
    }

    pub fn in_edges(&self) -> &[Edge] {
        &self.in_edges
    }

    pub fn is_merge(&self) -> bool {
        self.op_def.is_merge
    }

    pub fn is_switch(&self) -> bool {
        self.op_def.is_switch
    }

    pub fn is_recv(&self) -> bool {
        self.op_def.is_recv
    }

    pub fn is_transfer(&self) -> bool {
        self.op_def.is_transfer
    }

    pub fn is_initialization_op(&self) -> bool {
        self.op_def.allows_uninitialized_input
    }

    /// Switch- and receive-style nodes may legitimately leave outputs unset
    pub fn may_skip_outputs(&self) -> bool {
        self.is_switch() || self.is_recv()
    }
}
