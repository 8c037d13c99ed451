use crate::device::AllocatorAttributes;
use crate::error::{FastGraphError, FastGraphResult};
use crate::graph::FunctionLibrary;
use crate::tensor::{DataType, SlotType, Tensor, TensorRef};

/// A kernel input or output: a tensor by value, or a shared reference
#[derive(Debug, Clone)]
pub enum TensorValue {
    Value(Tensor),
    Ref(TensorRef),
}

impl TensorValue {
    pub fn is_ref(&self) -> bool {
        matches!(self, TensorValue::Ref(_))
    }

    pub fn dtype(&self) -> DataType {
        match self {
            TensorValue::Value(t) => t.dtype(),
            TensorValue::Ref(r) => r.dtype(),
        }
    }

    /// Runtime slot type, comparable with a node's declared slot types
    pub fn slot_type(&self) -> SlotType {
        if self.is_ref() {
            self.dtype().reference()
        } else {
            self.dtype().value()
        }
    }
}

/// Everything one kernel invocation can see and produce.
///
/// Slot indices are positional and must be below `num_inputs()` /
/// `num_outputs()`; out-of-range indices panic.
pub struct KernelContext<'a> {
    inputs: Vec<Option<TensorValue>>,
    input_alloc_attrs: Vec<AllocatorAttributes>,
    output_attrs: &'a [AllocatorAttributes],
    function_library: &'a FunctionLibrary,
    is_input_dead: bool,
    outputs: Vec<Option<TensorValue>>,
    is_output_dead: bool,
}

impl<'a> KernelContext<'a> {
    pub fn new(
        inputs: Vec<Option<TensorValue>>,
        input_alloc_attrs: Vec<AllocatorAttributes>,
        output_attrs: &'a [AllocatorAttributes],
        function_library: &'a FunctionLibrary,
        is_input_dead: bool,
    ) -> Self {
        let num_outputs = output_attrs.len();
        Self {
            inputs,
            input_alloc_attrs,
            output_attrs,
            function_library,
            is_input_dead,
            outputs: vec![None; num_outputs],
            is_output_dead: false,
        }
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// False for inputs a merge node did not receive and for dead inputs
    pub fn has_input(&self, i: usize) -> bool {
        self.inputs[i].is_some()
    }

    pub fn input_value(&self, i: usize) -> Option<&TensorValue> {
        self.inputs[i].as_ref()
    }

    /// The i-th input as a value.
    pub fn input(&self, i: usize) -> FastGraphResult<&Tensor> {
        match &self.inputs[i] {
            Some(TensorValue::Value(t)) => Ok(t),
            Some(TensorValue::Ref(_)) => Err(FastGraphError::invalid_argument(format!(
                "Input {} is a reference but a value was requested",
                i
            ))),
            None => Err(FastGraphError::invalid_argument(format!(
                "Input {} has no value",
                i
            ))),
        }
    }

    /// The i-th input as a shared reference.
    pub fn input_ref(&self, i: usize) -> FastGraphResult<&TensorRef> {
        match &self.inputs[i] {
            Some(TensorValue::Ref(r)) => Ok(r),
            Some(TensorValue::Value(_)) => Err(FastGraphError::invalid_argument(format!(
                "Input {} is a value but a reference was requested",
                i
            ))),
            None => Err(FastGraphError::invalid_argument(format!(
                "Input {} has no value",
                i
            ))),
        }
    }

    pub fn input_alloc_attr(&self, i: usize) -> AllocatorAttributes {
        self.input_alloc_attrs[i]
    }

    /// Set when a transfer node was invoked without its input
    pub fn is_input_dead(&self) -> bool {
        self.is_input_dead
    }

    pub fn function_library(&self) -> &FunctionLibrary {
        self.function_library
    }

    pub fn set_output(&mut self, i: usize, tensor: Tensor) {
        self.outputs[i] = Some(TensorValue::Value(tensor));
    }

    pub fn set_output_ref(&mut self, i: usize, reference: TensorRef) {
        self.outputs[i] = Some(TensorValue::Ref(reference));
    }

    /// Mark every output of this invocation as dead
    pub fn set_output_dead(&mut self) {
        self.is_output_dead = true;
    }

    pub fn is_output_dead(&self) -> bool {
        self.is_output_dead
    }

    /// Allocator attributes the executor assigned to the i-th output
    pub fn output_alloc_attr(&self, i: usize) -> AllocatorAttributes {
        self.output_attrs[i]
    }

    /// Take the i-th output, leaving the slot empty
    pub fn release_output(&mut self, i: usize) -> Option<TensorValue> {
        self.outputs[i].take()
    }
}
