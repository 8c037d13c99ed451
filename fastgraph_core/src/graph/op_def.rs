use super::def::{AttrValue, NodeDef};
use crate::error::{FastGraphError, FastGraphResult};
use crate::tensor::{DataType, SlotType};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Where an argument's element type comes from
#[derive(Debug, Clone, PartialEq)]
pub enum ArgType {
    Fixed(DataType),
    /// Read from the named type attribute of the node
    Attr(String),
}

/// One declared input or output argument of an op
#[derive(Debug, Clone)]
pub struct ArgDef {
    pub name: String,
    pub arg_type: ArgType,
    /// Integer attribute giving the number of repetitions of this argument
    pub number_attr: Option<String>,
    pub is_ref: bool,
}

impl ArgDef {
    /// `type_spec` is either a data type name (`"bool"`) or the name of a
    /// type attribute (`"T"`).
    pub fn new(name: &str, type_spec: &str) -> Self {
        let arg_type = match type_spec.parse::<DataType>() {
            Ok(dtype) => ArgType::Fixed(dtype),
            Err(_) => ArgType::Attr(type_spec.to_string()),
        };
        Self {
            name: name.to_string(),
            arg_type,
            number_attr: None,
            is_ref: false,
        }
    }

    pub fn reference(mut self) -> Self {
        self.is_ref = true;
        self
    }

    pub fn repeated(mut self, number_attr: &str) -> Self {
        self.number_attr = Some(number_attr.to_string());
        self
    }

    fn resolve(&self, def: &NodeDef, out: &mut Vec<SlotType>) -> FastGraphResult<()> {
        let dtype = match &self.arg_type {
            ArgType::Fixed(dtype) => *dtype,
            ArgType::Attr(attr) => def.attr(attr).and_then(|a| a.as_type()).ok_or_else(|| {
                FastGraphError::graph(format!(
                    "Argument '{}' needs type attribute '{}'",
                    self.name, attr
                ))
            })?,
        };
        let count = match &self.number_attr {
            Some(attr) => {
                let n = def.attr(attr).and_then(|a| a.as_int()).ok_or_else(|| {
                    FastGraphError::graph(format!(
                        "Argument '{}' needs integer attribute '{}'",
                        self.name, attr
                    ))
                })?;
                if n < 1 {
                    return Err(FastGraphError::graph(format!(
                        "Attribute '{}' must be at least 1, got {}",
                        attr, n
                    )));
                }
                n as usize
            }
            None => 1,
        };
        let slot = if self.is_ref {
            dtype.reference()
        } else {
            dtype.value()
        };
        out.extend(std::iter::repeat(slot).take(count));
        Ok(())
    }
}

/// Declaration of an operation: its signature, attributes and the
/// control-flow traits the executor cares about.
#[derive(Debug, Clone, Default)]
pub struct OpDef {
    pub name: String,
    pub inputs: Vec<ArgDef>,
    pub outputs: Vec<ArgDef>,
    /// Attribute name -> default value (`None` means required)
    pub attrs: BTreeMap<String, Option<AttrValue>>,

    /// Forwards whichever of its inputs is present
    pub is_merge: bool,
    /// Produces only one of its outputs
    pub is_switch: bool,
    /// Receives a value from elsewhere; may produce nothing
    pub is_recv: bool,
    /// Hands a value across a device/process boundary
    pub is_transfer: bool,
    /// May observe uninitialized reference inputs
    pub allows_uninitialized_input: bool,
}

impl OpDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn input(mut self, arg: ArgDef) -> Self {
        self.inputs.push(arg);
        self
    }

    pub fn output(mut self, arg: ArgDef) -> Self {
        self.outputs.push(arg);
        self
    }

    /// Attribute with a default value
    pub fn attr(mut self, name: &str, default: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.to_string(), Some(default.into()));
        self
    }

    /// Attribute every node must set
    pub fn required_attr(mut self, name: &str) -> Self {
        self.attrs.insert(name.to_string(), None);
        self
    }

    pub fn merge(mut self) -> Self {
        self.is_merge = true;
        self
    }

    pub fn switch(mut self) -> Self {
        self.is_switch = true;
        self
    }

    pub fn recv(mut self) -> Self {
        self.is_recv = true;
        self.is_transfer = true;
        self
    }

    pub fn transfer(mut self) -> Self {
        self.is_transfer = true;
        self
    }

    pub fn allows_uninitialized_input(mut self) -> Self {
        self.allows_uninitialized_input = true;
        self
    }

    pub fn resolve_input_types(&self, def: &NodeDef) -> FastGraphResult<Vec<SlotType>> {
        let mut types = Vec::with_capacity(self.inputs.len());
        for arg in &self.inputs {
            arg.resolve(def, &mut types)?;
        }
        Ok(types)
    }

    pub fn resolve_output_types(&self, def: &NodeDef) -> FastGraphResult<Vec<SlotType>> {
        let mut types = Vec::with_capacity(self.outputs.len());
        for arg in &self.outputs {
            arg.resolve(def, &mut types)?;
        }
        Ok(types)
    }

    /// Fill in every attribute the node leaves unset and that has a default.
    /// Returns the number of attributes added.
    pub fn add_default_attrs(&self, def: &mut NodeDef) -> usize {
        let mut added = 0;
        for (name, default) in &self.attrs {
            if let Some(value) = default {
                if !def.attrs.contains_key(name) {
                    def.attrs.insert(name.clone(), value.clone());
                    added += 1;
                }
            }
        }
        added
    }

    /// Names of required attributes the node does not set
    pub fn missing_attrs<'a>(&'a self, def: &NodeDef) -> Vec<&'a str> {
        self.attrs
            .iter()
            .filter(|(name, default)| default.is_none() && !def.attrs.contains_key(*name))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Op name -> definition
#[derive(Debug, Clone, Default)]
pub struct OpRegistry {
    ops: HashMap<String, Arc<OpDef>>,
}

impl OpRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every op that has a built-in kernel
    pub fn with_builtin_ops() -> Self {
        let mut registry = Self::new();
        for op in builtin_ops() {
            registry.register(op);
        }
        registry
    }

    /// Register (or replace) an op definition
    pub fn register(&mut self, op: OpDef) -> &mut Self {
        self.ops.insert(op.name.clone(), Arc::new(op));
        self
    }

    pub fn lookup(&self, name: &str) -> FastGraphResult<Arc<OpDef>> {
        self.ops
            .get(name)
            .cloned()
            .ok_or_else(|| FastGraphError::not_found(format!("Op type not registered '{}'", name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

fn builtin_ops() -> Vec<OpDef> {
    vec![
        OpDef::new("Placeholder")
            .output(ArgDef::new("output", "dtype"))
            .attr("dtype", DataType::Float)
            .attr("shape", AttrValue::Shape(Vec::new())),
        OpDef::new("Const")
            .output(ArgDef::new("output", "dtype"))
            .required_attr("value")
            .required_attr("dtype"),
        OpDef::new("Identity")
            .input(ArgDef::new("input", "T"))
            .output(ArgDef::new("output", "T"))
            .attr("T", DataType::Float),
        OpDef::new("Scale")
            .input(ArgDef::new("x", "T"))
            .output(ArgDef::new("y", "T"))
            .attr("T", DataType::Float)
            .attr("factor", 1.0),
        OpDef::new("Add")
            .input(ArgDef::new("x", "T"))
            .input(ArgDef::new("y", "T"))
            .output(ArgDef::new("z", "T"))
            .attr("T", DataType::Float),
        OpDef::new("Mul")
            .input(ArgDef::new("x", "T"))
            .input(ArgDef::new("y", "T"))
            .output(ArgDef::new("z", "T"))
            .attr("T", DataType::Float),
        OpDef::new("Relu")
            .input(ArgDef::new("features", "T"))
            .output(ArgDef::new("activations", "T"))
            .attr("T", DataType::Float),
        OpDef::new("Merge")
            .input(ArgDef::new("inputs", "T").repeated("N"))
            .output(ArgDef::new("output", "T"))
            .output(ArgDef::new("value_index", "int32"))
            .attr("T", DataType::Float)
            .attr("N", 2i64)
            .merge(),
        OpDef::new("Switch")
            .input(ArgDef::new("data", "T"))
            .input(ArgDef::new("pred", "bool"))
            .output(ArgDef::new("output_false", "T"))
            .output(ArgDef::new("output_true", "T"))
            .attr("T", DataType::Float)
            .switch(),
        OpDef::new("Variable")
            .output(ArgDef::new("ref", "dtype").reference())
            .attr("dtype", DataType::Float)
            .attr("shape", AttrValue::Shape(Vec::new())),
        OpDef::new("Assign")
            .input(ArgDef::new("ref", "T").reference())
            .input(ArgDef::new("value", "T"))
            .output(ArgDef::new("output_ref", "T").reference())
            .attr("T", DataType::Float)
            .allows_uninitialized_input(),
        OpDef::new("Send")
            .input(ArgDef::new("tensor", "T"))
            .attr("T", DataType::Float)
            .required_attr("tensor_name")
            .transfer(),
        OpDef::new("Recv")
            .output(ArgDef::new("tensor", "tensor_type"))
            .attr("tensor_type", DataType::Float)
            .required_attr("tensor_name")
            .recv(),
    ]
}
