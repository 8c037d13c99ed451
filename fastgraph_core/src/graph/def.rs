//! Serialized graph definitions
//!
//! A graph is a list of node definitions. Each node names its op, its inputs
//! (`"node"`, `"node:slot"` or `"^node"` for control-only dependencies) and
//! its attributes. Definitions load from JSON, YAML or TOML.

use crate::error::{FastGraphError, FastGraphResult};
use crate::tensor::{DataType, Tensor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Attribute value attached to a node definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Shape(Vec<usize>),
    Tensor(Tensor),
    Type(DataType),
    Str(String),
}

impl AttrValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Integers are accepted as floats; TOML and YAML write `2` for `2.0`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttrValue::Float(v) => Some(*v),
            AttrValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            AttrValue::Type(t) => Some(t.as_str()),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<DataType> {
        match self {
            AttrValue::Type(t) => Some(*t),
            AttrValue::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_shape(&self) -> Option<&[usize]> {
        match self {
            AttrValue::Shape(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            AttrValue::Tensor(t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(v) => write!(f, "{}", v),
            AttrValue::Int(v) => write!(f, "{}", v),
            AttrValue::Float(v) => write!(f, "{}", v),
            AttrValue::Shape(s) => write!(f, "{:?}", s),
            AttrValue::Tensor(t) => write!(f, "Tensor<{}{:?}>", t.dtype(), t.shape()),
            AttrValue::Type(t) => write!(f, "{}", t),
            AttrValue::Str(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<DataType> for AttrValue {
    fn from(v: DataType) -> Self {
        AttrValue::Type(v)
    }
}

impl From<Tensor> for AttrValue {
    fn from(v: Tensor) -> Self {
        AttrValue::Tensor(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

/// One node of a serialized graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    pub name: String,
    pub op: String,

    #[serde(default)]
    pub inputs: Vec<String>,

    #[serde(default)]
    pub attrs: BTreeMap<String, AttrValue>,

    /// Requested device; recorded for diagnostics only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl NodeDef {
    pub fn new(name: &str, op: &str) -> Self {
        Self {
            name: name.to_string(),
            op: op.to_string(),
            inputs: Vec::new(),
            attrs: BTreeMap::new(),
            device: None,
        }
    }

    pub fn with_input(mut self, input: &str) -> Self {
        self.inputs.push(input.to_string());
        self
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    /// One-line rendering used in error messages: `name = Op[k=v](a, b:1)`
    pub fn summary(&self) -> String {
        let mut attrs: Vec<String> = self
            .attrs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        if let Some(device) = &self.device {
            attrs.push(format!("_device=\"{}\"", device));
        }
        format!(
            "{} = {}[{}]({})",
            self.name,
            self.op,
            attrs.join(", "),
            self.inputs.join(", ")
        )
    }
}

/// A parsed entry of `NodeDef::inputs`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRef<'a> {
    pub node: &'a str,
    pub slot: usize,
    pub is_control: bool,
}

impl<'a> InputRef<'a> {
    pub fn parse(input: &'a str) -> FastGraphResult<Self> {
        if let Some(node) = input.strip_prefix('^') {
            return Ok(Self {
                node,
                slot: 0,
                is_control: true,
            });
        }
        match input.rsplit_once(':') {
            Some((node, slot)) => {
                let slot = slot.parse::<usize>().map_err(|_| {
                    FastGraphError::graph(format!("Malformed input '{}': bad output slot", input))
                })?;
                Ok(Self {
                    node,
                    slot,
                    is_control: false,
                })
            }
            None => Ok(Self {
                node: input,
                slot: 0,
                is_control: false,
            }),
        }
    }
}

/// Auxiliary function definition carried with a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
}

/// The function definitions available to kernels of one graph
#[derive(Debug, Clone, Default)]
pub struct FunctionLibrary {
    functions: Vec<FunctionDef>,
}

impl FunctionLibrary {
    pub fn new(functions: Vec<FunctionDef>) -> Self {
        Self { functions }
    }

    pub fn find(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// A serialized graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDef {
    #[serde(default)]
    pub version: i32,

    #[serde(default)]
    pub nodes: Vec<NodeDef>,

    #[serde(default)]
    pub library: Vec<FunctionDef>,
}

impl GraphDef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node (builder pattern)
    pub fn with_node(mut self, node: NodeDef) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn node(&self, name: &str) -> Option<&NodeDef> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Load a graph from a file, picking the format from the extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> FastGraphResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            FastGraphError::graph(format!(
                "Failed to read graph file {}: {}",
                path.display(),
                e
            ))
        })?;

        match path.extension().and_then(|s| s.to_str()) {
            Some("json") => Self::from_json(&contents),
            Some("toml") => Self::from_toml(&contents),
            Some("yaml") | Some("yml") => Self::from_yaml(&contents),
            _ => Self::from_json(&contents)
                .or_else(|_| Self::from_toml(&contents))
                .or_else(|_| Self::from_yaml(&contents)),
        }
    }

    pub fn from_json(contents: &str) -> FastGraphResult<Self> {
        serde_json::from_str(contents)
            .map_err(|e| FastGraphError::graph(format!("Failed to parse JSON graph: {}", e)))
    }

    pub fn from_toml(contents: &str) -> FastGraphResult<Self> {
        toml::from_str(contents)
            .map_err(|e| FastGraphError::graph(format!("Failed to parse TOML graph: {}", e)))
    }

    pub fn from_yaml(contents: &str) -> FastGraphResult<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| FastGraphError::graph(format!("Failed to parse YAML graph: {}", e)))
    }

    pub fn to_json(&self) -> FastGraphResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
