//! # Graph model
//!
//! Turns a serialized [`GraphDef`] into a typed [`Graph`]:
//!
//! 1. **Defaults**: [`add_default_attrs`] fills attributes the definition
//!    leaves out, using the [`OpRegistry`].
//! 2. **Conversion**: [`Graph::from_def`] resolves every slot type, assigns
//!    dense node ids in definition order and builds the edge lists.
//!
//! Node ids double as execution order. [`Graph::validate_execution_order`]
//! checks that every edge points forward.

mod def;
mod node;
mod op_def;

pub use def::{AttrValue, FunctionDef, FunctionLibrary, GraphDef, InputRef, NodeDef};
pub use node::{Edge, Node};
pub use op_def::{ArgDef, ArgType, OpDef, OpRegistry};

use crate::error::{FastGraphError, FastGraphResult};
use std::collections::HashMap;

/// Fill in default attribute values for every node of `graph_def`.
///
/// Fails if a node uses an op the registry does not know.
pub fn add_default_attrs(graph_def: &mut GraphDef, registry: &OpRegistry) -> FastGraphResult<()> {
    for def in graph_def.nodes.iter_mut() {
        let op = registry
            .lookup(&def.op)
            .map_err(|e| FastGraphError::graph(format!("{} (node '{}')", e, def.name)))?;
        let added = op.add_default_attrs(def);
        if added > 0 {
            log::debug!("Added {} default attrs to node '{}'", added, def.name);
        }
    }
    Ok(())
}

/// An immutable, typed computation graph
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<Node>,
    name_index: HashMap<String, usize>,
    library: FunctionLibrary,
    version: i32,
}

impl Graph {
    /// Build a typed graph from its definition.
    ///
    /// Node ids follow definition order. Data inputs must precede control
    /// inputs, every input must name an existing node and output slot, and
    /// producer and consumer must agree on the element type. Whether a slot
    /// is reference-typed is checked when the graph runs.
    pub fn from_def(graph_def: &GraphDef, registry: &OpRegistry) -> FastGraphResult<Self> {
        let mut name_index = HashMap::with_capacity(graph_def.nodes.len());
        for (id, def) in graph_def.nodes.iter().enumerate() {
            if name_index.insert(def.name.clone(), id).is_some() {
                return Err(FastGraphError::graph(format!(
                    "Node '{}' is defined more than once",
                    def.name
                )));
            }
        }

        let mut nodes = Vec::with_capacity(graph_def.nodes.len());
        for (id, def) in graph_def.nodes.iter().enumerate() {
            nodes.push(Self::make_node(id, def, registry, graph_def)?);
        }

        let mut edges = Vec::new();
        for dst in &nodes {
            let mut dst_input = 0;
            let mut seen_control = false;
            for input in &dst.def.inputs {
                let parsed = InputRef::parse(input)?;
                let src = *name_index.get(parsed.node).ok_or_else(|| {
                    FastGraphError::graph(format!(
                        "Node '{}': unknown input node '{}'",
                        dst.name(),
                        parsed.node
                    ))
                })?;

                if parsed.is_control {
                    seen_control = true;
                    edges.push(Edge {
                        src,
                        src_output: 0,
                        dst: dst.id,
                        dst_input: 0,
                        is_control: true,
                    });
                    continue;
                }
                if seen_control {
                    return Err(FastGraphError::graph(format!(
                        "Node '{}': data input '{}' after control input",
                        dst.name(),
                        input
                    )));
                }
                if dst_input >= dst.num_inputs() {
                    return Err(FastGraphError::graph(format!(
                        "Node '{}' takes {} inputs, definition lists more",
                        dst.name(),
                        dst.num_inputs()
                    )));
                }

                let src_node = &nodes[src];
                if parsed.slot >= src_node.num_outputs() {
                    return Err(FastGraphError::graph(format!(
                        "Node '{}': input '{}' names output {} but '{}' has {} outputs",
                        dst.name(),
                        input,
                        parsed.slot,
                        src_node.name(),
                        src_node.num_outputs()
                    )));
                }

                let produced = src_node.output_type(parsed.slot);
                let expected = dst.input_type(dst_input);
                if produced.dtype != expected.dtype {
                    return Err(FastGraphError::graph(format!(
                        "Node '{}': input {} expects {} but '{}' produces {}",
                        dst.name(),
                        dst_input,
                        expected,
                        input,
                        produced
                    )));
                }

                edges.push(Edge {
                    src,
                    src_output: parsed.slot,
                    dst: dst.id,
                    dst_input,
                    is_control: false,
                });
                dst_input += 1;
            }

            if dst_input != dst.num_inputs() {
                return Err(FastGraphError::graph(format!(
                    "Node '{}' takes {} inputs, definition lists {}",
                    dst.name(),
                    dst.num_inputs(),
                    dst_input
                )));
            }
        }

        for edge in edges {
            nodes[edge.src].out_edges.push(edge);
            nodes[edge.dst].in_edges.push(edge);
        }

        Ok(Self {
            nodes,
            name_index,
            library: FunctionLibrary::new(graph_def.library.clone()),
            version: graph_def.version,
        })
    }

    fn make_node(
        id: usize,
        def: &NodeDef,
        registry: &OpRegistry,
        graph_def: &GraphDef,
    ) -> FastGraphResult<Node> {
        let op_def = registry.lookup(&def.op).map_err(|e| {
            if graph_def.library.iter().any(|f| f.name == def.op) {
                FastGraphError::graph(format!(
                    "Node '{}' calls library function '{}'; function calls are not executable",
                    def.name, def.op
                ))
            } else {
                FastGraphError::graph(format!("{} (node '{}')", e, def.name))
            }
        })?;

        let missing = op_def.missing_attrs(def);
        if !missing.is_empty() {
            return Err(FastGraphError::graph(format!(
                "Node '{}' is missing required attrs: {}",
                def.name,
                missing.join(", ")
            )));
        }

        let input_types = op_def
            .resolve_input_types(def)
            .map_err(|e| e.attach_def(def))?;
        let output_types = op_def
            .resolve_output_types(def)
            .map_err(|e| e.attach_def(def))?;

        Ok(Node {
            id,
            def: def.clone(),
            op_def,
            input_types,
            output_types,
            out_edges: Vec::new(),
            in_edges: Vec::new(),
        })
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: usize) -> &Node {
        &self.nodes[id]
    }

    pub fn find_node(&self, name: &str) -> Option<&Node> {
        self.name_index.get(name).map(|&id| &self.nodes[id])
    }

    pub fn library(&self) -> &FunctionLibrary {
        &self.library
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    /// Fail if any edge points backwards in id order, i.e. if walking nodes
    /// by id would run a consumer before its producer.
    pub fn validate_execution_order(&self) -> FastGraphResult<()> {
        for node in &self.nodes {
            for edge in &node.out_edges {
                if edge.dst <= edge.src {
                    return Err(FastGraphError::graph(format!(
                        "Node '{}' (id {}) consumes '{}' (id {}) but is ordered before it",
                        self.nodes[edge.dst].name(),
                        edge.dst,
                        node.name(),
                        edge.src
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{DataType, Tensor};

    fn registry() -> OpRegistry {
        OpRegistry::with_builtin_ops()
    }

    fn chain() -> GraphDef {
        GraphDef::new()
            .with_node(NodeDef::new("INPUT_X", "Placeholder"))
            .with_node(NodeDef::new("a", "Identity").with_input("INPUT_X"))
            .with_node(
                NodeDef::new("b", "Add")
                    .with_input("a")
                    .with_input("INPUT_X")
                    .with_input("^a"),
            )
    }

    #[test]
    fn test_from_def_builds_edges() {
        let mut def = chain();
        add_default_attrs(&mut def, &registry()).unwrap();
        let graph = Graph::from_def(&def, &registry()).unwrap();

        assert_eq!(graph.num_nodes(), 3);
        let input = graph.find_node("INPUT_X").unwrap();
        assert_eq!(input.out_edges().len(), 2);

        let b = graph.find_node("b").unwrap();
        assert_eq!(b.num_inputs(), 2);
        assert_eq!(b.in_edges().len(), 3);
        assert_eq!(b.in_edges().iter().filter(|e| e.is_control_edge()).count(), 1);

        let from_input = b.in_edges().iter().find(|e| e.src == input.id()).unwrap();
        assert_eq!(from_input.dst_input, 1);
        graph.validate_execution_order().unwrap();
    }

    #[test]
    fn test_missing_defaults_fail_conversion() {
        // Without default completion the type attribute of Identity is unset
        let err = Graph::from_def(&chain(), &registry()).unwrap_err();
        assert!(matches!(err, FastGraphError::Graph(_)));
    }

    #[test]
    fn test_rejects_unknown_input() {
        let mut def = GraphDef::new().with_node(NodeDef::new("a", "Identity").with_input("nope"));
        add_default_attrs(&mut def, &registry()).unwrap();
        assert!(Graph::from_def(&def, &registry()).is_err());
    }

    #[test]
    fn test_rejects_dtype_mismatch() {
        let mut def = GraphDef::new()
            .with_node(NodeDef::new("x", "Placeholder").with_attr("dtype", DataType::Int32))
            .with_node(NodeDef::new("y", "Identity").with_input("x"));
        add_default_attrs(&mut def, &registry()).unwrap();
        let err = Graph::from_def(&def, &registry()).unwrap_err();
        assert!(err.to_string().contains("expects float"));
    }

    #[test]
    fn test_rejects_bad_slot_and_arity() {
        let mut def = GraphDef::new()
            .with_node(NodeDef::new("x", "Placeholder"))
            .with_node(NodeDef::new("y", "Identity").with_input("x:1"));
        add_default_attrs(&mut def, &registry()).unwrap();
        assert!(Graph::from_def(&def, &registry()).is_err());

        let mut def = GraphDef::new()
            .with_node(NodeDef::new("x", "Placeholder"))
            .with_node(NodeDef::new("y", "Add").with_input("x"));
        add_default_attrs(&mut def, &registry()).unwrap();
        assert!(Graph::from_def(&def, &registry()).is_err());
    }

    #[test]
    fn test_required_attr() {
        let mut def = GraphDef::new().with_node(NodeDef::new("c", "Const"));
        add_default_attrs(&mut def, &registry()).unwrap();
        let err = Graph::from_def(&def, &registry()).unwrap_err();
        assert!(err.to_string().contains("value"));

        let mut def = GraphDef::new().with_node(
            NodeDef::new("c", "Const")
                .with_attr("dtype", DataType::Float)
                .with_attr("value", Tensor::scalar(1.0f32)),
        );
        add_default_attrs(&mut def, &registry()).unwrap();
        assert!(Graph::from_def(&def, &registry()).is_ok());
    }

    #[test]
    fn test_unknown_op_fails_defaults() {
        let mut def = GraphDef::new().with_node(NodeDef::new("t", "TopKV2"));
        assert!(add_default_attrs(&mut def, &registry()).is_err());
    }

    #[test]
    fn test_backward_edge_detected() {
        let mut def = GraphDef::new()
            .with_node(NodeDef::new("y", "Identity").with_input("x"))
            .with_node(NodeDef::new("x", "Placeholder"));
        add_default_attrs(&mut def, &registry()).unwrap();
        let graph = Graph::from_def(&def, &registry()).unwrap();
        assert!(graph.validate_execution_order().is_err());
    }
}
