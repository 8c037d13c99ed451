use crate::device::AllocatorAttributes;
use crate::error::{FastGraphError, FastGraphResult};
use crate::graph::Graph;
use crate::kernel::{KernelCache, KernelFactory, OpKernel};
use std::ops::Range;
use std::sync::Arc;

/// Per-node execution data, fixed at construction
#[derive(Clone)]
pub struct NodeItem {
    pub node_id: usize,
    pub kernel: Arc<dyn OpKernel>,
    /// Index of this node's first input entry
    pub input_start: usize,
    /// Index of this node's first output in the allocator-attribute array
    pub output_attr_start: usize,
    pub num_inputs: usize,
    pub num_outputs: usize,
}

impl NodeItem {
    pub fn input_range(&self) -> Range<usize> {
        self.input_start..self.input_start + self.num_inputs
    }

    pub fn output_attr_range(&self) -> Range<usize> {
        self.output_attr_start..self.output_attr_start + self.num_outputs
    }
}

impl std::fmt::Debug for NodeItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeItem")
            .field("node_id", &self.node_id)
            .field("kernel", &self.kernel.name())
            .field("input_start", &self.input_start)
            .field("output_attr_start", &self.output_attr_start)
            .finish()
    }
}

/// Node items indexed by node id, plus the designated input and output
/// nodes.
#[derive(Debug)]
pub struct NodeTable {
    items: Vec<NodeItem>,
    output_attrs: Vec<AllocatorAttributes>,
    total_inputs: usize,
    input_node: usize,
    output_node: usize,
}

impl NodeTable {
    /// Resolve a kernel for every node and lay out entry ranges.
    ///
    /// `session` must be held on `cache`. Kernel creation failures abort the
    /// build and carry the failing node's definition.
    pub fn build(
        graph: &Graph,
        cache: &KernelCache,
        session: &str,
        factory: &dyn KernelFactory,
        input_node: &str,
        output_node: Option<&str>,
    ) -> FastGraphResult<Self> {
        let input_node = graph
            .find_node(input_node)
            .ok_or_else(|| {
                FastGraphError::not_found(format!("Input node '{}' is not in the graph", input_node))
            })?
            .id();
        let output_node = match output_node {
            Some(name) => graph
                .find_node(name)
                .ok_or_else(|| {
                    FastGraphError::not_found(format!("Output node '{}' is not in the graph", name))
                })?
                .id(),
            None => graph
                .num_nodes()
                .checked_sub(1)
                .ok_or_else(|| FastGraphError::graph("Graph has no nodes"))?,
        };
        if graph.node(output_node).num_outputs() == 0 {
            return Err(FastGraphError::graph(format!(
                "Output node '{}' has no outputs",
                graph.node(output_node).name()
            )));
        }

        let mut items = Vec::with_capacity(graph.num_nodes());
        let mut input_start = 0;
        let mut output_attr_start = 0;
        for node in graph.nodes() {
            let def = node.def();
            let kernel = cache
                .find_or_create(session, node.name(), || factory.create_kernel(def))
                .map_err(|e| {
                    log::error!("Failed to create kernel for node '{}': {}", node.name(), e);
                    e.attach_def(def)
                })?;

            items.push(NodeItem {
                node_id: node.id(),
                kernel,
                input_start,
                output_attr_start,
                num_inputs: node.num_inputs(),
                num_outputs: node.num_outputs(),
            });
            input_start += node.num_inputs();
            output_attr_start += node.num_outputs();
        }

        Ok(Self {
            items,
            output_attrs: vec![AllocatorAttributes::host(); output_attr_start],
            total_inputs: input_start,
            input_node,
            output_node,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[NodeItem] {
        &self.items
    }

    pub fn item(&self, node_id: usize) -> &NodeItem {
        &self.items[node_id]
    }

    /// Size of the entry buffer a run needs
    pub fn total_inputs(&self) -> usize {
        self.total_inputs
    }

    pub fn total_outputs(&self) -> usize {
        self.output_attrs.len()
    }

    /// Allocator attributes for every output of `item`
    pub fn output_attrs(&self, item: &NodeItem) -> &[AllocatorAttributes] {
        &self.output_attrs[item.output_attr_range()]
    }

    pub fn input_node(&self) -> usize {
        self.input_node
    }

    pub fn output_node(&self) -> usize {
        self.output_node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphDef, NodeDef, OpRegistry};
    use crate::kernel::KernelRegistry;
    use crate::tensor::{DataType, Tensor};

    fn graph() -> Graph {
        let mut def = GraphDef::new()
            .with_node(NodeDef::new("INPUT_X", "Placeholder"))
            .with_node(
                NodeDef::new("c", "Const")
                    .with_attr("value", Tensor::scalar(1.0f32))
                    .with_attr("dtype", DataType::Float),
            )
            .with_node(NodeDef::new("sum", "Add").with_input("INPUT_X").with_input("c"))
            .with_node(NodeDef::new("out", "Identity").with_input("sum"));
        let registry = OpRegistry::with_builtin_ops();
        crate::graph::add_default_attrs(&mut def, &registry).unwrap();
        Graph::from_def(&def, &registry).unwrap()
    }

    #[test]
    fn test_prefix_sums() {
        let graph = graph();
        let cache = KernelCache::new();
        cache.add_hold("t");
        let table = NodeTable::build(
            &graph,
            &cache,
            "t",
            &KernelRegistry::with_builtin_kernels(),
            "INPUT_X",
            None,
        )
        .unwrap();

        let starts: Vec<_> = table.items().iter().map(|i| i.input_start).collect();
        assert_eq!(starts, vec![0, 0, 0, 2]);
        assert_eq!(table.total_inputs(), 3);
        assert_eq!(table.total_outputs(), 4);
        assert_eq!(table.output_node(), 3);
        assert!(table
            .output_attrs(table.item(2))
            .iter()
            .all(|a| a.on_host));
    }

    #[test]
    fn test_unknown_designated_nodes() {
        let graph = graph();
        let cache = KernelCache::new();
        cache.add_hold("t");
        let factory = KernelRegistry::with_builtin_kernels();

        let err = NodeTable::build(&graph, &cache, "t", &factory, "nope", None).unwrap_err();
        assert!(matches!(err, FastGraphError::NotFound(_)));
        let err =
            NodeTable::build(&graph, &cache, "t", &factory, "INPUT_X", Some("nope")).unwrap_err();
        assert!(matches!(err, FastGraphError::NotFound(_)));
    }
}
