// End-to-end behaviour of the fast executor
use fastgraph_core::error::FastGraphResult as Result;
use fastgraph_core::graph::{ArgDef, AttrValue, OpDef};
use fastgraph_core::{
    add_default_attrs, DataType, Entry, ExecutorConfig, ExecutorParams, FastExecutor,
    FastGraphError, Graph, GraphDef, KernelCache, KernelContext, KernelRegistry, NodeDef, OpKernel,
    OpRegistry, Tensor,
};
use std::sync::Arc;

/// Adds one to every element of its input, mutating its own copy in place
struct IncrementInPlace {
    def: NodeDef,
}

impl OpKernel for IncrementInPlace {
    fn def(&self) -> &NodeDef {
        &self.def
    }

    fn compute(&self, ctx: &mut KernelContext<'_>) -> Result<()> {
        let mut value = ctx.input(0)?.clone();
        for v in value.as_mut_slice::<f32>()? {
            *v += 1.0;
        }
        ctx.set_output(0, value);
        Ok(())
    }
}

/// Declares a value output but produces a reference
struct LeaksReference {
    def: NodeDef,
}

impl OpKernel for LeaksReference {
    fn def(&self) -> &NodeDef {
        &self.def
    }

    fn compute(&self, ctx: &mut KernelContext<'_>) -> Result<()> {
        let input = ctx.input(0)?.clone();
        ctx.set_output_ref(0, fastgraph_core::TensorRef::new(input));
        Ok(())
    }
}

/// Loads weights from a file that does not exist
struct MissingWeights {
    def: NodeDef,
}

impl OpKernel for MissingWeights {
    fn def(&self) -> &NodeDef {
        &self.def
    }

    fn compute(&self, ctx: &mut KernelContext<'_>) -> Result<()> {
        let raw = std::fs::read("/nonexistent/fastgraph/weights.bin")?;
        ctx.set_output(0, Tensor::from_vec(raw));
        Ok(())
    }
}

fn custom_registries() -> (OpRegistry, KernelRegistry) {
    let mut ops = OpRegistry::with_builtin_ops();
    ops.register(
        OpDef::new("IncrementInPlace")
            .input(ArgDef::new("x", "float"))
            .output(ArgDef::new("y", "float")),
    );
    ops.register(
        OpDef::new("LeaksReference")
            .input(ArgDef::new("x", "float"))
            .output(ArgDef::new("y", "float")),
    );
    ops.register(OpDef::new("NoKernel").output(ArgDef::new("y", "float")));
    ops.register(OpDef::new("MissingWeights").output(ArgDef::new("w", "uint8")));

    let mut kernels = KernelRegistry::with_builtin_kernels();
    kernels
        .register("IncrementInPlace", |def| {
            Ok(Box::new(IncrementInPlace { def: def.clone() }))
        })
        .register("LeaksReference", |def| {
            Ok(Box::new(LeaksReference { def: def.clone() }))
        })
        .register("MissingWeights", |def| {
            Ok(Box::new(MissingWeights { def: def.clone() }))
        });
    (ops, kernels)
}

fn build(mut def: GraphDef, config: ExecutorConfig) -> Result<FastExecutor> {
    let (ops, kernels) = custom_registries();
    add_default_attrs(&mut def, &ops)?;
    let graph = Graph::from_def(&def, &ops)?;
    FastExecutor::with_params(
        graph,
        ExecutorParams::new(config).with_factory(Arc::new(kernels)),
    )
}

fn input() -> NodeDef {
    NodeDef::new("INPUT_X", "Placeholder")
}

fn bool_const(name: &str, value: bool) -> NodeDef {
    NodeDef::new(name, "Const")
        .with_attr("value", Tensor::scalar(value))
        .with_attr("dtype", DataType::Bool)
}

#[test]
fn test_identity_graph() {
    let graph = GraphDef::new()
        .with_node(input())
        .with_node(NodeDef::new("out", "Identity").with_input("INPUT_X"));
    let mut exec = FastExecutor::new(graph, ExecutorConfig::default()).unwrap();

    let x = Tensor::new(&[2, 2], vec![1.0f32, -2.0, 3.5, 0.0]).unwrap();
    assert_eq!(exec.run_to_tensor(&x).unwrap(), x);
}

#[test]
fn test_passthrough_doubling() {
    let graph = GraphDef::new()
        .with_node(input())
        .with_node(NodeDef::new("pass", "Identity").with_input("INPUT_X"))
        .with_node(
            NodeDef::new("double", "Scale")
                .with_input("pass")
                .with_attr("factor", 2.0),
        );
    let mut exec = FastExecutor::new(graph, ExecutorConfig::default()).unwrap();

    let mut out = Tensor::zeros(DataType::Float, &[1]);
    exec.run(&Tensor::from_vec(vec![2.0f32]), &mut out).unwrap();
    assert_eq!(out.as_slice::<f32>().unwrap(), &[4.0]);
    exec.run(&Tensor::from_vec(vec![0.0f32]), &mut out).unwrap();
    assert_eq!(out.as_slice::<f32>().unwrap(), &[0.0]);
}

#[test]
fn test_input_start_is_prefix_sum() {
    let graph = GraphDef::new()
        .with_node(input())
        .with_node(NodeDef::new("a", "Relu").with_input("INPUT_X"))
        .with_node(NodeDef::new("b", "Add").with_input("INPUT_X").with_input("a"))
        .with_node(
            NodeDef::new("m", "Merge")
                .with_input("a")
                .with_input("b")
                .with_attr("N", 2i64),
        )
        .with_node(NodeDef::new("out", "Mul").with_input("m").with_input("b"));
    let exec = FastExecutor::new(graph, ExecutorConfig::default()).unwrap();
    let table = exec.node_table();

    let mut expected = 0;
    for item in table.items() {
        assert_eq!(item.input_start, expected);
        assert_eq!(item.num_inputs, exec.graph().node(item.node_id).num_inputs());
        expected += item.num_inputs;
    }
    assert_eq!(table.total_inputs(), expected);
    assert_eq!(expected, 7);
}

#[test]
fn test_entries_are_sentinels_after_run() {
    let graph = GraphDef::new()
        .with_node(input())
        .with_node(NodeDef::new("a", "Relu").with_input("INPUT_X"))
        .with_node(NodeDef::new("b", "Add").with_input("INPUT_X").with_input("a"));
    let config = ExecutorConfig::default().with_retained_entries(true);
    let mut exec = FastExecutor::new(graph, config).unwrap();
    exec.run_to_tensor(&Tensor::from_vec(vec![1.0f32, -1.0])).unwrap();

    let entries = exec.last_entries().unwrap();
    assert_eq!(entries.len(), 3);
    assert!(entries.entries().iter().all(Entry::is_empty_sentinel));
}

#[test]
fn test_fan_out_copies_are_independent() {
    // INPUT_X feeds three consumer slots; if any two shared storage the
    // in-place increments would leak into the identity.
    let graph = GraphDef::new()
        .with_node(input())
        .with_node(NodeDef::new("inc_a", "IncrementInPlace").with_input("INPUT_X"))
        .with_node(NodeDef::new("inc_b", "IncrementInPlace").with_input("INPUT_X"))
        .with_node(NodeDef::new("same", "Identity").with_input("INPUT_X"))
        .with_node(NodeDef::new("incs", "Add").with_input("inc_a").with_input("inc_b"))
        .with_node(NodeDef::new("sum", "Add").with_input("incs").with_input("same"));
    let mut exec = build(graph, ExecutorConfig::default()).unwrap();

    let x = Tensor::from_vec(vec![1.0f32, 10.0]);
    let out = exec.run_to_tensor(&x).unwrap();
    assert_eq!(out.as_slice::<f32>().unwrap(), &[5.0, 32.0]);
    assert_eq!(x.as_slice::<f32>().unwrap(), &[1.0, 10.0]);
}

#[test]
fn test_merge_with_one_input() {
    let graph = GraphDef::new()
        .with_node(input())
        .with_node(bool_const("pred", true))
        .with_node(
            NodeDef::new("sw", "Switch")
                .with_input("INPUT_X")
                .with_input("pred"),
        )
        .with_node(
            NodeDef::new("double", "Scale")
                .with_input("sw:1")
                .with_attr("factor", 2.0),
        )
        .with_node(NodeDef::new("m", "Merge").with_input("sw:0").with_input("double"));
    let mut exec = build(graph, ExecutorConfig::default().with_output_node("m")).unwrap();

    let out = exec.run_to_tensor(&Tensor::from_vec(vec![1.5f32])).unwrap();
    assert_eq!(out.as_slice::<f32>().unwrap(), &[3.0]);
}

#[test]
fn test_merge_with_no_inputs_fails() {
    let graph = GraphDef::new()
        .with_node(input())
        .with_node(bool_const("pred", false))
        .with_node(
            NodeDef::new("sw", "Switch")
                .with_input("INPUT_X")
                .with_input("pred"),
        )
        .with_node(
            NodeDef::new("m", "Merge")
                .with_input("sw:1")
                .with_input("sw:1")
                .with_attr("N", 2i64),
        );
    let mut exec = build(graph, ExecutorConfig::default()).unwrap();

    let err = exec.run_to_tensor(&Tensor::scalar(1.0f32)).unwrap_err();
    assert!(err.is_invalid_argument(), "unexpected error: {}", err);
    assert!(err.to_string().contains("[[Node: m = Merge["));
}

#[test]
fn test_missing_input_is_argument_error() {
    let graph = GraphDef::new()
        .with_node(input())
        .with_node(bool_const("pred", false))
        .with_node(
            NodeDef::new("sw", "Switch")
                .with_input("INPUT_X")
                .with_input("pred"),
        )
        .with_node(
            NodeDef::new("double", "Scale")
                .with_input("sw:1")
                .with_attr("factor", 2.0),
        );
    let mut exec = build(graph, ExecutorConfig::default()).unwrap();

    let mut out = Tensor::from_vec(vec![7.0f32]);
    let err = exec.run(&Tensor::from_vec(vec![1.0f32]), &mut out).unwrap_err();
    assert!(err.is_invalid_argument(), "unexpected error: {}", err);
    assert!(err.to_string().contains("double = Scale["));
    assert_eq!(out.as_slice::<f32>().unwrap(), &[7.0]);
}

#[test]
fn test_value_where_reference_expected() {
    let graph = GraphDef::new()
        .with_node(input())
        .with_node(
            NodeDef::new("assign", "Assign")
                .with_input("INPUT_X")
                .with_input("INPUT_X"),
        );
    let mut exec = build(graph, ExecutorConfig::default()).unwrap();

    let err = exec.run_to_tensor(&Tensor::scalar(1.0f32)).unwrap_err();
    assert!(err.is_invalid_argument(), "unexpected error: {}", err);
    assert!(err.to_string().contains("expects a ref type"));
}

#[test]
fn test_reference_where_value_declared() {
    let graph = GraphDef::new()
        .with_node(input())
        .with_node(NodeDef::new("leak", "LeaksReference").with_input("INPUT_X"));
    let mut exec = build(graph, ExecutorConfig::default()).unwrap();

    let err = exec.run_to_tensor(&Tensor::scalar(1.0f32)).unwrap_err();
    assert!(err.is_internal(), "unexpected error: {}", err);
}

#[test]
fn test_assign_then_read_through_reference() {
    let graph = GraphDef::new()
        .with_node(input())
        .with_node(NodeDef::new("v", "Variable"))
        .with_node(NodeDef::new("assign", "Assign").with_input("v").with_input("INPUT_X"))
        .with_node(NodeDef::new("read", "Identity").with_input("assign"));
    let mut exec = build(graph, ExecutorConfig::default().with_retained_entries(true)).unwrap();

    let out = exec.run_to_tensor(&Tensor::from_vec(vec![4.0f32, 5.0])).unwrap();
    assert_eq!(out.as_slice::<f32>().unwrap(), &[4.0, 5.0]);
    assert!(exec
        .last_entries()
        .unwrap()
        .entries()
        .iter()
        .all(Entry::is_empty_sentinel));
}

#[test]
fn test_uninitialized_reference_read() {
    let graph = GraphDef::new()
        .with_node(input())
        .with_node(NodeDef::new("v", "Variable"))
        .with_node(NodeDef::new("read", "Identity").with_input("v"));
    let mut exec = build(graph, ExecutorConfig::default()).unwrap();

    let err = exec.run_to_tensor(&Tensor::scalar(1.0f32)).unwrap_err();
    assert!(err.is_failed_precondition(), "unexpected error: {}", err);
    assert!(err.to_string().contains("uninitialized value v"));
}

#[test]
fn test_backward_edge_fails_construction() {
    let graph = GraphDef::new()
        .with_node(input())
        .with_node(NodeDef::new("late", "Identity").with_input("early"))
        .with_node(NodeDef::new("early", "Identity").with_input("INPUT_X"));
    let err = FastExecutor::new(graph, ExecutorConfig::default())
        .err()
        .unwrap();
    assert!(matches!(err, FastGraphError::Graph(_)));
}

#[test]
fn test_kernel_creation_failure() {
    let cache = Arc::new(KernelCache::new());
    let (ops, kernels) = custom_registries();
    let mut def = GraphDef::new()
        .with_node(input())
        .with_node(NodeDef::new("orphan", "NoKernel"));
    add_default_attrs(&mut def, &ops).unwrap();
    let graph = Graph::from_def(&def, &ops).unwrap();

    let params = ExecutorParams::new(ExecutorConfig::default())
        .with_factory(Arc::new(kernels))
        .with_cache(cache.clone());
    match FastExecutor::with_params(graph, params) {
        Err(FastGraphError::KernelCreation { node, .. }) => {
            assert!(node.starts_with("orphan = NoKernel["));
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("executor built without a kernel"),
    }
    assert!(!cache.is_held("fast_session"));
}

#[test]
fn test_executors_share_session_kernels() {
    let cache = Arc::new(KernelCache::new());
    let make = |session: &str| {
        let graph = GraphDef::new()
            .with_node(input())
            .with_node(NodeDef::new("out", "Relu").with_input("INPUT_X"));
        let (ops, _) = custom_registries();
        let mut def = graph;
        add_default_attrs(&mut def, &ops).unwrap();
        let graph = Graph::from_def(&def, &ops).unwrap();
        let params = ExecutorParams::new(ExecutorConfig::default().with_session(session))
            .with_cache(cache.clone());
        FastExecutor::with_params(graph, params).unwrap()
    };

    let first = make("shared");
    let second = make("shared");
    let other = make("other");
    let kernel = |exec: &FastExecutor| exec.node_table().item(1).kernel.clone();

    assert!(Arc::ptr_eq(&kernel(&first), &kernel(&second)));
    assert!(!Arc::ptr_eq(&kernel(&first), &kernel(&other)));

    drop(first);
    assert!(cache.is_held("shared"));
    drop(second);
    assert!(!cache.is_held("shared"));
    assert!(cache.is_held("other"));
}

#[test]
fn test_send_recv_transfer() {
    let graph = GraphDef::new()
        .with_node(input())
        .with_node(
            NodeDef::new("send", "Send")
                .with_input("INPUT_X")
                .with_attr("tensor_name", "x"),
        )
        .with_node(NodeDef::new("recv", "Recv").with_attr("tensor_name", "x"))
        .with_node(NodeDef::new("out", "Relu").with_input("recv"));
    let mut exec = FastExecutor::new(graph, ExecutorConfig::default()).unwrap();

    let out = exec.run_to_tensor(&Tensor::from_vec(vec![-1.0f32, 2.0])).unwrap();
    assert_eq!(out.as_slice::<f32>().unwrap(), &[0.0, 2.0]);
}

#[test]
fn test_dead_transfer_produces_no_output() {
    let graph = GraphDef::new()
        .with_node(input())
        .with_node(bool_const("pred", false))
        .with_node(
            NodeDef::new("sw", "Switch")
                .with_input("INPUT_X")
                .with_input("pred"),
        )
        .with_node(
            NodeDef::new("send", "Send")
                .with_input("sw:1")
                .with_attr("tensor_name", "branch"),
        )
        .with_node(NodeDef::new("recv", "Recv").with_attr("tensor_name", "branch"));
    let mut exec = FastExecutor::new(graph, ExecutorConfig::default()).unwrap();

    let err = exec.run_to_tensor(&Tensor::scalar(1.0f32)).unwrap_err();
    assert!(err.is_internal(), "unexpected error: {}", err);
    assert!(err.to_string().contains("produced no output"));
}

#[test]
fn test_failed_run_keeps_no_entries() {
    let graph = GraphDef::new()
        .with_node(input())
        .with_node(NodeDef::new("other", "Placeholder"))
        .with_node(NodeDef::new("sum", "Add").with_input("INPUT_X").with_input("other"));
    let mut exec = FastExecutor::new(graph, ExecutorConfig::default()).unwrap();

    assert!(exec.run_to_tensor(&Tensor::from_vec(vec![0.5f32; 1000])).is_err());
    assert!(exec.last_entries().is_none());
}

#[test]
fn test_unassigned_variable_output_leaves_caller_tensor() {
    let graph = GraphDef::new()
        .with_node(input())
        .with_node(NodeDef::new("v", "Variable").with_attr("shape", AttrValue::Shape(vec![2])));
    let mut exec = build(graph, ExecutorConfig::default()).unwrap();

    let mut out = Tensor::empty();
    let err = exec
        .run(&Tensor::from_vec(vec![1.0f32, 2.0]), &mut out)
        .unwrap_err();
    assert!(err.is_failed_precondition(), "unexpected error: {}", err);
    assert!(!out.is_initialized());
    assert!(out.is_empty_sentinel());
}

#[test]
fn test_kernel_failure_names_node() {
    let graph = GraphDef::new()
        .with_node(input())
        .with_node(NodeDef::new("weights", "MissingWeights"));
    let mut exec = build(graph, ExecutorConfig::default()).unwrap();

    match exec.run_to_tensor(&Tensor::scalar(1.0f32)) {
        Err(FastGraphError::Kernel { node, .. }) => {
            assert!(node.starts_with("weights = MissingWeights["));
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("run succeeded without weights"),
    }
}

#[test]
fn test_unfed_placeholder_carries_node() {
    let graph = GraphDef::new()
        .with_node(input())
        .with_node(NodeDef::new("other", "Placeholder"))
        .with_node(NodeDef::new("sum", "Add").with_input("INPUT_X").with_input("other"));
    let mut exec = FastExecutor::new(graph, ExecutorConfig::default()).unwrap();

    let err = exec.run_to_tensor(&Tensor::scalar(1.0f32)).unwrap_err();
    assert!(err.is_failed_precondition(), "unexpected error: {}", err);
    assert!(err.to_string().contains("[[Node: other = Placeholder["));
}

#[test]
fn test_control_edges_carry_no_tensor() {
    let graph = GraphDef::new()
        .with_node(input())
        .with_node(NodeDef::new("a", "Relu").with_input("INPUT_X"))
        .with_node(
            NodeDef::new("out", "Identity")
                .with_input("INPUT_X")
                .with_input("^a"),
        );
    let mut exec = FastExecutor::new(graph, ExecutorConfig::default()).unwrap();

    let out = exec.run_to_tensor(&Tensor::from_vec(vec![-3.0f32])).unwrap();
    assert_eq!(out.as_slice::<f32>().unwrap(), &[-3.0]);
}

#[test]
fn test_kernel_timing() {
    let graph = GraphDef::new()
        .with_node(input())
        .with_node(NodeDef::new("a", "Relu").with_input("INPUT_X"))
        .with_node(NodeDef::new("b", "Identity").with_input("a"));
    let mut exec =
        FastExecutor::new(graph, ExecutorConfig::default().with_kernel_timing(true)).unwrap();

    for _ in 0..3 {
        exec.run_to_tensor(&Tensor::scalar(1.0f32)).unwrap();
    }
    let stats = exec.kernel_stats();
    let names: Vec<_> = stats.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert!(stats.iter().all(|s| s.count == 3));
}
