//! # fastgraph core
//!
//! A single-pass dataflow-graph executor for running a fixed, pre-built
//! computation graph many times with low per-call overhead.
//!
//! - **Graph**: typed nodes and edges built from a serialized [`GraphDef`]
//! - **Kernels**: one compute kernel per node, shared through a [`KernelCache`]
//! - **Device**: where kernels run, optionally timed
//! - **Executor**: node table, per-run entry buffer and the run loop
//!
//! ## Quick Start
//!
//! ```rust
//! use fastgraph_core::{ExecutorConfig, FastExecutor, GraphDef, NodeDef, Tensor};
//!
//! let graph = GraphDef::new()
//!     .with_node(NodeDef::new("INPUT_X", "Placeholder"))
//!     .with_node(NodeDef::new("double", "Scale").with_input("INPUT_X").with_attr("factor", 2.0));
//!
//! let mut exec = FastExecutor::new(graph, ExecutorConfig::default()).unwrap();
//! let out = exec.run_to_tensor(&Tensor::from_vec(vec![2.0f32])).unwrap();
//! assert_eq!(out.as_slice::<f32>().unwrap(), &[4.0]);
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod executor;
pub mod graph;
pub mod kernel;
pub mod session;
pub mod tensor;

// Re-export commonly used types for easy access
pub use config::ExecutorConfig;
pub use device::{AllocatorAttributes, CpuDevice, Device, KernelStats};
pub use error::{FastGraphError, FastGraphResult};
pub use executor::{Entry, EntryBuffer, ExecutorParams, FastExecutor, NodeItem, NodeTable};
pub use graph::{add_default_attrs, AttrValue, Graph, GraphDef, NodeDef, OpDef, OpRegistry};
pub use kernel::{
    KernelCache, KernelContext, KernelFactory, KernelRegistry, OpKernel, TensorValue,
};
pub use session::{load_session, new_fast_session, FastSession};
pub use tensor::{DataType, SlotType, Tensor, TensorRef};
