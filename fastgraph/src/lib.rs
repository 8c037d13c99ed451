//! # fastgraph
//!
//! Run a fixed computation graph many times, one input tensor in and one
//! output tensor out, with as little per-call overhead as possible.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fastgraph::prelude::*;
//!
//! fn main() -> AnyResult<()> {
//!     let mut session = load_session("model.json")?;
//!
//!     let mut output = Tensor::empty();
//!     session.run(&Tensor::from_vec(vec![0.5f32; 4]), &mut output)?;
//!     println!("{:?}", output);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Static single-pass execution** in node order, no scheduler
//! - **Kernel sharing** across executors of one session
//! - **Graphs and configs** in JSON, TOML or YAML
//! - **Optional per-kernel timing**

pub use fastgraph_core::{self, *};

/// The fastgraph prelude - everything you need to get started
pub mod prelude {
    // Graph model
    pub use fastgraph_core::graph::{AttrValue, FunctionDef, GraphDef, NodeDef};
    pub use fastgraph_core::tensor::{DataType, Tensor, TensorRef};

    // Execution
    pub use fastgraph_core::config::ExecutorConfig;
    pub use fastgraph_core::executor::{ExecutorParams, FastExecutor};
    pub use fastgraph_core::session::{load_session, new_fast_session, FastSession};

    // Extending with kernels
    pub use fastgraph_core::kernel::{
        KernelCache, KernelContext, KernelFactory, KernelRegistry, OpKernel,
    };

    // Error types
    pub use fastgraph_core::error::{FastGraphError, FastGraphResult};
    pub type Result<T> = FastGraphResult<T>;

    // Common std types
    pub use std::sync::Arc;

    // Common traits
    pub use serde::{Deserialize, Serialize};

    // Re-export anyhow for error handling
    pub use anyhow::{anyhow, bail, ensure, Context, Result as AnyResult};
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get fastgraph version
pub fn version() -> &'static str {
    VERSION
}
