//! # Kernels
//!
//! The compute side of the executor:
//!
//! - **OpKernel**: one instance per graph node, invoked through `compute()`
//! - **KernelContext**: the inputs, outputs and allocator metadata of one
//!   invocation
//! - **KernelFactory / KernelRegistry**: build kernels from node definitions
//! - **KernelCache**: shares kernel instances across executors of a session
//!
//! ## Writing a kernel
//!
//! ```rust,ignore
//! struct Negate { def: NodeDef }
//!
//! impl OpKernel for Negate {
//!     fn def(&self) -> &NodeDef { &self.def }
//!
//!     fn compute(&self, ctx: &mut KernelContext<'_>) -> FastGraphResult<()> {
//!         let x = ctx.input(0)?.as_slice::<f32>()?;
//!         let y = x.iter().map(|v| -v).collect();
//!         ctx.set_output(0, Tensor::from_vec(y));
//!         Ok(())
//!     }
//! }
//! ```

pub mod builtin;
mod cache;
mod context;
mod factory;
mod rendezvous;

pub use cache::KernelCache;
pub use context::{KernelContext, TensorValue};
pub use factory::{KernelConstructor, KernelFactory, KernelRegistry};
pub use rendezvous::Rendezvous;

use crate::error::FastGraphResult;
use crate::graph::NodeDef;

/// A compute kernel bound to one graph node
pub trait OpKernel: Send + Sync {
    /// The node definition this kernel was created from
    fn def(&self) -> &NodeDef;

    /// Read inputs from `ctx` and write outputs back to it
    fn compute(&self, ctx: &mut KernelContext<'_>) -> FastGraphResult<()>;

    fn name(&self) -> &str {
        &self.def().name
    }

    fn type_string(&self) -> &str {
        &self.def().op
    }
}
