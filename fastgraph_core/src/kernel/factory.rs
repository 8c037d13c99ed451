use super::builtin;
use super::rendezvous::Rendezvous;
use super::OpKernel;
use crate::error::{FastGraphError, FastGraphResult};
use crate::graph::NodeDef;
use std::collections::HashMap;
use std::sync::Arc;

/// Creates and releases kernels for node definitions
pub trait KernelFactory: Send + Sync {
    fn create_kernel(&self, def: &NodeDef) -> FastGraphResult<Arc<dyn OpKernel>>;

    /// Called once per node when an executor is torn down. Kernels held by a
    /// `KernelCache` stay alive until the cache drops them.
    fn release_kernel(&self, _kernel: &Arc<dyn OpKernel>) {}
}

/// Builds a kernel for one node definition
pub type KernelConstructor =
    Arc<dyn Fn(&NodeDef) -> FastGraphResult<Box<dyn OpKernel>> + Send + Sync>;

/// Op name -> kernel constructor
pub struct KernelRegistry {
    constructors: HashMap<String, KernelConstructor>,
    rendezvous: Arc<Rendezvous>,
}

impl Default for KernelRegistry {
    fn default() -> Self {
        Self::with_builtin_kernels()
    }
}

impl KernelRegistry {
    /// A registry with no kernels
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
            rendezvous: Arc::new(Rendezvous::new()),
        }
    }

    /// A registry with a kernel for every built-in op
    pub fn with_builtin_kernels() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    /// Register (or replace) the constructor for `op`
    pub fn register<F>(&mut self, op: &str, constructor: F) -> &mut Self
    where
        F: Fn(&NodeDef) -> FastGraphResult<Box<dyn OpKernel>> + Send + Sync + 'static,
    {
        self.constructors
            .insert(op.to_string(), Arc::new(constructor));
        self
    }

    pub fn contains(&self, op: &str) -> bool {
        self.constructors.contains_key(op)
    }

    /// The mailbox shared by this registry's `Send` and `Recv` kernels
    pub fn rendezvous(&self) -> &Arc<Rendezvous> {
        &self.rendezvous
    }
}

impl KernelFactory for KernelRegistry {
    fn create_kernel(&self, def: &NodeDef) -> FastGraphResult<Arc<dyn OpKernel>> {
        let constructor = self.constructors.get(&def.op).ok_or_else(|| {
            FastGraphError::KernelCreation {
                node: def.name.clone(),
                message: format!("No kernel registered for op '{}'", def.op),
            }
        })?;

        let kernel = constructor(def).map_err(|e| match e {
            FastGraphError::KernelCreation { .. } => e,
            other => FastGraphError::KernelCreation {
                node: def.name.clone(),
                message: other.to_string(),
            },
        })?;
        Ok(Arc::from(kernel))
    }
}
