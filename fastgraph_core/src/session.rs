//! One-input, one-output sessions over a [`FastExecutor`].

use crate::config::ExecutorConfig;
use crate::error::{FastGraphError, FastGraphResult};
use crate::executor::FastExecutor;
use crate::graph::GraphDef;
use crate::tensor::Tensor;
use std::path::Path;

/// Runs a fixed graph: one tensor in, one tensor out
pub trait FastSession: Send {
    fn run(&mut self, input: &Tensor, output: &mut Tensor) -> FastGraphResult<()>;
}

impl FastSession for FastExecutor {
    fn run(&mut self, input: &Tensor, output: &mut Tensor) -> FastGraphResult<()> {
        FastExecutor::run(self, input, output)
    }
}

/// A session over `graph_def` with the default configuration
pub fn new_fast_session(graph_def: GraphDef) -> FastGraphResult<Box<dyn FastSession>> {
    new_fast_session_with_config(graph_def, ExecutorConfig::default())
}

pub fn new_fast_session_with_config(
    graph_def: GraphDef,
    config: ExecutorConfig,
) -> FastGraphResult<Box<dyn FastSession>> {
    Ok(Box::new(FastExecutor::new(graph_def, config)?))
}

/// Read a graph definition from disk and build a session for it
pub fn load_session<P: AsRef<Path>>(path: P) -> FastGraphResult<Box<dyn FastSession>> {
    let path = path.as_ref();
    let graph_def = GraphDef::from_file(path).map_err(|e| {
        log::error!("Failed to load graph from {}: {}", path.display(), e);
        FastGraphError::not_found(format!(
            "Failed to load compute graph at '{}'",
            path.display()
        ))
    })?;
    new_fast_session(graph_def)
}
