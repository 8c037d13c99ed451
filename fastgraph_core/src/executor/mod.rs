//! # Fast executor
//!
//! Runs a static graph once per call, on one device, in node-id order.
//!
//! Construction builds a [`NodeTable`]: one kernel per node (through the
//! [`KernelCache`]) plus the layout of the per-run [`EntryBuffer`]. Every
//! [`FastExecutor::run`] then:
//!
//! 1. seeds the consumers of the designated input node with the caller's
//!    tensor,
//! 2. walks the remaining nodes in table order: prepare inputs, compute,
//!    check outputs, clear inputs, propagate outputs,
//! 3. copies the designated output node's first output into the caller's
//!    tensor.
//!
//! Any failure aborts the run; the caller's output is left untouched.

mod entry;
mod inputs;
mod node_table;
mod outputs;

pub use entry::{Entry, EntryBuffer};
pub use inputs::{prepare_inputs, PreparedInputs};
pub use node_table::{NodeItem, NodeTable};
pub use outputs::{process_outputs, propagate_outputs};

use crate::config::ExecutorConfig;
use crate::device::{CpuDevice, Device, KernelStats};
use crate::error::{FastGraphError, FastGraphResult};
use crate::graph::{add_default_attrs, Graph, GraphDef, OpRegistry};
use crate::kernel::{KernelCache, KernelContext, KernelFactory, KernelRegistry};
use crate::tensor::Tensor;
use std::sync::Arc;

/// Collaborators of an executor
pub struct ExecutorParams {
    pub device: Arc<dyn Device>,
    pub factory: Arc<dyn KernelFactory>,
    pub cache: Arc<KernelCache>,
    pub config: ExecutorConfig,
}

impl ExecutorParams {
    /// Built-in kernels on a CPU device with a private kernel cache
    pub fn new(config: ExecutorConfig) -> Self {
        let device = if config.kernel_timing {
            CpuDevice::new().with_kernel_timing()
        } else {
            CpuDevice::new()
        };
        Self {
            device: Arc::new(device),
            factory: Arc::new(KernelRegistry::with_builtin_kernels()),
            cache: Arc::new(KernelCache::new()),
            config,
        }
    }

    pub fn with_device(mut self, device: Arc<dyn Device>) -> Self {
        self.device = device;
        self
    }

    pub fn with_factory(mut self, factory: Arc<dyn KernelFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Share kernels with other executors of the same session
    pub fn with_cache(mut self, cache: Arc<KernelCache>) -> Self {
        self.cache = cache;
        self
    }
}

/// Single-pass, single-device graph executor
pub struct FastExecutor {
    graph: Graph,
    table: NodeTable,
    device: Arc<dyn Device>,
    factory: Arc<dyn KernelFactory>,
    cache: Arc<KernelCache>,
    config: ExecutorConfig,
    last_entries: Option<EntryBuffer>,
}

impl FastExecutor {
    /// Build an executor for `graph_def` with the built-in ops and kernels.
    ///
    /// Default attribute values are filled in before the graph is built.
    pub fn new(mut graph_def: GraphDef, config: ExecutorConfig) -> FastGraphResult<Self> {
        let registry = OpRegistry::with_builtin_ops();
        add_default_attrs(&mut graph_def, &registry)?;
        let graph = Graph::from_def(&graph_def, &registry)?;
        Self::with_params(graph, ExecutorParams::new(config))
    }

    pub fn with_params(graph: Graph, params: ExecutorParams) -> FastGraphResult<Self> {
        let ExecutorParams {
            device,
            factory,
            cache,
            config,
        } = params;

        if config.validate_order {
            graph.validate_execution_order()?;
        }

        cache.add_hold(&config.session_handle);
        let table = match NodeTable::build(
            &graph,
            &cache,
            &config.session_handle,
            factory.as_ref(),
            &config.input_node,
            config.output_node.as_deref(),
        ) {
            Ok(table) => table,
            Err(e) => {
                cache.remove_hold(&config.session_handle);
                return Err(e);
            }
        };

        log::info!(
            "Built executor for session '{}' on {}: {} nodes, {} input entries",
            config.session_handle,
            device.name(),
            table.len(),
            table.total_inputs()
        );
        for item in table.items() {
            let node = graph.node(item.node_id);
            log::info!(
                "  [{}] {} ({}) input_start={} output_attr_start={}",
                item.node_id,
                node.name(),
                node.op(),
                item.input_start,
                item.output_attr_start
            );
        }

        Ok(Self {
            graph,
            table,
            device,
            factory,
            cache,
            config,
            last_entries: None,
        })
    }

    /// Feed `input` to the designated input node and copy the designated
    /// output into `output`.
    ///
    /// An uninitialized `output` takes the produced tensor; an initialized
    /// one must match the produced dtype and element count. The entry buffer
    /// is dropped on return unless `retain_entries` is set.
    pub fn run(&mut self, input: &Tensor, output: &mut Tensor) -> FastGraphResult<()> {
        let mut entries = EntryBuffer::new(self.table.total_inputs());
        let result = self.execute(input, &mut entries);
        self.last_entries = self.config.retain_entries.then_some(entries);
        let produced = result?;

        if !produced.is_initialized() {
            return Err(FastGraphError::failed_precondition(format!(
                "Output node '{}' produced an uninitialized tensor",
                self.graph.node(self.table.output_node()).name()
            )));
        }
        if !output.is_initialized() {
            *output = produced;
            return Ok(());
        }
        if output.dtype() != produced.dtype() || output.num_elements() != produced.num_elements()
        {
            return Err(FastGraphError::invalid_argument(format!(
                "Output tensor is {} {:?} but the graph produced {} {:?}",
                output.dtype(),
                output.shape(),
                produced.dtype(),
                produced.shape()
            )));
        }
        output.copy_from(&produced)
    }

    /// Like [`run`](Self::run), returning a freshly allocated output
    pub fn run_to_tensor(&mut self, input: &Tensor) -> FastGraphResult<Tensor> {
        let mut output = Tensor::empty();
        self.run(input, &mut output)?;
        Ok(output)
    }

    fn execute(&self, input: &Tensor, entries: &mut EntryBuffer) -> FastGraphResult<Tensor> {
        let input_item = self.table.item(self.table.input_node());
        let input_node = self.graph.node(input_item.node_id);
        if let Some(expected) = input_node.output_types().first() {
            if expected.dtype != input.dtype() {
                return Err(FastGraphError::invalid_argument(format!(
                    "Input node '{}' expects {} but was fed {}",
                    input_node.name(),
                    expected.dtype,
                    input.dtype()
                )));
            }
        }

        let seeded: Vec<Entry> = self
            .table
            .output_attrs(input_item)
            .iter()
            .enumerate()
            .map(|(i, &attr)| {
                if i == 0 {
                    Entry::from_value(input.clone(), attr)
                } else {
                    Entry {
                        alloc_attr: attr,
                        ..Entry::default()
                    }
                }
            })
            .collect();
        propagate_outputs(input_node, &seeded, &self.table, entries);

        let mut result = if input_item.node_id == self.table.output_node() {
            seeded.first().and_then(Entry::resolve)
        } else {
            None
        };

        for (step, item) in self.table.items().iter().enumerate() {
            if item.node_id == input_item.node_id {
                continue;
            }
            let node = self.graph.node(item.node_id);
            log::debug!("Process node: {} step {} {}", item.node_id, step, node.def().summary());

            let prepared = prepare_inputs(node, item, entries)?;
            let mut ctx = KernelContext::new(
                prepared.inputs,
                prepared.alloc_attrs,
                self.table.output_attrs(item),
                self.graph.library(),
                prepared.is_input_dead,
            );

            self.device
                .compute(item.kernel.as_ref(), &mut ctx)
                .map_err(|e| {
                    log::warn!("Kernel '{}' failed: {}", node.name(), e);
                    e.into_compute_failure(node.def())
                })?;

            let outputs = process_outputs(node, &mut ctx)?;
            entries.clear_range(item.input_range());

            if item.node_id == self.table.output_node() {
                result = outputs.first().and_then(Entry::resolve);
            }
            propagate_outputs(node, &outputs, &self.table, entries);
        }

        let output_node = self.graph.node(self.table.output_node());
        result.ok_or_else(|| {
            FastGraphError::internal(format!(
                "Graph produced no output: '{}' did not produce output 0",
                output_node.name()
            ))
        })
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn node_table(&self) -> &NodeTable {
        &self.table
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    /// Entry buffer of the most recent run, successful or not, when
    /// `retain_entries` is set
    pub fn last_entries(&self) -> Option<&EntryBuffer> {
        self.last_entries.as_ref()
    }

    /// Per-kernel timings, empty unless the device records them
    pub fn kernel_stats(&self) -> Vec<KernelStats> {
        self.device.kernel_stats()
    }
}

impl Drop for FastExecutor {
    fn drop(&mut self) {
        for item in self.table.items() {
            self.factory.release_kernel(&item.kernel);
        }
        self.cache.remove_hold(&self.config.session_handle);
        log::debug!(
            "Released executor for session '{}'",
            self.config.session_handle
        );
    }
}
