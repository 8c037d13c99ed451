//! # Devices
//!
//! A device runs kernels. The executor hands every kernel invocation to
//! [`Device::compute`], whatever the kernel does.
//!
//! [`CpuDevice`] computes inline on the calling thread and can optionally
//! record per-kernel timings, kept in first-invocation order.

mod stats;

pub use stats::KernelStats;

use crate::error::FastGraphResult;
use crate::kernel::{KernelContext, OpKernel};
use colored::Colorize;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;

/// Where a tensor's backing memory lives.
///
/// The executor does not interpret these; it forwards them to kernels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AllocatorAttributes {
    pub on_host: bool,
    pub nic_compatible: bool,
    pub gpu_compatible: bool,
}

impl AllocatorAttributes {
    /// Host-resident memory
    pub fn host() -> Self {
        Self {
            on_host: true,
            ..Default::default()
        }
    }
}

/// Executes kernels
pub trait Device: Send + Sync {
    fn name(&self) -> &str;

    fn compute(&self, kernel: &dyn OpKernel, ctx: &mut KernelContext<'_>) -> FastGraphResult<()>;

    /// Per-kernel timings, if this device records them
    fn kernel_stats(&self) -> Vec<KernelStats> {
        Vec::new()
    }
}

#[derive(Default)]
struct KernelTimes {
    order: Vec<KernelStats>,
    index: HashMap<String, usize>,
}

/// Single-threaded host device
pub struct CpuDevice {
    name: String,
    timing: Option<Mutex<KernelTimes>>,
}

impl Default for CpuDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuDevice {
    pub fn new() -> Self {
        Self {
            name: "/job:localhost/replica:0/task:0/cpu:0".to_string(),
            timing: None,
        }
    }

    /// Record how long every kernel takes (builder pattern)
    pub fn with_kernel_timing(mut self) -> Self {
        self.timing = Some(Mutex::new(KernelTimes::default()));
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn is_timing(&self) -> bool {
        self.timing.is_some()
    }

    pub fn reset_kernel_stats(&self) {
        if let Some(times) = &self.timing {
            *times.lock() = KernelTimes::default();
        }
    }

    /// Print a timing table to stdout
    pub fn print_kernel_times(&self) {
        print_kernel_times(&self.kernel_stats());
    }
}

/// Print `stats` as a table to stdout
pub fn print_kernel_times(stats: &[KernelStats]) {
    if stats.is_empty() {
        println!("{}", "No kernel timings recorded".yellow());
        return;
    }

    let total: f64 = stats.iter().map(|s| s.total_us).sum();
    println!("\n{}", "=== Kernel Times ===".bold());
    println!(
        "{:<32} {:>8} {:>12} {:>12} {:>8}",
        "Kernel", "Calls", "Avg (us)", "Total (us)", "Share"
    );
    println!("{}", "-".repeat(76));
    for s in stats {
        let share = if total > 0.0 {
            s.total_us / total * 100.0
        } else {
            0.0
        };
        println!(
            "{:<32} {:>8} {:>12.2} {:>12.2} {:>7.1}%",
            s.name, s.count, s.avg_us, s.total_us, share
        );
    }
    println!("{}", "-".repeat(76));
    println!("{:<32} {:>8} {:>12} {:>12.2}", "Total".green(), "", "", total);
}

impl Device for CpuDevice {
    fn name(&self) -> &str {
        &self.name
    }

    /// Timings in the order kernels were first invoked
    fn kernel_stats(&self) -> Vec<KernelStats> {
        match &self.timing {
            Some(times) => times.lock().order.clone(),
            None => Vec::new(),
        }
    }

    fn compute(&self, kernel: &dyn OpKernel, ctx: &mut KernelContext<'_>) -> FastGraphResult<()> {
        let Some(timing) = &self.timing else {
            return kernel.compute(ctx);
        };

        let start = Instant::now();
        let result = kernel.compute(ctx);
        let elapsed_us = start.elapsed().as_secs_f64() * 1_000_000.0;

        let mut times = timing.lock();
        let KernelTimes { order, index } = &mut *times;
        let slot = *index.entry(kernel.name().to_string()).or_insert_with(|| {
            order.push(KernelStats::new(kernel.name()));
            order.len() - 1
        });
        order[slot].update(elapsed_us);

        result
    }
}
