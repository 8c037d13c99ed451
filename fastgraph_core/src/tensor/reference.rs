use super::{DataType, Tensor};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;

/// Shared, guarded tensor cell backing reference-typed slots.
///
/// Every holder of a clone sees the same tensor. All reads and writes go
/// through the cell's mutex; callers hold the guard only for the duration of
/// a copy in or out.
#[derive(Clone)]
pub struct TensorRef {
    dtype: DataType,
    cell: Arc<Mutex<Tensor>>,
}

impl TensorRef {
    pub fn new(tensor: Tensor) -> Self {
        Self {
            dtype: tensor.dtype(),
            cell: Arc::new(Mutex::new(tensor)),
        }
    }

    /// A cell that has not been assigned yet
    pub fn uninitialized(dtype: DataType, shape: &[usize]) -> Self {
        Self::new(Tensor::uninitialized(dtype, shape))
    }

    /// Element type fixed at creation; assignments must keep it
    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn lock(&self) -> MutexGuard<'_, Tensor> {
        self.cell.lock()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.lock().is_initialized()
    }

    /// Copy the current value out under the guard.
    pub fn snapshot(&self) -> Tensor {
        self.cell.lock().clone()
    }

    /// Replace the current value under the guard.
    pub fn assign(&self, value: Tensor) {
        *self.cell.lock() = value;
    }

    /// True if both handles point at the same cell
    pub fn same_cell(&self, other: &TensorRef) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl fmt::Debug for TensorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.try_lock() {
            Some(t) => write!(f, "TensorRef({:?})", *t),
            None => write!(f, "TensorRef<{}>(locked)", self.dtype),
        }
    }
}
