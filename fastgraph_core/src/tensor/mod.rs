//! # Tensors
//!
//! Dense, host-resident tensors used as the values flowing along graph edges.
//!
//! - **Tensor**: element type, shape and a reference-counted buffer. Clones
//!   share the buffer until one of them is written, at which point the writer
//!   gets its own copy.
//! - **TensorRef**: a shared, guarded cell used for reference-typed slots
//!   (state that outlives a single run).
//! - **SlotType**: the declared type of a graph input or output slot.

mod dtype;
mod reference;

pub use dtype::{DataType, SlotType};
pub use reference::TensorRef;

use crate::error::{FastGraphError, FastGraphResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Typed backing storage of a tensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorData {
    Float(Vec<f32>),
    Double(Vec<f64>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    #[serde(rename = "uint8")]
    UInt8(Vec<u8>),
    Bool(Vec<bool>),
}

impl TensorData {
    pub fn dtype(&self) -> DataType {
        match self {
            TensorData::Float(_) => DataType::Float,
            TensorData::Double(_) => DataType::Double,
            TensorData::Int32(_) => DataType::Int32,
            TensorData::Int64(_) => DataType::Int64,
            TensorData::UInt8(_) => DataType::UInt8,
            TensorData::Bool(_) => DataType::Bool,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TensorData::Float(v) => v.len(),
            TensorData::Double(v) => v.len(),
            TensorData::Int32(v) => v.len(),
            TensorData::Int64(v) => v.len(),
            TensorData::UInt8(v) => v.len(),
            TensorData::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zero-filled storage of `len` elements
    pub fn zeros(dtype: DataType, len: usize) -> Self {
        match dtype {
            DataType::Float => TensorData::Float(vec![0.0; len]),
            DataType::Double => TensorData::Double(vec![0.0; len]),
            DataType::Int32 => TensorData::Int32(vec![0; len]),
            DataType::Int64 => TensorData::Int64(vec![0; len]),
            DataType::UInt8 => TensorData::UInt8(vec![0; len]),
            DataType::Bool => TensorData::Bool(vec![false; len]),
        }
    }

    /// Overwrite every element with the matching element of `src`.
    fn copy_elements(&mut self, src: &TensorData) -> FastGraphResult<()> {
        match (self, src) {
            (TensorData::Float(d), TensorData::Float(s)) => d.copy_from_slice(s),
            (TensorData::Double(d), TensorData::Double(s)) => d.copy_from_slice(s),
            (TensorData::Int32(d), TensorData::Int32(s)) => d.copy_from_slice(s),
            (TensorData::Int64(d), TensorData::Int64(s)) => d.copy_from_slice(s),
            (TensorData::UInt8(d), TensorData::UInt8(s)) => d.copy_from_slice(s),
            (TensorData::Bool(d), TensorData::Bool(s)) => d.copy_from_slice(s),
            (d, s) => {
                return Err(FastGraphError::invalid_argument(format!(
                    "Cannot copy {} elements into {} storage",
                    s.dtype(),
                    d.dtype()
                )))
            }
        }
        Ok(())
    }
}

/// Rust element types that can live in a tensor
pub trait Element: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
    const DTYPE: DataType;

    fn wrap(data: Vec<Self>) -> TensorData;
    fn view(data: &TensorData) -> Option<&[Self]>;
    fn view_mut(data: &mut TensorData) -> Option<&mut [Self]>;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident) => {
        impl Element for $ty {
            const DTYPE: DataType = DataType::$variant;

            fn wrap(data: Vec<Self>) -> TensorData {
                TensorData::$variant(data)
            }

            fn view(data: &TensorData) -> Option<&[Self]> {
                match data {
                    TensorData::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn view_mut(data: &mut TensorData) -> Option<&mut [Self]> {
                match data {
                    TensorData::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_element!(f32, Float);
impl_element!(f64, Double);
impl_element!(i32, Int32);
impl_element!(i64, Int64);
impl_element!(u8, UInt8);
impl_element!(bool, Bool);

/// A dense tensor.
///
/// A tensor without a buffer is *uninitialized*; `Tensor::empty()` is the
/// sentinel the executor writes into consumed entry slots.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "TensorLiteral", into = "TensorLiteral")]
pub struct Tensor {
    dtype: DataType,
    shape: Vec<usize>,
    buffer: Option<Arc<TensorData>>,
}

impl Default for Tensor {
    fn default() -> Self {
        Self::empty()
    }
}

impl Tensor {
    /// The uninitialized float scalar used as the empty sentinel
    pub fn empty() -> Self {
        Self {
            dtype: DataType::Float,
            shape: Vec::new(),
            buffer: None,
        }
    }

    /// A typed, shaped tensor with no storage yet
    pub fn uninitialized(dtype: DataType, shape: &[usize]) -> Self {
        Self {
            dtype,
            shape: shape.to_vec(),
            buffer: None,
        }
    }

    pub fn new<T: Element>(shape: &[usize], data: Vec<T>) -> FastGraphResult<Self> {
        Self::from_data(shape, T::wrap(data))
    }

    pub fn from_data(shape: &[usize], data: TensorData) -> FastGraphResult<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(FastGraphError::invalid_argument(format!(
                "Shape {:?} needs {} elements, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            dtype: data.dtype(),
            shape: shape.to_vec(),
            buffer: Some(Arc::new(data)),
        })
    }

    /// One-dimensional tensor over `data`
    pub fn from_vec<T: Element>(data: Vec<T>) -> Self {
        let shape = vec![data.len()];
        Self {
            dtype: T::DTYPE,
            shape,
            buffer: Some(Arc::new(T::wrap(data))),
        }
    }

    pub fn scalar<T: Element>(value: T) -> Self {
        Self {
            dtype: T::DTYPE,
            shape: Vec::new(),
            buffer: Some(Arc::new(T::wrap(vec![value]))),
        }
    }

    pub fn zeros(dtype: DataType, shape: &[usize]) -> Self {
        let len = shape.iter().product();
        Self {
            dtype,
            shape: shape.to_vec(),
            buffer: Some(Arc::new(TensorData::zeros(dtype, len))),
        }
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_initialized(&self) -> bool {
        self.buffer.is_some()
    }

    /// True if this tensor is indistinguishable from `Tensor::empty()`
    pub fn is_empty_sentinel(&self) -> bool {
        self.buffer.is_none() && self.shape.is_empty() && self.dtype == DataType::Float
    }

    pub fn data(&self) -> Option<&TensorData> {
        self.buffer.as_deref()
    }

    /// Two tensors that share one buffer (no copy has happened yet)
    pub fn shares_buffer_with(&self, other: &Tensor) -> bool {
        match (&self.buffer, &other.buffer) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn as_slice<T: Element>(&self) -> FastGraphResult<&[T]> {
        let data = self.buffer.as_deref().ok_or_else(|| {
            FastGraphError::failed_precondition("Attempting to read an uninitialized tensor")
        })?;
        T::view(data).ok_or_else(|| {
            FastGraphError::invalid_argument(format!(
                "Tensor holds {} elements, requested {}",
                self.dtype,
                T::DTYPE
            ))
        })
    }

    /// Mutable view; copies the buffer first if another tensor shares it.
    pub fn as_mut_slice<T: Element>(&mut self) -> FastGraphResult<&mut [T]> {
        let dtype = self.dtype;
        let buffer = self.buffer.as_mut().ok_or_else(|| {
            FastGraphError::failed_precondition("Attempting to write an uninitialized tensor")
        })?;
        T::view_mut(Arc::make_mut(buffer)).ok_or_else(|| {
            FastGraphError::invalid_argument(format!(
                "Tensor holds {} elements, requested {}",
                dtype,
                T::DTYPE
            ))
        })
    }

    /// The single element of a one-element tensor
    pub fn scalar_value<T: Element>(&self) -> FastGraphResult<T> {
        let values = self.as_slice::<T>()?;
        match values {
            [v] => Ok(*v),
            _ => Err(FastGraphError::invalid_argument(format!(
                "Expected a single element, tensor has {}",
                values.len()
            ))),
        }
    }

    /// Overwrite this tensor's storage element for element from `src`.
    ///
    /// Both tensors must be initialized, share a dtype and hold the same
    /// number of elements. Shapes are not otherwise compared and no resize
    /// happens.
    pub fn copy_from(&mut self, src: &Tensor) -> FastGraphResult<()> {
        if src.dtype != self.dtype {
            return Err(FastGraphError::invalid_argument(format!(
                "Cannot copy a {} tensor into a {} tensor",
                src.dtype, self.dtype
            )));
        }
        if src.num_elements() != self.num_elements() {
            return Err(FastGraphError::invalid_argument(format!(
                "Cannot copy {} elements (shape {:?}) into {} elements (shape {:?})",
                src.num_elements(),
                src.shape,
                self.num_elements(),
                self.shape
            )));
        }
        let src_data = src.buffer.as_deref().ok_or_else(|| {
            FastGraphError::failed_precondition("Copy source tensor is uninitialized")
        })?;
        let dst = self.buffer.as_mut().ok_or_else(|| {
            FastGraphError::failed_precondition("Copy destination tensor is uninitialized")
        })?;
        Arc::make_mut(dst).copy_elements(src_data)
    }
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        self.dtype == other.dtype && self.shape == other.shape && self.data() == other.data()
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.buffer.as_deref() {
            Some(data) => write!(f, "Tensor<{}{:?}>({:?})", self.dtype, self.shape, data),
            None => write!(f, "Tensor<{}{:?}>(uninitialized)", self.dtype, self.shape),
        }
    }
}

/// Serialized form of a tensor, as it appears in `Const` attributes.
///
/// ```yaml
/// value:
///   shape: [2]
///   values: { float: [1.0, 2.0] }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TensorLiteral {
    /// Defaults to a one-dimensional shape over `values`
    #[serde(default)]
    pub shape: Option<Vec<usize>>,
    pub values: TensorData,
}

impl TryFrom<TensorLiteral> for Tensor {
    type Error = FastGraphError;

    fn try_from(lit: TensorLiteral) -> FastGraphResult<Self> {
        let shape = lit.shape.unwrap_or_else(|| vec![lit.values.len()]);
        Tensor::from_data(&shape, lit.values)
    }
}

impl From<Tensor> for TensorLiteral {
    fn from(t: Tensor) -> Self {
        // Uninitialized tensors never appear in graph definitions; they are
        // written out with empty storage.
        let values = match t.buffer {
            Some(buffer) => Arc::try_unwrap(buffer).unwrap_or_else(|shared| (*shared).clone()),
            None => TensorData::zeros(t.dtype, 0),
        };
        TensorLiteral {
            shape: Some(t.shape),
            values,
        }
    }
}
