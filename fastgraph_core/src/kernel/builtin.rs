//! Kernels for the built-in ops
//!
//! Arithmetic kernels work element-wise on equal shapes, or broadcast a
//! one-element operand over the other.

use super::factory::KernelRegistry;
use super::rendezvous::Rendezvous;
use super::{KernelContext, OpKernel};
use crate::error::{FastGraphError, FastGraphResult};
use crate::graph::NodeDef;
use crate::tensor::{DataType, Element, Tensor, TensorRef};
use std::sync::Arc;

/// Element types arithmetic kernels operate on
trait Numeric: Element + PartialOrd {
    const ZERO: Self;

    fn add(self, other: Self) -> Self;
    fn mul(self, other: Self) -> Self;
    fn to_f64(self) -> f64;
    fn from_f64(v: f64) -> Self;
}

macro_rules! impl_float {
    ($ty:ty) => {
        impl Numeric for $ty {
            const ZERO: Self = 0.0;

            fn add(self, other: Self) -> Self {
                self + other
            }

            fn mul(self, other: Self) -> Self {
                self * other
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(v: f64) -> Self {
                v as $ty
            }
        }
    };
}

macro_rules! impl_int {
    ($ty:ty) => {
        impl Numeric for $ty {
            const ZERO: Self = 0;

            fn add(self, other: Self) -> Self {
                self.wrapping_add(other)
            }

            fn mul(self, other: Self) -> Self {
                self.wrapping_mul(other)
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(v: f64) -> Self {
                v as $ty
            }
        }
    };
}

impl_float!(f32);
impl_float!(f64);
impl_int!(i32);
impl_int!(i64);
impl_int!(u8);

/// Run `$body` with `$t` bound to the Rust type of a numeric `$dtype`
macro_rules! dispatch_numeric {
    ($dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            DataType::Float => {
                type $t = f32;
                $body
            }
            DataType::Double => {
                type $t = f64;
                $body
            }
            DataType::Int32 => {
                type $t = i32;
                $body
            }
            DataType::Int64 => {
                type $t = i64;
                $body
            }
            DataType::UInt8 => {
                type $t = u8;
                $body
            }
            DataType::Bool => Err(FastGraphError::invalid_argument(
                "Arithmetic is not defined on bool tensors",
            )),
        }
    };
}

fn map_values<T: Numeric>(x: &Tensor, f: impl Fn(T) -> T) -> FastGraphResult<Tensor> {
    let values = x.as_slice::<T>()?.iter().map(|&v| f(v)).collect();
    Tensor::new(x.shape(), values)
}

fn zip_values<T: Numeric>(x: &Tensor, y: &Tensor, f: impl Fn(T, T) -> T) -> FastGraphResult<Tensor> {
    let a = x.as_slice::<T>()?;
    let b = y.as_slice::<T>()?;
    if x.shape() == y.shape() {
        Tensor::new(x.shape(), a.iter().zip(b).map(|(&p, &q)| f(p, q)).collect())
    } else if b.len() == 1 {
        Tensor::new(x.shape(), a.iter().map(|&p| f(p, b[0])).collect())
    } else if a.len() == 1 {
        Tensor::new(y.shape(), b.iter().map(|&q| f(a[0], q)).collect())
    } else {
        Err(FastGraphError::invalid_argument(format!(
            "Incompatible shapes: {:?} vs {:?}",
            x.shape(),
            y.shape()
        )))
    }
}

fn required_attr<'a>(def: &'a NodeDef, name: &str) -> FastGraphResult<&'a crate::graph::AttrValue> {
    def.attr(name).ok_or_else(|| {
        FastGraphError::invalid_argument(format!("Node '{}' has no attr '{}'", def.name, name))
    })
}

fn type_attr(def: &NodeDef, name: &str) -> FastGraphResult<DataType> {
    required_attr(def, name)?.as_type().ok_or_else(|| {
        FastGraphError::invalid_argument(format!("Attr '{}' of '{}' is not a type", name, def.name))
    })
}

fn string_attr(def: &NodeDef, name: &str) -> FastGraphResult<String> {
    required_attr(def, name)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            FastGraphError::invalid_argument(format!(
                "Attr '{}' of '{}' is not a string",
                name, def.name
            ))
        })
}

/// Stands for the graph's external input; computing it means nobody fed it.
pub struct PlaceholderOp {
    def: NodeDef,
}

impl OpKernel for PlaceholderOp {
    fn def(&self) -> &NodeDef {
        &self.def
    }

    fn compute(&self, _ctx: &mut KernelContext<'_>) -> FastGraphResult<()> {
        Err(FastGraphError::failed_precondition(format!(
            "You must feed a value for placeholder '{}'",
            self.def.name
        )))
    }
}

pub struct ConstOp {
    def: NodeDef,
    value: Tensor,
}

impl ConstOp {
    pub fn new(def: &NodeDef) -> FastGraphResult<Self> {
        let dtype = type_attr(def, "dtype")?;
        let value = required_attr(def, "value")?
            .as_tensor()
            .cloned()
            .ok_or_else(|| FastGraphError::invalid_argument("Attr 'value' is not a tensor"))?;
        if value.dtype() != dtype {
            return Err(FastGraphError::invalid_argument(format!(
                "Const value is {} but dtype is {}",
                value.dtype(),
                dtype
            )));
        }
        Ok(Self {
            def: def.clone(),
            value,
        })
    }
}

impl OpKernel for ConstOp {
    fn def(&self) -> &NodeDef {
        &self.def
    }

    fn compute(&self, ctx: &mut KernelContext<'_>) -> FastGraphResult<()> {
        ctx.set_output(0, self.value.clone());
        Ok(())
    }
}

pub struct IdentityOp {
    def: NodeDef,
}

impl OpKernel for IdentityOp {
    fn def(&self) -> &NodeDef {
        &self.def
    }

    fn compute(&self, ctx: &mut KernelContext<'_>) -> FastGraphResult<()> {
        let input = ctx.input(0)?.clone();
        ctx.set_output(0, input);
        Ok(())
    }
}

/// `y = x * factor`
pub struct ScaleOp {
    def: NodeDef,
    factor: f64,
}

impl ScaleOp {
    pub fn new(def: &NodeDef) -> FastGraphResult<Self> {
        let factor = required_attr(def, "factor")?.as_float().ok_or_else(|| {
            FastGraphError::invalid_argument("Attr 'factor' is not a number")
        })?;
        Ok(Self {
            def: def.clone(),
            factor,
        })
    }
}

impl OpKernel for ScaleOp {
    fn def(&self) -> &NodeDef {
        &self.def
    }

    fn compute(&self, ctx: &mut KernelContext<'_>) -> FastGraphResult<()> {
        let x = ctx.input(0)?;
        let factor = self.factor;
        let y = dispatch_numeric!(x.dtype(), T => map_values::<T>(x, |v| T::from_f64(v.to_f64() * factor)))?;
        ctx.set_output(0, y);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryKind {
    Add,
    Mul,
}

pub struct BinaryOp {
    def: NodeDef,
    kind: BinaryKind,
}

impl OpKernel for BinaryOp {
    fn def(&self) -> &NodeDef {
        &self.def
    }

    fn compute(&self, ctx: &mut KernelContext<'_>) -> FastGraphResult<()> {
        let x = ctx.input(0)?;
        let y = ctx.input(1)?;
        if x.dtype() != y.dtype() {
            return Err(FastGraphError::invalid_argument(format!(
                "Operands differ in type: {} vs {}",
                x.dtype(),
                y.dtype()
            )));
        }
        let z = match self.kind {
            BinaryKind::Add => dispatch_numeric!(x.dtype(), T => zip_values::<T>(x, y, <T as Numeric>::add)),
            BinaryKind::Mul => dispatch_numeric!(x.dtype(), T => zip_values::<T>(x, y, <T as Numeric>::mul)),
        }?;
        ctx.set_output(0, z);
        Ok(())
    }
}

pub struct ReluOp {
    def: NodeDef,
}

impl OpKernel for ReluOp {
    fn def(&self) -> &NodeDef {
        &self.def
    }

    fn compute(&self, ctx: &mut KernelContext<'_>) -> FastGraphResult<()> {
        let x = ctx.input(0)?;
        let y = dispatch_numeric!(x.dtype(), T => map_values::<T>(x, |v| if v > T::ZERO { v } else { T::ZERO }))?;
        ctx.set_output(0, y);
        Ok(())
    }
}

/// Forwards the first available input and reports which one it was
pub struct MergeOp {
    def: NodeDef,
}

impl OpKernel for MergeOp {
    fn def(&self) -> &NodeDef {
        &self.def
    }

    fn compute(&self, ctx: &mut KernelContext<'_>) -> FastGraphResult<()> {
        let index = (0..ctx.num_inputs())
            .find(|&i| ctx.has_input(i))
            .ok_or_else(|| FastGraphError::invalid_argument("Merge received no inputs"))?;
        let value = ctx.input(index)?.clone();
        ctx.set_output(0, value);
        ctx.set_output(1, Tensor::scalar(index as i32));
        Ok(())
    }
}

/// Routes `data` to output 1 when `pred` is true, otherwise to output 0
pub struct SwitchOp {
    def: NodeDef,
}

impl OpKernel for SwitchOp {
    fn def(&self) -> &NodeDef {
        &self.def
    }

    fn compute(&self, ctx: &mut KernelContext<'_>) -> FastGraphResult<()> {
        let pred = ctx.input(1)?.scalar_value::<bool>()?;
        let data = ctx.input(0)?.clone();
        ctx.set_output(usize::from(pred), data);
        Ok(())
    }
}

/// Mutable state that lives as long as the kernel, exposed by reference
pub struct VariableOp {
    def: NodeDef,
    cell: TensorRef,
}

impl VariableOp {
    pub fn new(def: &NodeDef) -> FastGraphResult<Self> {
        let dtype = type_attr(def, "dtype")?;
        let shape = def
            .attr("shape")
            .and_then(|a| a.as_shape())
            .unwrap_or(&[])
            .to_vec();
        Ok(Self {
            def: def.clone(),
            cell: TensorRef::uninitialized(dtype, &shape),
        })
    }

    pub fn cell(&self) -> &TensorRef {
        &self.cell
    }
}

impl OpKernel for VariableOp {
    fn def(&self) -> &NodeDef {
        &self.def
    }

    fn compute(&self, ctx: &mut KernelContext<'_>) -> FastGraphResult<()> {
        ctx.set_output_ref(0, self.cell.clone());
        Ok(())
    }
}

/// Writes `value` into the referenced cell and forwards the reference
pub struct AssignOp {
    def: NodeDef,
}

impl OpKernel for AssignOp {
    fn def(&self) -> &NodeDef {
        &self.def
    }

    fn compute(&self, ctx: &mut KernelContext<'_>) -> FastGraphResult<()> {
        let target = ctx.input_ref(0)?.clone();
        let value = ctx.input(1)?.clone();
        if value.dtype() != target.dtype() {
            return Err(FastGraphError::invalid_argument(format!(
                "Cannot assign {} to a {} reference",
                value.dtype(),
                target.dtype()
            )));
        }
        target.assign(value);
        ctx.set_output_ref(0, target);
        Ok(())
    }
}

pub struct SendOp {
    def: NodeDef,
    key: String,
    rendezvous: Arc<Rendezvous>,
}

impl SendOp {
    pub fn new(def: &NodeDef, rendezvous: Arc<Rendezvous>) -> FastGraphResult<Self> {
        Ok(Self {
            def: def.clone(),
            key: string_attr(def, "tensor_name")?,
            rendezvous,
        })
    }
}

impl OpKernel for SendOp {
    fn def(&self) -> &NodeDef {
        &self.def
    }

    fn compute(&self, ctx: &mut KernelContext<'_>) -> FastGraphResult<()> {
        if ctx.is_input_dead() {
            self.rendezvous.send(&self.key, None);
        } else {
            self.rendezvous.send(&self.key, Some(ctx.input(0)?.clone()));
        }
        Ok(())
    }
}

/// Produces whatever was sent under its key; dead if nothing live was sent
pub struct RecvOp {
    def: NodeDef,
    key: String,
    rendezvous: Arc<Rendezvous>,
}

impl RecvOp {
    pub fn new(def: &NodeDef, rendezvous: Arc<Rendezvous>) -> FastGraphResult<Self> {
        Ok(Self {
            def: def.clone(),
            key: string_attr(def, "tensor_name")?,
            rendezvous,
        })
    }
}

impl OpKernel for RecvOp {
    fn def(&self) -> &NodeDef {
        &self.def
    }

    fn compute(&self, ctx: &mut KernelContext<'_>) -> FastGraphResult<()> {
        match self.rendezvous.recv(&self.key) {
            Some(Some(tensor)) => ctx.set_output(0, tensor),
            Some(None) | None => ctx.set_output_dead(),
        }
        Ok(())
    }
}

fn boxed<K: OpKernel + 'static>(kernel: K) -> Box<dyn OpKernel> {
    Box::new(kernel)
}

pub(super) fn register_all(registry: &mut KernelRegistry) {
    registry
        .register("Placeholder", |def| Ok(boxed(PlaceholderOp { def: def.clone() })))
        .register("Const", |def| ConstOp::new(def).map(boxed))
        .register("Identity", |def| Ok(boxed(IdentityOp { def: def.clone() })))
        .register("Scale", |def| ScaleOp::new(def).map(boxed))
        .register("Add", |def| {
            Ok(boxed(BinaryOp {
                def: def.clone(),
                kind: BinaryKind::Add,
            }))
        })
        .register("Mul", |def| {
            Ok(boxed(BinaryOp {
                def: def.clone(),
                kind: BinaryKind::Mul,
            }))
        })
        .register("Relu", |def| Ok(boxed(ReluOp { def: def.clone() })))
        .register("Merge", |def| Ok(boxed(MergeOp { def: def.clone() })))
        .register("Switch", |def| Ok(boxed(SwitchOp { def: def.clone() })))
        .register("Variable", |def| VariableOp::new(def).map(boxed))
        .register("Assign", |def| Ok(boxed(AssignOp { def: def.clone() })));

    let rendezvous = registry.rendezvous().clone();
    registry.register("Send", move |def| {
        SendOp::new(def, rendezvous.clone()).map(boxed)
    });
    let rendezvous = registry.rendezvous().clone();
    registry.register("Recv", move |def| {
        RecvOp::new(def, rendezvous.clone()).map(boxed)
    });
}
