//! Tensor array ops. Arrays are values here: a write produces the next
//! version of the array as a new value and leaves the old one readable.

use crate::{
    builder::{Builder, Value},
    context::Context,
    error::{Error, Result},
    identity::Id,
    kernels,
    ops::Op,
    tensor::TensorArray,
    types::{ArrayType, DYNAMIC, DataType, TensorType, join_dims, normalize_axis},
};

#[derive(Debug, Clone)]
pub struct CreateArray {
    pub dtype: DataType,
    pub out: Id,
}

impl Op for CreateArray {
    fn name(&self) -> &str {
        "create_array"
    }

    fn eval(&self, ctx: &mut Context) -> Result<()> {
        ctx.insert(self.out, TensorArray::new(self.dtype));
        Ok(())
    }

    fn inputs(&self) -> Vec<Id> {
        vec![]
    }

    fn outputs(&self) -> Vec<Id> {
        vec![self.out]
    }
}

#[derive(Debug, Clone)]
pub struct CreateArrayLike {
    pub x: Id,
    pub value: f64,
    pub out: Id,
}

impl Op for CreateArrayLike {
    fn name(&self) -> &str {
        "create_array_like"
    }

    fn eval(&self, ctx: &mut Context) -> Result<()> {
        let x = ctx.array(&self.x, "create_array_like")?;
        let out = kernels::create_array_like(ctx.device(), x, self.value)?;
        ctx.insert(self.out, out);
        Ok(())
    }

    fn inputs(&self) -> Vec<Id> {
        vec![self.x]
    }

    fn outputs(&self) -> Vec<Id> {
        vec![self.out]
    }
}

#[derive(Debug, Clone)]
pub struct ArrayLength {
    pub x: Id,
    pub out: Id,
}

impl Op for ArrayLength {
    fn name(&self) -> &str {
        "array_length"
    }

    fn eval(&self, ctx: &mut Context) -> Result<()> {
        let x = ctx.array(&self.x, "array_length")?;
        let out = kernels::array_length(ctx.device(), x)?;
        ctx.insert(self.out, out);
        Ok(())
    }

    fn inputs(&self) -> Vec<Id> {
        vec![self.x]
    }

    fn outputs(&self) -> Vec<Id> {
        vec![self.out]
    }
}

#[derive(Debug, Clone)]
pub struct ArrayRead {
    pub array: Id,
    pub i: Id,
    pub out: Id,
}

impl Op for ArrayRead {
    fn name(&self) -> &str {
        "array_read"
    }

    fn eval(&self, ctx: &mut Context) -> Result<()> {
        let i = ctx.tensor(&self.i, "array_read")?.to_index("array_read")?;
        let item = ctx.array(&self.array, "array_read")?.read(i, "array_read")?.clone();
        ctx.insert(self.out, item);
        Ok(())
    }

    fn inputs(&self) -> Vec<Id> {
        vec![self.array, self.i]
    }

    fn outputs(&self) -> Vec<Id> {
        vec![self.out]
    }
}

#[derive(Debug, Clone)]
pub struct ArrayWrite {
    pub array: Id,
    pub x: Id,
    pub i: Id,
    pub out: Id,
}

impl Op for ArrayWrite {
    fn name(&self) -> &str {
        "array_write_"
    }

    fn eval(&self, ctx: &mut Context) -> Result<()> {
        let i = ctx.tensor(&self.i, "array_write_")?.to_index("array_write_")?;
        let x = ctx.tensor(&self.x, "array_write_")?.clone();
        let next = ctx
            .array(&self.array, "array_write_")?
            .with_item(i, x, "array_write_")?;
        ctx.insert(self.out, next);
        Ok(())
    }

    fn inputs(&self) -> Vec<Id> {
        vec![self.array, self.x, self.i]
    }

    fn outputs(&self) -> Vec<Id> {
        vec![self.out]
    }
}

#[derive(Debug, Clone)]
pub struct ArrayToTensor {
    pub x: Id,
    pub axis: i64,
    pub use_stack: bool,
    pub out: Id,
    pub out_index: Id,
}

impl Op for ArrayToTensor {
    fn name(&self) -> &str {
        "array_to_tensor"
    }

    fn eval(&self, ctx: &mut Context) -> Result<()> {
        let x = ctx.array(&self.x, "array_to_tensor")?;
        let (out, index) = kernels::array_to_tensor(ctx.device(), x, self.axis, self.use_stack)?;
        ctx.insert(self.out, out);
        ctx.insert(self.out_index, index);
        Ok(())
    }

    fn vjp(&self, b: &mut Builder<'_>, out_grads: &[Option<Value>]) -> Result<Vec<Option<Value>>> {
        let Some(og) = out_grads.first().copied().flatten() else {
            return Ok(vec![None]);
        };
        let grad = b.tensor_to_array(Value::new(self.x), og, self.axis, self.use_stack)?;
        Ok(vec![Some(grad)])
    }

    fn inputs(&self) -> Vec<Id> {
        vec![self.x]
    }

    fn outputs(&self) -> Vec<Id> {
        vec![self.out, self.out_index]
    }
}

/// Gradient of `array_to_tensor`: `out_grad` cut back into slots shaped
/// like those of `x`.
#[derive(Debug, Clone)]
pub struct TensorToArray {
    pub x: Id,
    pub out_grad: Id,
    pub axis: i64,
    pub use_stack: bool,
    pub out: Id,
}

impl Op for TensorToArray {
    fn name(&self) -> &str {
        "tensor_to_array"
    }

    fn eval(&self, ctx: &mut Context) -> Result<()> {
        let x = ctx.array(&self.x, "tensor_to_array")?;
        let og = ctx.tensor(&self.out_grad, "tensor_to_array")?;
        let out = kernels::tensor_to_array(ctx.device(), x, og, self.axis, self.use_stack)?;
        ctx.insert(self.out, out);
        Ok(())
    }

    fn vjp(&self, b: &mut Builder<'_>, out_grads: &[Option<Value>]) -> Result<Vec<Option<Value>>> {
        let Some(og) = out_grads.first().copied().flatten() else {
            return Ok(vec![None, None]);
        };
        let (grad, _) = b.array_to_tensor(og, self.axis, self.use_stack)?;
        Ok(vec![None, Some(grad)])
    }

    fn inputs(&self) -> Vec<Id> {
        vec![self.x, self.out_grad]
    }

    fn outputs(&self) -> Vec<Id> {
        vec![self.out]
    }
}

#[derive(Debug, Clone)]
pub struct AddNArray {
    pub xs: Vec<Id>,
    pub out: Id,
}

impl Op for AddNArray {
    fn name(&self) -> &str {
        "add_n_array"
    }

    fn eval(&self, ctx: &mut Context) -> Result<()> {
        let xs = self
            .xs
            .iter()
            .map(|id| ctx.array(id, "add_n_array"))
            .collect::<Result<Vec<_>>>()?;
        let out = kernels::add_n_array(ctx.device(), &xs)?;
        ctx.insert(self.out, out);
        Ok(())
    }

    fn vjp(&self, _b: &mut Builder<'_>, out_grads: &[Option<Value>]) -> Result<Vec<Option<Value>>> {
        Ok(vec![out_grads.first().copied().flatten(); self.xs.len()])
    }

    fn inputs(&self) -> Vec<Id> {
        self.xs.clone()
    }

    fn outputs(&self) -> Vec<Id> {
        vec![self.out]
    }
}

#[derive(Debug, Clone)]
pub struct SliceArrayDense {
    pub x: Id,
    pub starts: Id,
    pub out: Id,
}

impl Op for SliceArrayDense {
    fn name(&self) -> &str {
        "slice_array_dense"
    }

    fn eval(&self, ctx: &mut Context) -> Result<()> {
        let starts = ctx
            .tensor(&self.starts, "slice_array_dense")?
            .to_indices("slice_array_dense")?;
        let Some(&start) = starts.first() else {
            return Err(Error::Invalid("slice_array_dense: starts is empty".to_string()));
        };
        let x = ctx.array(&self.x, "slice_array_dense")?;
        let out = kernels::slice_array_dense(ctx.device(), x, start)?;
        ctx.insert(self.out, out);
        Ok(())
    }

    fn inputs(&self) -> Vec<Id> {
        vec![self.x, self.starts]
    }

    fn outputs(&self) -> Vec<Id> {
        vec![self.out]
    }
}

/// Static type of `array_to_tensor` over elements of `element`.
fn joined_type(element: &TensorType, axis: i64, use_stack: bool) -> Result<TensorType> {
    let Some(dims) = &element.dims else {
        return Ok(TensorType::unranked(element.dtype));
    };
    let mut dims = dims.clone();
    if use_stack {
        let a = normalize_axis(axis, dims.len() + 1, "array_to_tensor")?;
        dims.insert(a, DYNAMIC);
    } else {
        let a = normalize_axis(axis, dims.len(), "array_to_tensor")?;
        dims[a] = DYNAMIC;
    }
    Ok(TensorType::new(dims, element.dtype))
}

impl Builder<'_> {
    #[must_use]
    pub fn create_array(&mut self, dtype: DataType) -> Value {
        let out = self.fresh(ArrayType {
            dtype,
            element_dims: None,
        });
        self.emit(CreateArray { dtype, out });
        Value::new(out)
    }

    pub fn create_array_like(&mut self, array: Value, value: f64) -> Result<Value> {
        let ty = self.array_type(array, "create_array_like")?;
        let out = self.fresh(ty);
        self.emit(CreateArrayLike {
            x: array.id(),
            value,
            out,
        });
        Ok(Value::new(out))
    }

    pub fn array_length(&mut self, array: Value) -> Result<Value> {
        self.array_type(array, "array_length")?;
        let out = self.fresh(TensorType::new([1], DataType::Int64));
        self.emit(ArrayLength {
            x: array.id(),
            out,
        });
        Ok(Value::new(out))
    }

    pub fn array_read(&mut self, array: Value, i: Value) -> Result<Value> {
        let ty = self.array_type(array, "array_read")?;
        self.index_type(i, "array_read")?;
        let out = self.fresh(ty.element());
        self.emit(ArrayRead {
            array: array.id(),
            i: i.id(),
            out,
        });
        Ok(Value::new(out))
    }

    /// The next version of `array`, with slot `i` holding `x`.
    pub fn array_write_(&mut self, array: Value, x: Value, i: Value) -> Result<Value> {
        let ty = self.array_type(array, "array_write_")?;
        let x_ty = self.tensor_type(x, "array_write_")?;
        self.index_type(i, "array_write_")?;
        if x_ty.dtype != ty.dtype {
            return Err(Error::DtypeMismatch {
                op: "array_write_",
                expected: ty.dtype,
                actual: x_ty.dtype,
            });
        }
        let element_dims = match &ty.element_dims {
            None => x_ty.dims,
            known => join_dims(known, &x_ty.dims),
        };
        let out = self.fresh(ArrayType {
            dtype: ty.dtype,
            element_dims,
        });
        self.emit(ArrayWrite {
            array: array.id(),
            x: x.id(),
            i: i.id(),
            out,
        });
        Ok(Value::new(out))
    }

    /// Joins every slot along `axis`, stacking when `use_stack` is set.
    /// Also returns each slot's extent along `axis` as int32.
    pub fn array_to_tensor(&mut self, array: Value, axis: i64, use_stack: bool) -> Result<(Value, Value)> {
        let ty = self.array_type(array, "array_to_tensor")?;
        let out_ty = joined_type(&ty.element(), axis, use_stack)?;
        let out = self.fresh(out_ty);
        let out_index = self.fresh(TensorType::new([DYNAMIC], DataType::Int32));
        self.emit(ArrayToTensor {
            x: array.id(),
            axis,
            use_stack,
            out,
            out_index,
        });
        Ok((Value::new(out), Value::new(out_index)))
    }

    pub fn tensor_to_array(
        &mut self,
        array: Value,
        out_grad: Value,
        axis: i64,
        use_stack: bool,
    ) -> Result<Value> {
        let ty = self.array_type(array, "tensor_to_array")?;
        let og = self.tensor_type(out_grad, "tensor_to_array")?;
        if let Some(rank) = og.rank() {
            normalize_axis(axis, rank, "tensor_to_array")?;
        }
        let out = self.fresh(ArrayType {
            dtype: og.dtype,
            element_dims: ty.element_dims,
        });
        self.emit(TensorToArray {
            x: array.id(),
            out_grad: out_grad.id(),
            axis,
            use_stack,
            out,
        });
        Ok(Value::new(out))
    }

    pub fn add_n_array(&mut self, arrays: &[Value]) -> Result<Value> {
        let Some((&first, rest)) = arrays.split_first() else {
            return Err(Error::Invalid("add_n_array: expects at least one input".to_string()));
        };
        let mut ty = self.array_type(first, "add_n_array")?;
        for &a in rest {
            let t = self.array_type(a, "add_n_array")?;
            if t.dtype != ty.dtype {
                return Err(Error::DtypeMismatch {
                    op: "add_n_array",
                    expected: ty.dtype,
                    actual: t.dtype,
                });
            }
            ty.element_dims = join_dims(&ty.element_dims, &t.element_dims);
        }
        let out = self.fresh(ty);
        self.emit(AddNArray {
            xs: arrays.iter().map(Value::id).collect(),
            out,
        });
        Ok(Value::new(out))
    }

    /// A dense copy of slot `starts[0]`.
    pub fn slice_array_dense(&mut self, array: Value, starts: Value) -> Result<Value> {
        let ty = self.array_type(array, "slice_array_dense")?;
        self.index_type(starts, "slice_array_dense")?;
        let out = self.fresh(ty.element());
        self.emit(SliceArrayDense {
            x: array.id(),
            starts: starts.id(),
            out,
        });
        Ok(Value::new(out))
    }
}
