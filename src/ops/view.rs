use crate::{
    builder::{Builder, Value},
    error::{Error, Result},
    kernel_op,
    kernels::{Attribute, DataLayout, infer_view_dims},
    types::{DYNAMIC, DataType, TensorType},
};

kernel_op!(
    ViewShape,
    disp: "view_shape",
    layout: DataLayout::Strided,
    inputs: [x],
    attrs: { dims: Vec<i64> => Attribute::Int64s(dims.clone()) },
    vjp: |this: &ViewShape, b: &mut Builder<'_>, og: Value| -> Result<Vec<Option<Value>>> {
        Ok(vec![Some(b.view_shape_grad(Value::new(this.x), og, &this.dims)?)])
    }
);

kernel_op!(
    ViewDtype,
    disp: "view_dtype",
    layout: DataLayout::Strided,
    inputs: [x],
    attrs: { dtype: DataType => Attribute::DataType(*dtype) },
    vjp: |this: &ViewDtype, b: &mut Builder<'_>, og: Value| -> Result<Vec<Option<Value>>> {
        Ok(vec![Some(b.view_dtype_grad(Value::new(this.x), og, this.dtype)?)])
    }
);

kernel_op!(
    ViewShapeGrad,
    disp: "view_grad_shape",
    layout: DataLayout::Strided,
    inputs: [x, out_grad],
    attrs: { dims: Vec<i64> => Attribute::Int64s(dims.clone()) },
    vjp: |this: &ViewShapeGrad, b: &mut Builder<'_>, og: Value| -> Result<Vec<Option<Value>>> {
        Ok(vec![None, Some(b.view_shape(og, &this.dims)?)])
    }
);

kernel_op!(
    ViewDtypeGrad,
    disp: "view_grad_dtype",
    layout: DataLayout::Strided,
    inputs: [x, out_grad],
    attrs: { dtype: DataType => Attribute::DataType(*dtype) },
    vjp: |this: &ViewDtypeGrad, b: &mut Builder<'_>, og: Value| -> Result<Vec<Option<Value>>> {
        Ok(vec![None, Some(b.view_dtype(og, this.dtype)?)])
    }
);

fn view_shape_type(x: &TensorType, dims: &[i64]) -> Result<TensorType> {
    let dynamic = dims.iter().filter(|&&d| d == DYNAMIC).count();
    if dynamic > 1 || dims.iter().any(|&d| d < DYNAMIC) {
        return Err(Error::ShapeMismatch {
            op: "view_shape",
            lhs: x.dims.clone().unwrap_or_default(),
            rhs: dims.to_vec(),
        });
    }
    match x.numel() {
        Some(numel) => {
            let resolved = infer_view_dims(&[numel as usize], dims)?;
            Ok(TensorType::new(
                resolved.into_iter().map(|d| d as i64).collect::<Vec<_>>(),
                x.dtype,
            ))
        }
        None => Ok(TensorType::new(dims, x.dtype)),
    }
}

/// Static dims of a `from` tensor viewed as `to`.
fn view_dtype_dims(
    dims: &Option<Vec<i64>>,
    from: DataType,
    to: DataType,
) -> Result<Option<Vec<i64>>> {
    let (src, dst) = (from.size_of() as i64, to.size_of() as i64);
    let Some(dims) = dims else {
        return Ok(None);
    };
    if src == dst {
        return Ok(Some(dims.clone()));
    }
    let Some((&last, rest)) = dims.split_last() else {
        return Err(Error::NotViewable(format!(
            "a 0-d {from} tensor can not be viewed as {to}"
        )));
    };
    let last = match last {
        DYNAMIC => DYNAMIC,
        d if src > dst => d.checked_mul(src / dst).ok_or_else(|| {
            Error::NotViewable(format!("last dim {d} overflows when viewing {from} as {to}"))
        })?,
        d if d % (dst / src) == 0 => d / (dst / src),
        d => {
            return Err(Error::NotViewable(format!(
                "last dim {d} is not divisible by {} to view {from} as {to}",
                dst / src
            )));
        }
    };
    let mut out = rest.to_vec();
    out.push(last);
    Ok(Some(out))
}

impl Builder<'_> {
    /// Same storage seen with shape `dims`; one extent may be `-1`.
    pub fn view_shape(&mut self, x: Value, dims: &[i64]) -> Result<Value> {
        let ty = view_shape_type(&self.tensor_type(x, "view_shape")?, dims)?;
        let out = self.fresh(ty);
        self.emit(ViewShape {
            x: x.id(),
            dims: dims.to_vec(),
            out,
        });
        Ok(Value::new(out))
    }

    /// Same bytes seen as `dtype`; the last extent absorbs the size change.
    pub fn view_dtype(&mut self, x: Value, dtype: DataType) -> Result<Value> {
        let x_ty = self.tensor_type(x, "view_dtype")?;
        let dims = view_dtype_dims(&x_ty.dims, x_ty.dtype, dtype)?;
        let out = self.fresh(TensorType { dims, dtype });
        self.emit(ViewDtype {
            x: x.id(),
            dtype,
            out,
        });
        Ok(Value::new(out))
    }

    /// `out_grad` viewed back to the shape of `x`.
    pub fn view_shape_grad(&mut self, x: Value, out_grad: Value, dims: &[i64]) -> Result<Value> {
        let x_ty = self.tensor_type(x, "view_shape_grad")?;
        let og_ty = self.tensor_type(out_grad, "view_shape_grad")?;
        match (x_ty.numel(), og_ty.numel()) {
            (Some(a), Some(b)) if a != b => {
                return Err(Error::ShapeMismatch {
                    op: "view_shape_grad",
                    lhs: x_ty.dims.unwrap_or_default(),
                    rhs: og_ty.dims.unwrap_or_default(),
                });
            }
            _ => {}
        }
        let out = self.fresh(TensorType {
            dims: x_ty.dims,
            dtype: og_ty.dtype,
        });
        self.emit(ViewShapeGrad {
            x: x.id(),
            out_grad: out_grad.id(),
            dims: dims.to_vec(),
            out,
        });
        Ok(Value::new(out))
    }

    /// `out_grad` viewed back as the dtype of `x`.
    pub fn view_dtype_grad(&mut self, x: Value, out_grad: Value, dtype: DataType) -> Result<Value> {
        let x_ty = self.tensor_type(x, "view_dtype_grad")?;
        let og_ty = self.tensor_type(out_grad, "view_dtype_grad")?;
        let dims = view_dtype_dims(&og_ty.dims, og_ty.dtype, x_ty.dtype)?;
        let out = self.fresh(TensorType {
            dims,
            dtype: x_ty.dtype,
        });
        self.emit(ViewDtypeGrad {
            x: x.id(),
            out_grad: out_grad.id(),
            dtype,
            out,
        });
        Ok(Value::new(out))
    }
}
