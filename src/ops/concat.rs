use crate::{
    builder::{Builder, Value},
    context::Context,
    error::{Error, Result},
    identity::Id,
    kernels,
    ops::Op,
    types::{DYNAMIC, TensorType, normalize_axis, unify_dims},
};

/// An axis fixed at build time or read from an integer tensor at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisArg {
    Static(i64),
    Dynamic(Id),
}

impl AxisArg {
    pub fn resolve(&self, ctx: &Context, op: &'static str) -> Result<i64> {
        match self {
            AxisArg::Static(axis) => Ok(*axis),
            AxisArg::Dynamic(id) => ctx.tensor(id, op)?.to_index(op),
        }
    }

    pub fn id(&self) -> Option<Id> {
        match self {
            AxisArg::Static(_) => None,
            AxisArg::Dynamic(id) => Some(*id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Concat {
    pub xs: Vec<Id>,
    pub axis: AxisArg,
    pub out: Id,
}

impl Op for Concat {
    fn name(&self) -> &str {
        "concat"
    }

    fn eval(&self, ctx: &mut Context) -> Result<()> {
        let axis = self.axis.resolve(ctx, "concat")?;
        let xs = self
            .xs
            .iter()
            .map(|id| ctx.tensor(id, "concat"))
            .collect::<Result<Vec<_>>>()?;
        let out = kernels::concat(ctx.device(), &xs, axis)?;
        ctx.insert(self.out, out);
        Ok(())
    }

    fn vjp(&self, b: &mut Builder<'_>, out_grads: &[Option<Value>]) -> Result<Vec<Option<Value>>> {
        let Some(og) = out_grads.first().copied().flatten() else {
            return Ok(vec![None; self.inputs().len()]);
        };
        let xs: Vec<Value> = self.xs.iter().copied().map(Value::new).collect();
        let mut grads: Vec<Option<Value>> = b
            .concat_grad_with(&xs, og, self.axis)?
            .into_iter()
            .map(Some)
            .collect();
        if self.axis.id().is_some() {
            grads.push(None);
        }
        Ok(grads)
    }

    fn inputs(&self) -> Vec<Id> {
        self.xs.iter().copied().chain(self.axis.id()).collect()
    }

    fn outputs(&self) -> Vec<Id> {
        vec![self.out]
    }
}

/// Splits `out_grad` back into pieces shaped like the concatenated inputs.
#[derive(Debug, Clone)]
pub struct ConcatGrad {
    pub xs: Vec<Id>,
    pub out_grad: Id,
    pub axis: AxisArg,
    pub outs: Vec<Id>,
}

impl Op for ConcatGrad {
    fn name(&self) -> &str {
        "concat_grad"
    }

    fn eval(&self, ctx: &mut Context) -> Result<()> {
        let axis = self.axis.resolve(ctx, "concat_grad")?;
        let og = ctx.tensor(&self.out_grad, "concat_grad")?;
        let a = normalize_axis(axis, og.rank(), "concat_grad")?;
        let sections = self
            .xs
            .iter()
            .map(|id| {
                let x = ctx.tensor(id, "concat_grad")?;
                x.dims().get(a).copied().ok_or(Error::InvalidAxis {
                    op: "concat_grad",
                    axis,
                    rank: x.rank(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let pieces = kernels::split(ctx.device(), og, &sections, axis)?;
        for (&id, piece) in self.outs.iter().zip(pieces) {
            ctx.insert(id, piece);
        }
        Ok(())
    }

    fn inputs(&self) -> Vec<Id> {
        self.xs
            .iter()
            .copied()
            .chain([self.out_grad])
            .chain(self.axis.id())
            .collect()
    }

    fn outputs(&self) -> Vec<Id> {
        self.outs.clone()
    }
}

fn concat_type(types: &[TensorType], axis: i64) -> Result<TensorType> {
    let dtype = types[0].dtype;
    if let Some(t) = types.iter().find(|t| t.dtype != dtype) {
        return Err(Error::DtypeMismatch {
            op: "concat",
            expected: dtype,
            actual: t.dtype,
        });
    }

    let Some(all_dims) = types.iter().map(|t| t.dims.as_ref()).collect::<Option<Vec<_>>>() else {
        if let Some(rank) = types.iter().find_map(TensorType::rank) {
            normalize_axis(axis, rank, "concat")?;
        }
        return Ok(TensorType::unranked(dtype));
    };

    let a = normalize_axis(axis, all_dims[0].len(), "concat")?;
    let mut merged = None;
    let mut extent = Some(0);
    for dims in all_dims {
        let mut masked = dims.clone();
        if let Some(d) = masked.get_mut(a) {
            *d = DYNAMIC;
        }
        merged = unify_dims("concat", &merged, &Some(masked))?;
        extent = match (extent, dims[a]) {
            (Some(total), d) if d != DYNAMIC => Some(total + d),
            _ => None,
        };
    }
    let mut dims = merged.unwrap_or_default();
    dims[a] = extent.unwrap_or(DYNAMIC);
    Ok(TensorType::new(dims, dtype))
}

/// With the axis unknown until run time only the rank survives.
fn dynamic_concat_type(types: &[TensorType]) -> Result<TensorType> {
    let dtype = types[0].dtype;
    let mut rank = types[0].rank();
    for t in types {
        if t.dtype != dtype {
            return Err(Error::DtypeMismatch {
                op: "concat",
                expected: dtype,
                actual: t.dtype,
            });
        }
        if t.rank() != rank {
            rank = None;
        }
    }
    Ok(match rank {
        Some(rank) => TensorType::new(vec![DYNAMIC; rank], dtype),
        None => TensorType::unranked(dtype),
    })
}

impl Builder<'_> {
    pub fn concat(&mut self, xs: &[Value], axis: i64) -> Result<Value> {
        self.concat_with(xs, AxisArg::Static(axis))
    }

    pub(crate) fn concat_with(&mut self, xs: &[Value], axis: AxisArg) -> Result<Value> {
        let types = self.tensor_types(xs, "concat")?;
        let ty = match axis {
            AxisArg::Static(axis) => concat_type(&types, axis)?,
            AxisArg::Dynamic(id) => {
                self.index_type(Value::new(id), "concat")?;
                dynamic_concat_type(&types)?
            }
        };
        let out = self.fresh(ty);
        self.emit(Concat {
            xs: xs.iter().map(Value::id).collect(),
            axis,
            out,
        });
        Ok(Value::new(out))
    }

    /// One gradient per input of `concat(xs, axis)`.
    pub fn concat_grad(&mut self, xs: &[Value], out_grad: Value, axis: i64) -> Result<Vec<Value>> {
        self.concat_grad_with(xs, out_grad, AxisArg::Static(axis))
    }

    fn concat_grad_with(&mut self, xs: &[Value], out_grad: Value, axis: AxisArg) -> Result<Vec<Value>> {
        let types = self.tensor_types(xs, "concat_grad")?;
        let og = self.tensor_type(out_grad, "concat_grad")?;
        if let (AxisArg::Static(axis), Some(rank)) = (axis, og.rank()) {
            normalize_axis(axis, rank, "concat_grad")?;
        }
        let outs: Vec<Id> = types
            .into_iter()
            .map(|t| {
                self.fresh(TensorType {
                    dims: t.dims,
                    dtype: og.dtype,
                })
            })
            .collect();
        self.emit(ConcatGrad {
            xs: xs.iter().map(Value::id).collect(),
            out_grad: out_grad.id(),
            axis,
            outs: outs.clone(),
        });
        Ok(outs.into_iter().map(Value::new).collect())
    }
}
