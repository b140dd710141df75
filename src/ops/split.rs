use crate::{
    builder::{Builder, Value},
    context::Context,
    error::{Error, Result},
    identity::Id,
    kernels,
    ops::{AxisArg, Op},
    types::{DYNAMIC, TensorType, normalize_axis},
};

/// Splits `x` into `num` equal pieces along `axis`.
#[derive(Debug, Clone)]
pub struct SplitWithNum {
    pub x: Id,
    pub num: usize,
    pub axis: i64,
    pub outs: Vec<Id>,
}

impl Op for SplitWithNum {
    fn name(&self) -> &str {
        "split_with_num"
    }

    fn eval(&self, ctx: &mut Context) -> Result<()> {
        let x = ctx.tensor(&self.x, "split_with_num")?;
        let a = normalize_axis(self.axis, x.rank(), "split_with_num")?;
        let extent = x.dims()[a];
        if extent % self.num != 0 {
            return Err(Error::ShapeMismatch {
                op: "split_with_num",
                lhs: x.dims_i64(),
                rhs: vec![self.num as i64],
            });
        }
        let sections = vec![extent / self.num; self.num];
        let pieces = kernels::split(ctx.device(), x, &sections, self.axis)?;
        for (&id, piece) in self.outs.iter().zip(pieces) {
            ctx.insert(id, piece);
        }
        Ok(())
    }

    /// Pieces without a gradient contribute zeros to the concatenation.
    fn vjp(&self, b: &mut Builder<'_>, out_grads: &[Option<Value>]) -> Result<Vec<Option<Value>>> {
        if out_grads.iter().all(Option::is_none) {
            return Ok(vec![None]);
        }
        let mut grads = Vec::with_capacity(self.outs.len());
        for (&out, og) in self.outs.iter().zip(out_grads) {
            grads.push(match og {
                Some(og) => *og,
                None => b.zeros_like(Value::new(out), None, None)?,
            });
        }
        Ok(vec![Some(b.split_with_num_grad(&grads, self.axis)?)])
    }

    fn inputs(&self) -> Vec<Id> {
        vec![self.x]
    }

    fn outputs(&self) -> Vec<Id> {
        self.outs.clone()
    }
}

impl Builder<'_> {
    pub fn split_with_num(&mut self, x: Value, num: usize, axis: i64) -> Result<Vec<Value>> {
        let ty = self.tensor_type(x, "split_with_num")?;
        if num == 0 {
            return Err(Error::Invalid("split_with_num: num must be positive".to_string()));
        }
        let piece = match &ty.dims {
            None => TensorType::unranked(ty.dtype),
            Some(dims) => {
                let a = normalize_axis(axis, dims.len(), "split_with_num")?;
                let mut piece = dims.clone();
                piece[a] = match dims[a] {
                    DYNAMIC => DYNAMIC,
                    d if d % num as i64 == 0 => d / num as i64,
                    _ => {
                        return Err(Error::ShapeMismatch {
                            op: "split_with_num",
                            lhs: dims.clone(),
                            rhs: vec![num as i64],
                        });
                    }
                };
                TensorType::new(piece, ty.dtype)
            }
        };
        let outs: Vec<Id> = (0..num).map(|_| self.fresh(piece.clone())).collect();
        self.emit(SplitWithNum {
            x: x.id(),
            num,
            axis,
            outs: outs.clone(),
        });
        Ok(outs.into_iter().map(Value::new).collect())
    }

    /// Gradient of `split_with_num`: the piece gradients concatenated back
    /// along `axis`.
    pub fn split_with_num_grad(&mut self, out_grads: &[Value], axis: i64) -> Result<Value> {
        self.concat_with(out_grads, AxisArg::Static(axis))
    }

    /// As `split_with_num_grad`, with the axis held in an integer tensor.
    pub fn split_with_num_grad_dyn(&mut self, out_grads: &[Value], axis: Value) -> Result<Value> {
        self.concat_with(out_grads, AxisArg::Dynamic(axis.id()))
    }
}
