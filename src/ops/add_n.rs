use crate::{
    builder::{Builder, Value},
    context::Context,
    error::{Error, Result},
    identity::Id,
    kernels,
    ops::Op,
    types::{TensorType, unify_dims},
};

/// Element-wise sum of same-typed tensors.
#[derive(Debug, Clone)]
pub struct AddN {
    pub xs: Vec<Id>,
    pub out: Id,
}

impl Op for AddN {
    fn name(&self) -> &str {
        "add_n"
    }

    fn eval(&self, ctx: &mut Context) -> Result<()> {
        let xs = self
            .xs
            .iter()
            .map(|id| ctx.tensor(id, "add_n"))
            .collect::<Result<Vec<_>>>()?;
        let out = kernels::add_n(ctx.device(), &xs)?;
        ctx.insert(self.out, out);
        Ok(())
    }

    fn vjp(&self, b: &mut Builder<'_>, out_grads: &[Option<Value>]) -> Result<Vec<Option<Value>>> {
        let Some(og) = out_grads.first().copied().flatten() else {
            return Ok(vec![None; self.xs.len()]);
        };
        let inputs: Vec<Value> = self.xs.iter().copied().map(Value::new).collect();
        Ok(b.add_n_grad(&inputs, og)?.into_iter().map(Some).collect())
    }

    fn inputs(&self) -> Vec<Id> {
        self.xs.clone()
    }

    fn outputs(&self) -> Vec<Id> {
        vec![self.out]
    }
}

impl Builder<'_> {
    pub fn add_n(&mut self, xs: &[Value]) -> Result<Value> {
        let types = self.tensor_types(xs, "add_n")?;
        let mut ty = types[0].clone();
        for t in &types[1..] {
            if t.dtype != ty.dtype {
                return Err(Error::DtypeMismatch {
                    op: "add_n",
                    expected: ty.dtype,
                    actual: t.dtype,
                });
            }
            ty = TensorType {
                dims: unify_dims("add_n", &ty.dims, &t.dims)?,
                dtype: ty.dtype,
            };
        }
        let out = self.fresh(ty);
        self.emit(AddN {
            xs: xs.iter().map(Value::id).collect(),
            out,
        });
        Ok(Value::new(out))
    }

    /// Every summand receives `out_grad` unchanged: one identity `scale`
    /// per input.
    pub fn add_n_grad(&mut self, inputs: &[Value], out_grad: Value) -> Result<Vec<Value>> {
        self.tensor_types(inputs, "add_n_grad")?;
        self.tensor_type(out_grad, "add_n_grad")?;
        inputs
            .iter()
            .map(|_| self.scale(out_grad, 1.0, 0.0, true))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{builder::Program, tensor::DenseTensor, types::DataType};

    #[test]
    fn sums_and_refines_dims() {
        let program = Program::build(|b| {
            let x = b.data("x", &[2, -1], DataType::Float32);
            let y = b.data("y", &[-1, 3], DataType::Float32);
            let s = b.add_n(&[x, y, x])?;
            assert_eq!(b.type_of(s)?.to_string(), "tensor<2x3xfloat32>");
            Ok(vec![s])
        })
        .unwrap();

        let x = DenseTensor::from_vec(vec![1f32; 6], &[2, 3]).unwrap();
        let y = DenseTensor::from_vec((0..6).map(|v| v as f32).collect(), &[2, 3]).unwrap();
        let out = program
            .run(&mut Context::new(), vec![x.into(), y.into()])
            .unwrap();
        assert_eq!(
            out[0].as_tensor("test").unwrap().to_vec::<f32>().unwrap(),
            vec![2., 3., 4., 5., 6., 7.]
        );
    }

    #[test]
    fn rejects_mixed_inputs() {
        let err = Program::build(|b| {
            let x = b.data("x", &[2], DataType::Float32);
            let y = b.data("y", &[2], DataType::Int32);
            Ok(vec![b.add_n(&[x, y])?])
        });
        assert!(matches!(err, Err(Error::DtypeMismatch { .. })));

        let err = Program::build(|b| Ok(vec![b.add_n(&[])?]));
        assert!(matches!(err, Err(Error::Invalid(_))));
    }

    #[test]
    fn grad_emits_one_scale_per_input() {
        Program::build(|b| {
            let x = b.data("x", &[2], DataType::Float32);
            let y = b.data("y", &[2], DataType::Float32);
            let og = b.data("og", &[2], DataType::Float32);
            let before = b.graph().len();
            let grads = b.add_n_grad(&[x, y], og)?;
            assert_eq!(grads.len(), 2);
            assert_ne!(grads[0], grads[1]);
            assert_eq!(b.graph().len(), before + 2);
            assert!(b.graph().nodes[before..].iter().all(|n| n.name() == "scale"));
            Ok(grads)
        })
        .unwrap();
    }
}
