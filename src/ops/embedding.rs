use crate::{
    builder::{Builder, Value},
    context::Context,
    error::{Error, Result},
    identity::Id,
    kernels,
    ops::Op,
    types::{DYNAMIC, unify_dims},
};

#[derive(Debug, Clone)]
pub struct EmbeddingGrad {
    pub x: Id,
    pub weight: Id,
    pub out_grad: Id,
    pub padding_idx: i64,
    pub sparse: bool,
    pub out: Id,
}

impl Op for EmbeddingGrad {
    fn name(&self) -> &str {
        if self.sparse {
            "embedding_sparse_grad"
        } else {
            "embedding_grad"
        }
    }

    fn eval(&self, ctx: &mut Context) -> Result<()> {
        let x = ctx.tensor(&self.x, "embedding_grad")?;
        let weight = ctx.tensor(&self.weight, "embedding_grad")?;
        let og = ctx.tensor(&self.out_grad, "embedding_grad")?;
        let out = kernels::embedding_grad(ctx.device(), x, weight, og, self.padding_idx, self.sparse)?;
        ctx.insert(self.out, out);
        Ok(())
    }

    fn inputs(&self) -> Vec<Id> {
        vec![self.x, self.weight, self.out_grad]
    }

    fn outputs(&self) -> Vec<Id> {
        vec![self.out]
    }
}

impl Builder<'_> {
    /// Gradient of an embedding lookup of ids `x` into `weight`. A negative
    /// `padding_idx` disables padding; a sparse gradient comes out dense.
    pub fn embedding_grad(
        &mut self,
        x: Value,
        weight: Value,
        out_grad: Value,
        padding_idx: i64,
        sparse: bool,
    ) -> Result<Value> {
        let ids = self.index_type(x, "embedding_grad")?;
        let w = self.tensor_type(weight, "embedding_grad")?;
        let og = self.tensor_type(out_grad, "embedding_grad")?;
        if og.dtype != w.dtype {
            return Err(Error::DtypeMismatch {
                op: "embedding_grad",
                expected: w.dtype,
                actual: og.dtype,
            });
        }
        if let Some(dims) = &w.dims {
            let &[_, width] = dims.as_slice() else {
                return Err(Error::ShapeMismatch {
                    op: "embedding_grad",
                    lhs: dims.clone(),
                    rhs: vec![DYNAMIC, DYNAMIC],
                });
            };
            let expected = ids.dims.map(|mut d| {
                d.push(width);
                d
            });
            unify_dims("embedding_grad", &expected, &og.dims)?;
        }

        let out = self.fresh(w);
        self.emit(EmbeddingGrad {
            x: x.id(),
            weight: weight.id(),
            out_grad: out_grad.id(),
            padding_idx,
            sparse,
            out,
        });
        Ok(Value::new(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{builder::Program, tensor::DenseTensor, types::DataType};

    #[test]
    fn builds_and_runs() {
        let program = Program::build(|b| {
            let ids = b.data("ids", &[3], DataType::Int64);
            let w = b.data("w", &[4, 2], DataType::Float32);
            let og = b.data("og", &[3, 2], DataType::Float32);
            let dense = b.embedding_grad(ids, w, og, -1, false)?;
            let sparse = b.embedding_grad(ids, w, og, 2, true)?;
            assert_eq!(b.type_of(dense)?.to_string(), "tensor<4x2xfloat32>");
            Ok(vec![dense, sparse])
        })
        .unwrap();
        assert_eq!(program.graph.nodes.last().unwrap().name(), "embedding_sparse_grad");

        let ids = DenseTensor::from_vec(vec![2i64, 2, 1], &[3]).unwrap();
        let w = DenseTensor::from_vec(vec![0f32; 8], &[4, 2]).unwrap();
        let og = DenseTensor::from_vec(vec![1f32, 1., 1., 1., 5., 5.], &[3, 2]).unwrap();
        let out = program
            .run(&mut Context::new(), vec![ids.into(), w.into(), og.into()])
            .unwrap();
        assert_eq!(
            out[0].as_tensor("test").unwrap().to_vec::<f32>().unwrap(),
            vec![0., 0., 5., 5., 2., 2., 0., 0.]
        );
        assert_eq!(
            out[1].as_tensor("test").unwrap().to_vec::<f32>().unwrap(),
            vec![0., 0., 5., 5., 0., 0., 0., 0.]
        );
    }

    #[test]
    fn checks_operand_types() {
        let err = Program::build(|b| {
            let ids = b.data("ids", &[3], DataType::Float32);
            let w = b.data("w", &[4, 2], DataType::Float32);
            let og = b.data("og", &[3, 2], DataType::Float32);
            Ok(vec![b.embedding_grad(ids, w, og, -1, false)?])
        });
        assert!(matches!(err, Err(Error::TypeMismatch { .. })));

        let err = Program::build(|b| {
            let ids = b.data("ids", &[3], DataType::Int32);
            let w = b.data("w", &[4, 2], DataType::Float32);
            let og = b.data("og", &[3, 5], DataType::Float32);
            Ok(vec![b.embedding_grad(ids, w, og, -1, false)?])
        });
        assert!(matches!(err, Err(Error::ShapeMismatch { .. })));
    }
}
