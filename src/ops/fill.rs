use crate::{
    builder::{Builder, Value},
    context::Context,
    error::{Error, Result},
    identity::Id,
    kernels,
    ops::Op,
    types::{DataType, Place, TensorType},
};

#[derive(Debug, Clone)]
pub struct Full {
    pub dims: Vec<usize>,
    pub value: f64,
    pub dtype: DataType,
    pub place: Place,
    pub out: Id,
}

impl Op for Full {
    fn name(&self) -> &str {
        "full"
    }

    fn eval(&self, ctx: &mut Context) -> Result<()> {
        let out = kernels::full(
            ctx.device(),
            &self.dims,
            self.value,
            self.dtype,
            Some(self.place.clone()),
        )?;
        ctx.insert(self.out, out);
        Ok(())
    }

    fn inputs(&self) -> Vec<Id> {
        vec![]
    }

    fn outputs(&self) -> Vec<Id> {
        vec![self.out]
    }
}

/// `full` with the shape of `x`. Only the shape of `x` is read, so no
/// gradient flows back to it.
#[derive(Debug, Clone)]
pub struct FullLike {
    pub x: Id,
    pub value: f64,
    pub dtype: Option<DataType>,
    pub place: Option<Place>,
    pub out: Id,
}

impl Op for FullLike {
    fn name(&self) -> &str {
        "full_like"
    }

    fn eval(&self, ctx: &mut Context) -> Result<()> {
        let x = ctx.tensor(&self.x, "full_like")?;
        let out = kernels::full_like(ctx.device(), x, self.value, self.dtype, self.place.clone())?;
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

impl Builder<'_> {
    pub fn full(&mut self, shape: &[i64], value: f64, dtype: DataType, place: Place) -> Result<Value> {
        let dims = shape
            .iter()
            .map(|&d| usize::try_from(d))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| Error::Invalid(format!("full: shape {shape:?} must be static")))?;
        let out = self.fresh(TensorType::new(shape, dtype));
        self.emit(Full {
            dims,
            value,
            dtype,
            place,
            out,
        });
        Ok(Value::new(out))
    }

    pub fn zeros(&mut self, shape: &[i64], dtype: DataType, place: Place) -> Result<Value> {
        self.full(shape, 0.0, dtype, place)
    }

    pub fn ones(&mut self, shape: &[i64], dtype: DataType, place: Place) -> Result<Value> {
        self.full(shape, 1.0, dtype, place)
    }

    /// Shaped like `x`; dtype and place follow `x` when not given.
    pub fn full_like(
        &mut self,
        x: Value,
        value: f64,
        dtype: Option<DataType>,
        place: Option<Place>,
    ) -> Result<Value> {
        let x_ty = self.tensor_type(x, "full_like")?;
        let out = self.fresh(TensorType {
            dims: x_ty.dims,
            dtype: dtype.unwrap_or(x_ty.dtype),
        });
        self.emit(FullLike {
            x: x.id(),
            value,
            dtype,
            place,
            out,
        });
        Ok(Value::new(out))
    }

    pub fn zeros_like(
        &mut self,
        x: Value,
        dtype: Option<DataType>,
        place: Option<Place>,
    ) -> Result<Value> {
        self.full_like(x, 0.0, dtype, place)
    }

    pub fn ones_like(
        &mut self,
        x: Value,
        dtype: Option<DataType>,
        place: Option<Place>,
    ) -> Result<Value> {
        self.full_like(x, 1.0, dtype, place)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{builder::Program, tensor::DenseTensor};

    #[test]
    fn creation_ops_default_to_float32_on_cpu() {
        let program = Program::build(|b| {
            let z = b.zeros(&[2, 2], DataType::default(), Place::default())?;
            let o = b.ones(&[3], DataType::Int8, Place::Gpu(1))?;
            Ok(vec![z, o])
        })
        .unwrap();

        let out = program.run(&mut Context::new(), vec![]).unwrap();
        let z = out[0].as_tensor("test").unwrap();
        assert_eq!(z.dtype(), DataType::Float32);
        assert_eq!(z.place(), &Place::Cpu);
        assert_eq!(z.to_vec::<f32>().unwrap(), vec![0.; 4]);
        let o = out[1].as_tensor("test").unwrap();
        assert_eq!(o.place(), &Place::Gpu(1));
        assert_eq!(o.to_vec::<i8>().unwrap(), vec![1; 3]);
    }

    #[test]
    fn like_ops_inherit_from_input() {
        let program = Program::build(|b| {
            let x = b.data("x", &[2, -1], DataType::Int32);
            let same = b.ones_like(x, None, None)?;
            let cast = b.full_like(x, 2.5, Some(DataType::Float64), None)?;
            Ok(vec![same, cast])
        })
        .unwrap();

        let x = DenseTensor::from_vec(vec![5i32; 6], &[2, 3])
            .unwrap()
            .with_place(Place::Gpu(0));
        let out = program.run(&mut Context::new(), vec![x.into()]).unwrap();
        let same = out[0].as_tensor("test").unwrap();
        assert_eq!(same.to_vec::<i32>().unwrap(), vec![1; 6]);
        assert_eq!(same.place(), &Place::Gpu(0));
        let cast = out[1].as_tensor("test").unwrap();
        assert_eq!(cast.dims(), &[2, 3]);
        assert_eq!(cast.to_vec::<f64>().unwrap(), vec![2.5; 6]);
    }

    #[test]
    fn full_needs_a_static_shape() {
        let err = Program::build(|b| Ok(vec![b.full(&[-1], 0.0, DataType::Float32, Place::Cpu)?]));
        assert!(matches!(err, Err(Error::Invalid(_))));
    }
}
