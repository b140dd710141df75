use crate::{
    builder::{Builder, Value},
    context::Context,
    error::{Error, Result},
    identity::Id,
    kernels::{self, DataLayout},
    ops::{Op, run_kernel},
    tensor::{RuntimeValue, TensorArray},
    types::ValueType,
};

/// A copy with its own storage, of a tensor or of every slot of an array.
#[derive(Debug, Clone)]
pub struct Assign {
    pub x: Id,
    pub out: Id,
}

impl Op for Assign {
    fn name(&self) -> &str {
        "assign"
    }

    fn eval(&self, ctx: &mut Context) -> Result<()> {
        let out = match ctx.checked_get(&self.x)? {
            RuntimeValue::Array(a) => {
                let slots = a
                    .slots()
                    .map(|slot| slot.map(|t| kernels::assign(ctx.device(), t)).transpose())
                    .collect::<Result<Vec<_>>>()?;
                RuntimeValue::Array(TensorArray::from_slots(a.dtype(), slots))
            }
            _ => run_kernel(ctx, "assign", DataLayout::AllLayout, &[self.x], vec![])?.into(),
        };
        ctx.insert(self.out, out);
        Ok(())
    }

    fn vjp(&self, b: &mut Builder<'_>, out_grads: &[Option<Value>]) -> Result<Vec<Option<Value>>> {
        match out_grads.first().copied().flatten() {
            Some(og) => Ok(vec![Some(b.assign(og)?)]),
            None => Ok(vec![None]),
        }
    }

    fn inputs(&self) -> Vec<Id> {
        vec![self.x]
    }

    fn outputs(&self) -> Vec<Id> {
        vec![self.out]
    }
}

impl Builder<'_> {
    pub fn assign(&mut self, x: Value) -> Result<Value> {
        let ty = match self.type_of(x)? {
            ty @ (ValueType::Tensor(_) | ValueType::Array(_)) => ty.clone(),
            other => {
                return Err(Error::TypeMismatch {
                    op: "assign",
                    expected: "tensor or array".to_string(),
                    actual: other.to_string(),
                });
            }
        };
        let out = self.fresh(ty);
        self.emit(Assign { x: x.id(), out });
        Ok(Value::new(out))
    }
}
