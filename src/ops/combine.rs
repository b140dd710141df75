use crate::{
    builder::{Builder, Value},
    context::Context,
    error::{Error, Result},
    identity::Id,
    ops::Op,
    tensor::RuntimeValue,
    types::ValueType,
};

/// Packs several values into one vector value.
#[derive(Debug, Clone)]
pub struct BuiltinCombine {
    pub xs: Vec<Id>,
    pub out: Id,
}

impl Op for BuiltinCombine {
    fn name(&self) -> &str {
        "builtin.combine"
    }

    fn eval(&self, ctx: &mut Context) -> Result<()> {
        let items = self
            .xs
            .iter()
            .map(|id| ctx.checked_get(id).cloned())
            .collect::<Result<Vec<_>>>()?;
        ctx.insert(self.out, RuntimeValue::Vector(items));
        Ok(())
    }

    fn vjp(&self, b: &mut Builder<'_>, out_grads: &[Option<Value>]) -> Result<Vec<Option<Value>>> {
        match out_grads.first().copied().flatten() {
            Some(og) => Ok(b.builtin_split(og)?.into_iter().map(Some).collect()),
            None => Ok(vec![None; self.xs.len()]),
        }
    }

    fn inputs(&self) -> Vec<Id> {
        self.xs.clone()
    }

    fn outputs(&self) -> Vec<Id> {
        vec![self.out]
    }
}

/// Unpacks a vector value into its elements.
#[derive(Debug, Clone)]
pub struct BuiltinSplit {
    pub x: Id,
    pub outs: Vec<Id>,
}

impl Op for BuiltinSplit {
    fn name(&self) -> &str {
        "builtin.split"
    }

    fn eval(&self, ctx: &mut Context) -> Result<()> {
        let items = ctx.checked_get(&self.x)?.as_vector("builtin.split")?.to_vec();
        if items.len() != self.outs.len() {
            return Err(Error::ShapeMismatch {
                op: "builtin.split",
                lhs: vec![self.outs.len() as i64],
                rhs: vec![items.len() as i64],
            });
        }
        for (&id, item) in self.outs.iter().zip(items) {
            ctx.insert(id, item);
        }
        Ok(())
    }

    /// Elements without a gradient contribute zeros, so the pieces can be
    /// packed again. Non-tensor elements must all have one.
    fn vjp(&self, b: &mut Builder<'_>, out_grads: &[Option<Value>]) -> Result<Vec<Option<Value>>> {
        if out_grads.iter().all(Option::is_none) {
            return Ok(vec![None]);
        }
        let mut pieces = Vec::with_capacity(self.outs.len());
        for (&out, og) in self.outs.iter().zip(out_grads) {
            let piece = match og {
                Some(og) => *og,
                None => b.zeros_like(Value::new(out), None, None)?,
            };
            pieces.push(piece);
        }
        Ok(vec![Some(b.builtin_combine(&pieces)?)])
    }

    fn inputs(&self) -> Vec<Id> {
        vec![self.x]
    }

    fn outputs(&self) -> Vec<Id> {
        self.outs.clone()
    }
}

impl Builder<'_> {
    pub fn builtin_combine(&mut self, xs: &[Value]) -> Result<Value> {
        let types = xs
            .iter()
            .map(|&x| self.type_of(x).cloned())
            .collect::<Result<Vec<_>>>()?;
        let out = self.fresh(ValueType::Vector(types));
        self.emit(BuiltinCombine {
            xs: xs.iter().map(Value::id).collect(),
            out,
        });
        Ok(Value::new(out))
    }

    pub fn builtin_split(&mut self, x: Value) -> Result<Vec<Value>> {
        let types = match self.type_of(x)? {
            ValueType::Vector(types) => types.clone(),
            other => {
                return Err(Error::TypeMismatch {
                    op: "builtin.split",
                    expected: "vector".to_string(),
                    actual: other.to_string(),
                });
            }
        };
        let outs: Vec<Id> = types.into_iter().map(|ty| self.fresh(ty)).collect();
        self.emit(BuiltinSplit {
            x: x.id(),
            outs: outs.clone(),
        });
        Ok(outs.into_iter().map(Value::new).collect())
    }
}
