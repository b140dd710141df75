use crate::{
    builder::{Builder, Value},
    context::Context,
    error::Result,
    identity::Id,
    ops::Op,
    types::{DataType, TensorType},
};

/// A program input. Its value is fed by position before the run starts.
#[derive(Debug, Clone)]
pub struct Data {
    pub name: String,
    pub out: Id,
}

impl Op for Data {
    fn name(&self) -> &str {
        "data"
    }

    fn eval(&self, ctx: &mut Context) -> Result<()> {
        ctx.checked_get(&self.out).map(|_| ())
    }

    fn inputs(&self) -> Vec<Id> {
        vec![]
    }

    fn outputs(&self) -> Vec<Id> {
        vec![self.out]
    }
}

/// Reads a named parameter from the context.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub out: Id,
}

impl Op for Parameter {
    fn name(&self) -> &str {
        "parameter"
    }

    fn eval(&self, ctx: &mut Context) -> Result<()> {
        let value = ctx.parameter(&self.name)?.clone();
        ctx.insert(self.out, value);
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
pub struct SetParameter {
    pub x: Id,
    pub name: String,
}

impl Op for SetParameter {
    fn name(&self) -> &str {
        "set_parameter"
    }

    fn eval(&self, ctx: &mut Context) -> Result<()> {
        let value = ctx.tensor(&self.x, "set_parameter")?.clone();
        ctx.set_parameter(self.name.clone(), value);
        Ok(())
    }

    fn inputs(&self) -> Vec<Id> {
        vec![self.x]
    }

    fn outputs(&self) -> Vec<Id> {
        vec![]
    }
}

impl Builder<'_> {
    /// A program input of the given type; `-1` marks a run-time extent.
    #[must_use]
    pub fn data(&mut self, name: &str, dims: &[i64], dtype: DataType) -> Value {
        let out = self.fresh(TensorType::new(dims, dtype));
        self.graph_mut().add_input(out);
        self.emit(Data {
            name: name.to_string(),
            out,
        });
        Value::new(out)
    }

    pub fn parameter(&mut self, name: &str) -> Result<Value> {
        let ty = self.graph().parameter_type(name)?.clone();
        let out = self.fresh(ty);
        self.emit(Parameter {
            name: name.to_string(),
            out,
        });
        Ok(Value::new(out))
    }

    /// Stores `x` under `name`, declaring the parameter for later reads.
    pub fn set_parameter(&mut self, x: Value, name: &str) -> Result<()> {
        let ty = self.tensor_type(x, "set_parameter")?;
        self.graph_mut().declare_parameter(name, ty)?;
        self.emit(SetParameter {
            x: x.id(),
            name: name.to_string(),
        });
        Ok(())
    }
}
