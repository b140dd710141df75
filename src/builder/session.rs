use crate::{
    builder::Value,
    error::{Error, Result},
    graph::Graph,
    identity::Id,
    ops::Op,
    types::{ArrayType, TensorType, ValueType},
};

/// Appends nodes to a graph. Each builder method checks its operands, infers
/// the result type and returns handles to the new outputs; nothing runs.
pub struct Builder<'a> {
    g: &'a mut Graph,
}

impl<'a> Builder<'a> {
    pub fn new(g: &'a mut Graph) -> Builder<'a> {
        Builder { g }
    }

    pub fn graph(&self) -> &Graph {
        self.g
    }

    pub(crate) fn graph_mut(&mut self) -> &mut Graph {
        self.g
    }

    pub(crate) fn emit<T: Op + 'static>(&mut self, op: T) {
        self.g.push(Box::new(op));
    }

    pub(crate) fn fresh(&mut self, ty: impl Into<ValueType>) -> Id {
        self.g.fresh(ty.into())
    }

    pub fn type_of(&self, v: Value) -> Result<&ValueType> {
        self.g.value_type(v.id())
    }

    pub(crate) fn tensor_type(&self, v: Value, op: &'static str) -> Result<TensorType> {
        match self.type_of(v)? {
            ValueType::Tensor(t) => Ok(t.clone()),
            other => Err(kind_mismatch(op, "tensor", other)),
        }
    }

    pub(crate) fn array_type(&self, v: Value, op: &'static str) -> Result<ArrayType> {
        match self.type_of(v)? {
            ValueType::Array(a) => Ok(a.clone()),
            other => Err(kind_mismatch(op, "array", other)),
        }
    }

    /// An integer tensor used as an index or an axis.
    pub(crate) fn index_type(&self, v: Value, op: &'static str) -> Result<TensorType> {
        let ty = self.tensor_type(v, op)?;
        if !ty.dtype.is_integer() {
            return Err(Error::TypeMismatch {
                op,
                expected: "integer tensor".to_string(),
                actual: ty.to_string(),
            });
        }
        Ok(ty)
    }

    pub(crate) fn tensor_types(&self, xs: &[Value], op: &'static str) -> Result<Vec<TensorType>> {
        if xs.is_empty() {
            return Err(Error::Invalid(format!("{op}: expects at least one input")));
        }
        xs.iter().map(|&x| self.tensor_type(x, op)).collect()
    }
}

fn kind_mismatch(op: &'static str, expected: &str, actual: &ValueType) -> Error {
    Error::TypeMismatch {
        op,
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}
