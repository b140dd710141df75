use crate::{
    error::{Error, Result},
    tensor::{DenseTensor, TensorArray},
    types::ValueType,
};

/// What a graph value holds once computed.
#[derive(Debug, Clone)]
pub enum RuntimeValue {
    Tensor(DenseTensor),
    Array(TensorArray),
    Vector(Vec<RuntimeValue>),
}

impl RuntimeValue {
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeValue::Tensor(_) => "tensor",
            RuntimeValue::Array(_) => "array",
            RuntimeValue::Vector(_) => "vector",
        }
    }

    pub fn as_tensor(&self, op: &'static str) -> Result<&DenseTensor> {
        match self {
            RuntimeValue::Tensor(t) => Ok(t),
            other => Err(mismatch(op, "tensor", other)),
        }
    }

    pub fn as_array(&self, op: &'static str) -> Result<&TensorArray> {
        match self {
            RuntimeValue::Array(a) => Ok(a),
            other => Err(mismatch(op, "array", other)),
        }
    }

    pub fn as_vector(&self, op: &'static str) -> Result<&[RuntimeValue]> {
        match self {
            RuntimeValue::Vector(v) => Ok(v),
            other => Err(mismatch(op, "vector", other)),
        }
    }

    pub fn into_tensor(self) -> Result<DenseTensor> {
        match self {
            RuntimeValue::Tensor(t) => Ok(t),
            other => Err(mismatch("into_tensor", "tensor", &other)),
        }
    }

    pub fn into_array(self) -> Result<TensorArray> {
        match self {
            RuntimeValue::Array(a) => Ok(a),
            other => Err(mismatch("into_array", "array", &other)),
        }
    }

    /// Whether this value is an instance of `ty`.
    pub fn conforms_to(&self, ty: &ValueType) -> bool {
        match (self, ty) {
            (RuntimeValue::Tensor(t), ValueType::Tensor(tt)) => {
                t.dtype() == tt.dtype && tt.admits(t.dims())
            }
            (RuntimeValue::Array(a), ValueType::Array(at)) => {
                a.dtype() == at.dtype
                    && a
                        .slots()
                        .flatten()
                        .all(|t| at.element().admits(t.dims()))
            }
            (RuntimeValue::Vector(vs), ValueType::Vector(ts)) => {
                vs.len() == ts.len() && vs.iter().zip(ts).all(|(v, t)| v.conforms_to(t))
            }
            _ => false,
        }
    }
}

impl From<DenseTensor> for RuntimeValue {
    fn from(t: DenseTensor) -> Self {
        RuntimeValue::Tensor(t)
    }
}

impl From<TensorArray> for RuntimeValue {
    fn from(a: TensorArray) -> Self {
        RuntimeValue::Array(a)
    }
}

fn mismatch(op: &'static str, expected: &str, actual: &RuntimeValue) -> Error {
    Error::TypeMismatch {
        op,
        expected: expected.to_string(),
        actual: actual.kind().to_string(),
    }
}
