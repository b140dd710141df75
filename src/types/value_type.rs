use std::fmt;

use itertools::Itertools;

use crate::{
    error::{Error, Result},
    types::DataType,
};

/// Marker for an extent that is only known at run time.
pub const DYNAMIC: i64 = -1;

/// Static type of a dense tensor value. `dims == None` means the rank itself
/// is unknown.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TensorType {
    pub dims: Option<Vec<i64>>,
    pub dtype: DataType,
}

impl TensorType {
    pub fn new(dims: impl Into<Vec<i64>>, dtype: DataType) -> Self {
        Self {
            dims: Some(dims.into()),
            dtype,
        }
    }

    pub fn unranked(dtype: DataType) -> Self {
        Self { dims: None, dtype }
    }

    pub fn rank(&self) -> Option<usize> {
        self.dims.as_ref().map(Vec::len)
    }

    /// Element count when every extent is static and the count fits in `i64`.
    pub fn numel(&self) -> Option<i64> {
        let dims = self.dims.as_ref()?;
        if dims.iter().any(|&d| d < 0) {
            return None;
        }
        dims.iter().try_fold(1i64, |acc, &d| acc.checked_mul(d))
    }

    /// Whether a runtime shape fits this type.
    pub fn admits(&self, dims: &[usize]) -> bool {
        match &self.dims {
            None => true,
            Some(expected) => {
                expected.len() == dims.len()
                    && expected
                        .iter()
                        .zip(dims)
                        .all(|(&e, &d)| e == DYNAMIC || e == d as i64)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArrayType {
    pub dtype: DataType,
    pub element_dims: Option<Vec<i64>>,
}

impl ArrayType {
    pub fn element(&self) -> TensorType {
        TensorType {
            dims: self.element_dims.clone(),
            dtype: self.dtype,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    Tensor(TensorType),
    Array(ArrayType),
    Vector(Vec<ValueType>),
}

impl ValueType {
    pub fn kind(&self) -> &'static str {
        match self {
            ValueType::Tensor(_) => "tensor",
            ValueType::Array(_) => "array",
            ValueType::Vector(_) => "vector",
        }
    }
}

/// The most specific dims both sides agree on. Static extents that differ
/// fail.
pub fn unify_dims(
    op: &'static str,
    a: &Option<Vec<i64>>,
    b: &Option<Vec<i64>>,
) -> Result<Option<Vec<i64>>> {
    let (lhs, rhs) = match (a, b) {
        (None, other) | (other, None) => return Ok(other.clone()),
        (Some(lhs), Some(rhs)) => (lhs, rhs),
    };
    let mismatch = || Error::ShapeMismatch {
        op,
        lhs: lhs.clone(),
        rhs: rhs.clone(),
    };
    if lhs.len() != rhs.len() {
        return Err(mismatch());
    }
    lhs.iter()
        .zip(rhs)
        .map(|(&x, &y)| match (x, y) {
            (DYNAMIC, d) | (d, DYNAMIC) => Ok(d),
            (x, y) if x == y => Ok(x),
            _ => Err(mismatch()),
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

/// Dims that cover both sides: extents that differ become dynamic and a
/// rank mismatch loses the rank.
pub fn join_dims(a: &Option<Vec<i64>>, b: &Option<Vec<i64>>) -> Option<Vec<i64>> {
    match (a, b) {
        (Some(a), Some(b)) if a.len() == b.len() => Some(
            a.iter()
                .zip(b)
                .map(|(&x, &y)| if x == y { x } else { DYNAMIC })
                .collect(),
        ),
        _ => None,
    }
}

impl From<TensorType> for ValueType {
    fn from(t: TensorType) -> Self {
        ValueType::Tensor(t)
    }
}

impl From<ArrayType> for ValueType {
    fn from(a: ArrayType) -> Self {
        ValueType::Array(a)
    }
}

fn fmt_dims(dims: &Option<Vec<i64>>) -> String {
    match dims {
        None => "*".to_string(),
        Some(dims) => dims
            .iter()
            .map(|&d| if d == DYNAMIC { "?".to_string() } else { d.to_string() })
            .join("x"),
    }
}

impl fmt::Display for TensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tensor<{}x{}>", fmt_dims(&self.dims), self.dtype)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Tensor(t) => write!(f, "{t}"),
            ValueType::Array(a) => {
                write!(f, "array<{}x{}>", fmt_dims(&a.element_dims), a.dtype)
            }
            ValueType::Vector(items) => write!(f, "vec[{}]", items.iter().join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_marks_dynamic_extents() {
        let t = TensorType::new([2, DYNAMIC], DataType::Float32);
        assert_eq!(t.to_string(), "tensor<2x?xfloat32>");
        let v = ValueType::Vector(vec![
            ValueType::Tensor(t),
            ValueType::Tensor(TensorType::unranked(DataType::Int64)),
        ]);
        assert_eq!(v.to_string(), "vec[tensor<2x?xfloat32>, tensor<*xint64>]");
    }

    #[test]
    fn unify_and_join() {
        let a = Some(vec![2, DYNAMIC]);
        let b = Some(vec![DYNAMIC, 3]);
        assert_eq!(unify_dims("t", &a, &b).unwrap(), Some(vec![2, 3]));
        assert_eq!(unify_dims("t", &None, &b).unwrap(), b);
        assert!(unify_dims("t", &Some(vec![2]), &Some(vec![3])).is_err());
        assert!(unify_dims("t", &Some(vec![2]), &Some(vec![2, 1])).is_err());

        assert_eq!(join_dims(&Some(vec![2, 3]), &Some(vec![2, 4])), Some(vec![2, DYNAMIC]));
        assert_eq!(join_dims(&Some(vec![2]), &Some(vec![2, 4])), None);
    }

    #[test]
    fn admits_runtime_dims() {
        let t = TensorType::new([2, DYNAMIC], DataType::Float32);
        assert!(t.admits(&[2, 7]));
        assert!(!t.admits(&[3, 7]));
        assert!(!t.admits(&[2]));
        assert_eq!(t.numel(), None);
        assert_eq!(TensorType::new([2, 3], DataType::Int8).numel(), Some(6));
        assert_eq!(TensorType::new([1 << 40, 1 << 40], DataType::Int8).numel(), None);
    }
}
