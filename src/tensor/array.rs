use crate::{
    error::{Error, Result},
    tensor::DenseTensor,
    types::DataType,
};

/// A dynamic-length list of tensors of one dtype.
///
/// Arrays are values: `with_item` returns the next version and leaves `self`
/// untouched. Tensors inside share storage, so versions are cheap.
#[derive(Debug, Clone)]
pub struct TensorArray {
    dtype: DataType,
    items: Vec<Option<DenseTensor>>,
}

impl TensorArray {
    pub fn new(dtype: DataType) -> Self {
        Self {
            dtype,
            items: vec![],
        }
    }

    pub fn from_tensors(dtype: DataType, tensors: Vec<DenseTensor>) -> Self {
        Self {
            dtype,
            items: tensors.into_iter().map(Some).collect(),
        }
    }

    pub fn from_slots(dtype: DataType, items: Vec<Option<DenseTensor>>) -> Self {
        Self { dtype, items }
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DenseTensor> {
        self.items.get(index).and_then(Option::as_ref)
    }

    pub fn slots(&self) -> impl Iterator<Item = Option<&DenseTensor>> {
        self.items.iter().map(Option::as_ref)
    }

    pub fn read(&self, index: i64, op: &'static str) -> Result<&DenseTensor> {
        let slot = self.slot(index, op)?;
        if slot >= self.len() {
            return Err(Error::IndexOutOfRange {
                op,
                index,
                len: self.len(),
            });
        }
        self.get(slot)
            .ok_or(Error::UninitializedSlot { op, index: slot })
    }

    /// Next version with slot `index` set to `x`. Writing past the end grows
    /// the array with uninitialized slots.
    pub fn with_item(&self, index: i64, x: DenseTensor, op: &'static str) -> Result<TensorArray> {
        if x.dtype() != self.dtype {
            return Err(Error::DtypeMismatch {
                op,
                expected: self.dtype,
                actual: x.dtype(),
            });
        }
        let slot = self.slot(index, op)?;
        let mut items = self.items.clone();
        if slot >= items.len() {
            items.resize(slot + 1, None);
        }
        items[slot] = Some(x);
        Ok(Self {
            dtype: self.dtype,
            items,
        })
    }

    /// Every slot, failing on the first uninitialized one.
    pub fn initialized(&self, op: &'static str) -> Result<Vec<&DenseTensor>> {
        self.items
            .iter()
            .enumerate()
            .map(|(index, item)| item.as_ref().ok_or(Error::UninitializedSlot { op, index }))
            .collect()
    }

    fn slot(&self, index: i64, op: &'static str) -> Result<usize> {
        usize::try_from(index).map_err(|_| Error::IndexOutOfRange {
            op,
            index,
            len: self.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(v: f32) -> DenseTensor {
        DenseTensor::from_vec(vec![v], &[1]).unwrap()
    }

    #[test]
    fn writes_produce_new_versions() {
        let a0 = TensorArray::new(DataType::Float32);
        let a1 = a0.with_item(0, t(1.0), "test").unwrap();
        let a2 = a1.with_item(2, t(3.0), "test").unwrap();

        assert_eq!(a0.len(), 0);
        assert_eq!(a1.len(), 1);
        assert_eq!(a2.len(), 3);
        assert!(a2.get(1).is_none());
        assert_eq!(a2.read(2, "test").unwrap().to_vec::<f32>().unwrap(), vec![3.0]);
        assert!(matches!(
            a2.read(1, "test"),
            Err(Error::UninitializedSlot { index: 1, .. })
        ));
        assert!(matches!(
            a1.read(5, "test"),
            Err(Error::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn write_checks_dtype() {
        let a = TensorArray::new(DataType::Int32);
        assert!(matches!(
            a.with_item(0, t(1.0), "test"),
            Err(Error::DtypeMismatch { .. })
        ));
    }
}
