use std::sync::Arc;

use crate::{
    error::{Error, Result},
    tensor::{Element, Storage},
    types::{DataType, Layout, Place},
};

#[derive(Debug, Clone, PartialEq)]
pub struct TensorMeta {
    pub dtype: DataType,
    pub layout: Layout,
    pub place: Place,
}

/// A strided view over shared host storage.
#[derive(Debug, Clone)]
pub struct DenseTensor {
    storage: Arc<Storage>,
    meta: TensorMeta,
}

impl DenseTensor {
    pub fn from_bytes(bytes: Vec<u8>, dims: &[usize], dtype: DataType, place: Place) -> Result<Self> {
        let layout = Layout::contiguous(dims);
        let expected = layout.numel() * dtype.size_of();
        if bytes.len() != expected {
            return Err(Error::Invalid(format!(
                "{} bytes can not hold {:?} elements of {dtype}",
                bytes.len(),
                dims
            )));
        }
        Ok(Self {
            storage: Arc::new(Storage::new(bytes)),
            meta: TensorMeta {
                dtype,
                layout,
                place,
            },
        })
    }

    pub fn from_vec<T: Element>(data: Vec<T>, dims: &[usize]) -> Result<Self> {
        let bytes = bytemuck::cast_slice::<T, u8>(&data).to_vec();
        Self::from_bytes(bytes, dims, T::DTYPE, Place::Cpu)
    }

    pub fn scalar<T: Element>(value: T) -> Self {
        let bytes = bytemuck::bytes_of(&value).to_vec();
        Self {
            storage: Arc::new(Storage::new(bytes)),
            meta: TensorMeta {
                dtype: T::DTYPE,
                layout: Layout::contiguous(&[]),
                place: Place::Cpu,
            },
        }
    }

    /// Re-tags the tensor with another place. Storage stays on the host.
    pub fn with_place(mut self, place: Place) -> Self {
        self.meta.place = place;
        self
    }

    /// A tensor sharing this one's storage under new metadata.
    pub fn view(&self, meta: TensorMeta) -> Result<Self> {
        let needed = meta.layout.offset() + meta.layout.span() * meta.dtype.size_of();
        if needed > self.storage.len() {
            return Err(Error::NotViewable(format!(
                "view needs {needed} bytes but storage holds {}",
                self.storage.len()
            )));
        }
        Ok(Self {
            storage: Arc::clone(&self.storage),
            meta,
        })
    }

    pub fn meta(&self) -> &TensorMeta {
        &self.meta
    }

    pub fn dtype(&self) -> DataType {
        self.meta.dtype
    }

    pub fn layout(&self) -> &Layout {
        &self.meta.layout
    }

    pub fn dims(&self) -> &[usize] {
        self.meta.layout.dims()
    }

    pub fn dims_i64(&self) -> Vec<i64> {
        self.dims().iter().map(|&d| d as i64).collect()
    }

    pub fn strides(&self) -> &[usize] {
        self.meta.layout.strides()
    }

    pub fn offset(&self) -> usize {
        self.meta.layout.offset()
    }

    pub fn place(&self) -> &Place {
        &self.meta.place
    }

    pub fn rank(&self) -> usize {
        self.meta.layout.rank()
    }

    pub fn numel(&self) -> usize {
        self.meta.layout.numel()
    }

    pub fn is_contiguous(&self) -> bool {
        self.meta.layout.is_contiguous()
    }

    pub fn shares_storage_with(&self, other: &DenseTensor) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Element bytes in row-major logical order.
    pub fn contiguous_bytes(&self) -> Vec<u8> {
        let size = self.dtype().size_of();
        let bytes = self.storage.as_bytes();
        let base = self.offset();
        if self.is_contiguous() {
            return bytes[base..base + self.numel() * size].to_vec();
        }
        let mut out = Vec::with_capacity(self.numel() * size);
        for off in self.layout().element_offsets() {
            let start = base + off * size;
            out.extend_from_slice(&bytes[start..start + size]);
        }
        out
    }

    /// A fresh contiguous copy with its own storage.
    pub fn contiguous(&self) -> DenseTensor {
        Self {
            storage: Arc::new(Storage::new(self.contiguous_bytes())),
            meta: TensorMeta {
                dtype: self.dtype(),
                layout: Layout::contiguous(self.dims()),
                place: self.place().clone(),
            },
        }
    }

    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if T::DTYPE != self.dtype() {
            return Err(Error::DtypeMismatch {
                op: "to_vec",
                expected: T::DTYPE,
                actual: self.dtype(),
            });
        }
        Ok(bytemuck::pod_collect_to_vec::<u8, T>(&self.contiguous_bytes()))
    }

    /// Reads an integer tensor as `i64`s.
    pub fn to_indices(&self, op: &'static str) -> Result<Vec<i64>> {
        match self.dtype() {
            DataType::Int64 => self.to_vec::<i64>(),
            DataType::Int32 => Ok(self.to_vec::<i32>()?.into_iter().map(i64::from).collect()),
            dtype => Err(Error::UnsupportedDtype { op, dtype }),
        }
    }

    /// Reads a single-element integer tensor.
    pub fn to_index(&self, op: &'static str) -> Result<i64> {
        let indices = self.to_indices(op)?;
        match indices.as_slice() {
            [i] => Ok(*i),
            _ => Err(Error::ShapeMismatch {
                op,
                lhs: self.dims_i64(),
                rhs: vec![1],
            }),
        }
    }
}
