use crate::error::{Error, Result};

/// Shape, element strides and byte offset of a strided tensor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Layout {
    dims: Vec<usize>,
    strides: Vec<usize>,
    offset: usize,
}

impl Layout {
    pub fn new(dims: &[usize], strides: &[usize], offset: usize) -> Self {
        Self {
            dims: dims.to_vec(),
            strides: strides.to_vec(),
            offset,
        }
    }

    pub fn contiguous(dims: &[usize]) -> Self {
        Self {
            dims: dims.to_vec(),
            strides: Self::compute_strides(dims),
            offset: 0,
        }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Byte offset from the start of storage.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn numel(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn is_contiguous(&self) -> bool {
        let mut expected = 1;
        for (&dim, &stride) in self.dims.iter().zip(&self.strides).rev() {
            if dim == 1 {
                continue;
            }
            if stride != expected {
                return false;
            }
            expected *= dim;
        }
        true
    }

    /// Element offsets (relative to `offset`) in row-major logical order.
    pub fn element_offsets(&self) -> Vec<usize> {
        let numel = self.numel();
        let mut out = Vec::with_capacity(numel);
        if numel == 0 {
            return out;
        }
        let mut index = vec![0usize; self.rank()];
        for _ in 0..numel {
            out.push(
                index
                    .iter()
                    .zip(&self.strides)
                    .map(|(i, s)| i * s)
                    .sum(),
            );
            for d in (0..self.rank()).rev() {
                index[d] += 1;
                if index[d] < self.dims[d] {
                    break;
                }
                index[d] = 0;
            }
        }
        out
    }

    /// Largest element offset touched plus one, i.e. the element span a view
    /// needs from its storage.
    pub fn span(&self) -> usize {
        if self.numel() == 0 {
            return 0;
        }
        1 + self
            .dims
            .iter()
            .zip(&self.strides)
            .map(|(d, s)| (d - 1) * s)
            .sum::<usize>()
    }

    pub fn compute_strides(dims: &[usize]) -> Vec<usize> {
        let mut strides = vec![1; dims.len()];
        for i in (0..dims.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * dims[i + 1].max(1);
        }
        strides
    }
}

/// Maps a possibly negative `axis` into `0..rank`.
pub fn normalize_axis(axis: i64, rank: usize, op: &'static str) -> Result<usize> {
    let r = rank as i64;
    let a = if axis < 0 { axis + r } else { axis };
    if a < 0 || a >= r {
        return Err(Error::InvalidAxis { op, axis, rank });
    }
    Ok(a as usize)
}

/// Strides for viewing a tensor of `old_dims`/`old_strides` as `new_dims`
/// without moving data, or `None` when some view dimension would have to
/// span two memory chunks that are not contiguous with each other.
///
/// Input dimensions are grouped, innermost first, into chunks whose strides
/// chain (`stride[d - 1] == numel(chunk) * base`). Each chunk must be covered
/// exactly by a run of view dimensions.
pub fn reshape_stride(
    old_dims: &[usize],
    old_strides: &[usize],
    new_dims: &[usize],
) -> Option<Vec<usize>> {
    let numel: usize = old_dims.iter().product();
    if new_dims.iter().product::<usize>() != numel {
        return None;
    }
    if numel == 0 || old_dims.is_empty() {
        if old_dims == new_dims {
            return Some(old_strides.to_vec());
        }
        return Some(Layout::compute_strides(new_dims));
    }

    let mut new_strides = vec![0usize; new_dims.len()];
    let mut view_d = new_dims.len() as isize - 1;
    let mut chunk_base_stride = *old_strides.last()?;
    let mut tensor_numel = 1;
    let mut view_numel = 1;

    for tensor_d in (0..old_dims.len()).rev() {
        tensor_numel *= old_dims[tensor_d];
        let chunk_ends = tensor_d == 0
            || (old_dims[tensor_d - 1] != 1
                && old_strides[tensor_d - 1] != tensor_numel * chunk_base_stride);
        if !chunk_ends {
            continue;
        }
        while view_d >= 0 && (view_numel < tensor_numel || new_dims[view_d as usize] == 1) {
            new_strides[view_d as usize] = view_numel * chunk_base_stride;
            view_numel *= new_dims[view_d as usize];
            view_d -= 1;
        }
        if view_numel != tensor_numel {
            return None;
        }
        if tensor_d > 0 {
            chunk_base_stride = old_strides[tensor_d - 1];
            tensor_numel = 1;
            view_numel = 1;
        }
    }

    if view_d != -1 {
        return None;
    }
    Some(new_strides)
}
