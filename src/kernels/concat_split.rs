//! Concatenation and splitting work on raw element bytes, so every dtype is
//! handled by the same code.

use crate::{
    error::{Error, Result},
    kernels::{DeviceContext, view_shape},
    tensor::DenseTensor,
    types::normalize_axis,
};

/// Element counts before `axis` and byte count of one slice after it.
fn outer_inner(dims: &[usize], axis: usize, elem: usize) -> (usize, usize) {
    let outer = dims[..axis].iter().product();
    let inner = dims[axis + 1..].iter().product::<usize>() * elem;
    (outer, inner)
}

pub fn concat<C: DeviceContext + ?Sized>(
    _ctx: &C,
    xs: &[&DenseTensor],
    axis: i64,
) -> Result<DenseTensor> {
    let first = xs
        .first()
        .ok_or_else(|| Error::Invalid("concat: no inputs".to_string()))?;
    let axis = normalize_axis(axis, first.rank(), "concat")?;

    let mut out_dims = first.dims().to_vec();
    out_dims[axis] = 0;
    for x in xs {
        if x.dtype() != first.dtype() {
            return Err(Error::DtypeMismatch {
                op: "concat",
                expected: first.dtype(),
                actual: x.dtype(),
            });
        }
        let same_elsewhere = x.rank() == first.rank()
            && x
                .dims()
                .iter()
                .zip(first.dims())
                .enumerate()
                .all(|(d, (a, b))| d == axis || a == b);
        if !same_elsewhere {
            return Err(Error::ShapeMismatch {
                op: "concat",
                lhs: first.dims_i64(),
                rhs: x.dims_i64(),
            });
        }
        out_dims[axis] += x.dims()[axis];
    }

    let elem = first.dtype().size_of();
    let (outer, inner) = outer_inner(&out_dims, axis, elem);
    let parts: Vec<(Vec<u8>, usize)> = xs
        .iter()
        .map(|x| (x.contiguous_bytes(), x.dims()[axis] * inner))
        .collect();

    let mut bytes = Vec::with_capacity(out_dims.iter().product::<usize>() * elem);
    for o in 0..outer {
        for (part, chunk) in &parts {
            bytes.extend_from_slice(&part[o * chunk..(o + 1) * chunk]);
        }
    }
    DenseTensor::from_bytes(bytes, &out_dims, first.dtype(), first.place().clone())
}

/// Splits `x` along `axis` into pieces of the given extents.
pub fn split<C: DeviceContext + ?Sized>(
    _ctx: &C,
    x: &DenseTensor,
    sections: &[usize],
    axis: i64,
) -> Result<Vec<DenseTensor>> {
    let axis = normalize_axis(axis, x.rank(), "split")?;
    let total: usize = sections.iter().sum();
    if total != x.dims()[axis] {
        return Err(Error::ShapeMismatch {
            op: "split",
            lhs: x.dims_i64(),
            rhs: sections.iter().map(|&s| s as i64).collect(),
        });
    }

    let elem = x.dtype().size_of();
    let (outer, inner) = outer_inner(x.dims(), axis, elem);
    let src = x.contiguous_bytes();
    let row = total * inner;

    let mut out = Vec::with_capacity(sections.len());
    let mut start = 0;
    for &section in sections {
        let chunk = section * inner;
        let mut bytes = Vec::with_capacity(outer * chunk);
        for o in 0..outer {
            let base = o * row + start;
            bytes.extend_from_slice(&src[base..base + chunk]);
        }
        let mut dims = x.dims().to_vec();
        dims[axis] = section;
        out.push(DenseTensor::from_bytes(bytes, &dims, x.dtype(), x.place().clone())?);
        start += chunk;
    }
    Ok(out)
}

/// Joins same-shaped tensors along a new `axis`.
pub fn stack<C: DeviceContext + ?Sized>(
    ctx: &C,
    xs: &[&DenseTensor],
    axis: i64,
) -> Result<DenseTensor> {
    let first = xs
        .first()
        .ok_or_else(|| Error::Invalid("stack: no inputs".to_string()))?;
    let axis = normalize_axis(axis, first.rank() + 1, "stack")?;
    if let Some(x) = xs.iter().find(|x| x.dims() != first.dims()) {
        return Err(Error::ShapeMismatch {
            op: "stack",
            lhs: first.dims_i64(),
            rhs: x.dims_i64(),
        });
    }

    let expanded = xs
        .iter()
        .map(|x| {
            let mut dims = x.dims_i64();
            dims.insert(axis, 1);
            view_shape(ctx, x, &dims)
        })
        .collect::<Result<Vec<_>>>()?;
    let refs: Vec<&DenseTensor> = expanded.iter().collect();
    concat(ctx, &refs, axis as i64)
}

/// Inverse of `stack`: one tensor per index along `axis`, with that axis removed.
pub fn unstack<C: DeviceContext + ?Sized>(
    ctx: &C,
    x: &DenseTensor,
    axis: i64,
) -> Result<Vec<DenseTensor>> {
    let axis = normalize_axis(axis, x.rank(), "unstack")?;
    let pieces = split(ctx, x, &vec![1; x.dims()[axis]], axis as i64)?;
    let mut dims = x.dims_i64();
    dims.remove(axis);
    pieces.iter().map(|p| view_shape(ctx, p, &dims)).collect()
}
