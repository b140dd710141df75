//! Views: a new tensor over the same storage with reinterpreted shape or
//! dtype. Nothing here copies data.

use log::debug;

use crate::{
    error::{Error, Result},
    kernels::{DataLayout, DeviceContext, KernelArgs, KernelFactory},
    tensor::{DenseTensor, TensorMeta},
    types::{DataType, Layout, reshape_stride},
};

/// Resolves a requested view shape against `numel` elements. At most one
/// extent may be `-1`; it absorbs the remaining elements.
pub fn infer_view_dims(src_dims: &[usize], dims: &[i64]) -> Result<Vec<usize>> {
    let numel: usize = src_dims.iter().product();
    let mismatch = || Error::ShapeMismatch {
        op: "view_shape",
        lhs: src_dims.iter().map(|&d| d as i64).collect(),
        rhs: dims.to_vec(),
    };

    let mut inferred = None;
    let mut known = 1usize;
    for (i, &d) in dims.iter().enumerate() {
        match d {
            -1 if inferred.is_none() => inferred = Some(i),
            d if d >= 0 => known = known.checked_mul(d as usize).ok_or_else(mismatch)?,
            _ => return Err(mismatch()),
        }
    }

    let mut out: Vec<usize> = dims.iter().map(|&d| d.max(0) as usize).collect();
    match inferred {
        Some(i) => {
            if known == 0 || numel % known != 0 {
                return Err(mismatch());
            }
            out[i] = numel / known;
        }
        None if known != numel => return Err(mismatch()),
        None => {}
    }
    Ok(out)
}

pub fn view_shape<C: DeviceContext + ?Sized>(
    _ctx: &C,
    input: &DenseTensor,
    dims: &[i64],
) -> Result<DenseTensor> {
    let new_dims = infer_view_dims(input.dims(), dims)?;
    let strides = reshape_stride(input.dims(), input.strides(), &new_dims).ok_or_else(|| {
        Error::NotViewable(format!(
            "dims {:?} with strides {:?} can not be viewed as {:?}",
            input.dims(),
            input.strides(),
            new_dims
        ))
    })?;
    debug!("view_shape {:?} -> {:?}", input.dims(), new_dims);

    input.view(TensorMeta {
        dtype: input.dtype(),
        layout: Layout::new(&new_dims, &strides, input.offset()),
        place: input.place().clone(),
    })
}

pub fn view_dtype<C: DeviceContext + ?Sized>(
    _ctx: &C,
    input: &DenseTensor,
    dtype: DataType,
) -> Result<DenseTensor> {
    let in_size = input.dtype().size_of();
    let out_size = dtype.size_of();
    let mut dims = input.dims().to_vec();
    let mut strides = input.strides().to_vec();
    let offset = input.offset();

    if in_size != out_size {
        let Some(last) = dims.len().checked_sub(1) else {
            return Err(Error::NotViewable(format!(
                "a 0-d {} tensor can not be viewed as {dtype}",
                input.dtype()
            )));
        };
        if strides[last] != 1 {
            return Err(Error::NotViewable(format!(
                "last stride must be 1 to view {} as {dtype}, got {}",
                input.dtype(),
                strides[last]
            )));
        }

        if in_size > out_size {
            let times = in_size / out_size;
            dims[last] *= times;
            for s in &mut strides[..last] {
                *s *= times;
            }
        } else {
            let times = out_size / in_size;
            if dims[last] % times != 0 {
                return Err(Error::NotViewable(format!(
                    "last dim {} is not divisible by {times} to view {} as {dtype}",
                    dims[last],
                    input.dtype()
                )));
            }
            if offset % out_size != 0 {
                return Err(Error::NotViewable(format!(
                    "byte offset {offset} is not aligned to {dtype}"
                )));
            }
            for s in &mut strides[..last] {
                if *s % times != 0 {
                    return Err(Error::NotViewable(format!(
                        "stride {s} is not divisible by {times} to view {} as {dtype}",
                        input.dtype()
                    )));
                }
                *s /= times;
            }
            dims[last] /= times;
        }
    }
    debug!("view_dtype {} -> {dtype}", input.dtype());

    input.view(TensorMeta {
        dtype,
        layout: Layout::new(&dims, &strides, offset),
        place: input.place().clone(),
    })
}

fn view_shape_kernel(ctx: &dyn DeviceContext, args: &KernelArgs<'_>) -> Result<DenseTensor> {
    view_shape(ctx, args.input(0)?, args.int64s(0)?)
}

fn view_dtype_kernel(ctx: &dyn DeviceContext, args: &KernelArgs<'_>) -> Result<DenseTensor> {
    view_dtype(ctx, args.input(0)?, args.dtype(0)?)
}

pub(crate) fn register(factory: &mut KernelFactory) {
    factory.register_all_backends_except_custom("view_shape", DataLayout::Strided, view_shape_kernel);
    factory.register_all_backends_except_custom("view_dtype", DataLayout::Strided, view_dtype_kernel);
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::kernels::CpuContext;

    #[rstest]
    #[case(vec![2, 3], vec![3, 2], vec![3, 2])]
    #[case(vec![2, 3], vec![-1], vec![6])]
    #[case(vec![2, 3, 4], vec![4, -1], vec![4, 6])]
    #[case(vec![0, 3], vec![-1, 3], vec![0, 3])]
    fn infers_view_dims(#[case] src: Vec<usize>, #[case] dims: Vec<i64>, #[case] expected: Vec<usize>) {
        assert_eq!(infer_view_dims(&src, &dims).unwrap(), expected);
    }

    #[rstest]
    #[case(vec![2, 3], vec![4])]
    #[case(vec![2, 3], vec![-1, -1])]
    #[case(vec![2, 3], vec![-2, -3])]
    #[case(vec![2, 3], vec![0, -1])]
    #[case(vec![6], vec![1 << 40, 1 << 40])]
    #[case(vec![6], vec![3, 1 << 62, 8])]
    #[case(vec![6], vec![-1, 1 << 40, 1 << 40])]
    fn rejects_bad_view_dims(#[case] src: Vec<usize>, #[case] dims: Vec<i64>) {
        assert!(matches!(
            infer_view_dims(&src, &dims),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn view_shape_shares_storage() {
        let ctx = CpuContext::new();
        let values: Vec<f32> = (1..=6).map(|v| v as f32).collect();
        let x = DenseTensor::from_vec(values, &[2, 3]).unwrap();
        let y = view_shape(&ctx, &x, &[3, 2]).unwrap();
        assert!(y.shares_storage_with(&x));
        assert_eq!(y.dims(), &[3, 2]);
        assert_eq!(y.strides(), &[2, 1]);
        assert_eq!(y.to_vec::<f32>().unwrap(), x.to_vec::<f32>().unwrap());
    }

    #[test]
    fn huge_view_shape_is_a_mismatch() {
        let ctx = CpuContext::new();
        let x = DenseTensor::from_vec(vec![0f32; 6], &[6]).unwrap();
        assert!(matches!(
            view_shape(&ctx, &x, &[3, 1 << 62, 8]),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn view_shape_of_transposed_tensor_fails() {
        let ctx = CpuContext::new();
        let values: Vec<f32> = (1..=6).map(|v| v as f32).collect();
        let x = DenseTensor::from_vec(values, &[2, 3]).unwrap();
        let mut meta = x.meta().clone();
        meta.layout = Layout::new(&[3, 2], &[1, 3], 0);
        let xt = x.view(meta).unwrap();
        assert!(matches!(
            view_shape(&ctx, &xt, &[6]),
            Err(Error::NotViewable(_))
        ));
        // splitting a single chunk is still fine
        let y = view_shape(&ctx, &xt, &[3, 2, 1]).unwrap();
        assert_eq!(y.to_vec::<f32>().unwrap(), xt.to_vec::<f32>().unwrap());
    }

    #[test]
    fn view_dtype_same_size_keeps_bits() {
        let ctx = CpuContext::new();
        let x = DenseTensor::from_vec(vec![1.0f32, -2.5, 0.0], &[3]).unwrap();
        let y = view_dtype(&ctx, &x, DataType::Int32).unwrap();
        assert!(y.shares_storage_with(&x));
        assert_eq!(y.dims(), &[3]);
        let bits: Vec<i32> = [1.0f32, -2.5, 0.0]
            .iter()
            .map(|v| v.to_bits() as i32)
            .collect();
        assert_eq!(y.to_vec::<i32>().unwrap(), bits);
    }

    #[test]
    fn view_dtype_to_smaller_scales_last_dim() {
        let ctx = CpuContext::new();
        let x = DenseTensor::from_vec(vec![1i32, 2, 3, 4, 5, 6], &[2, 3]).unwrap();
        let y = view_dtype(&ctx, &x, DataType::Int16).unwrap();
        assert_eq!(y.dims(), &[2, 6]);
        assert_eq!(y.strides(), &[6, 1]);

        let back = view_dtype(&ctx, &y, DataType::Int32).unwrap();
        assert_eq!(back.dims(), &[2, 3]);
        assert_eq!(back.strides(), &[3, 1]);
        assert_eq!(back.to_vec::<i32>().unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn view_dtype_to_larger_needs_divisible_last_dim() {
        let ctx = CpuContext::new();
        let x = DenseTensor::from_vec(vec![1u8, 2, 3], &[3]).unwrap();
        assert!(matches!(
            view_dtype(&ctx, &x, DataType::Int16),
            Err(Error::NotViewable(_))
        ));
        let scalar = DenseTensor::scalar(1.0f64);
        assert!(view_dtype(&ctx, &scalar, DataType::Int32).is_err());
        assert!(view_dtype(&ctx, &scalar, DataType::Int64).is_ok());
    }
}
