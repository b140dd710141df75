use num_traits::{NumCast, ToPrimitive};

use crate::{
    error::{Error, Result},
    kernels::{DataLayout, DeviceContext, KernelArgs, KernelFactory},
    tensor::{DenseTensor, dispatch_numeric},
    types::{DataType, Place},
};

fn cast<T: NumCast>(op: &'static str, value: f64, dtype: DataType) -> Result<T> {
    NumCast::from(value)
        .ok_or_else(|| Error::Invalid(format!("{op}: {value} does not fit in {dtype}")))
}

/// A new tensor of `dims` filled with `value`, placed on `place` or on the
/// context's device.
pub fn full<C: DeviceContext + ?Sized>(
    ctx: &C,
    dims: &[usize],
    value: f64,
    dtype: DataType,
    place: Option<Place>,
) -> Result<DenseTensor> {
    let place = place.unwrap_or_else(|| ctx.place());
    let numel: usize = dims.iter().product();
    let t = match dtype {
        DataType::Bool => {
            let byte = (value != 0.0) as u8;
            DenseTensor::from_bytes(vec![byte; numel], dims, DataType::Bool, place.clone())?
        }
        dtype => dispatch_numeric!(dtype, "full", |T| {
            let v: T = cast("full", value, dtype)?;
            DenseTensor::from_vec(vec![v; numel], dims)
        })?,
    };
    Ok(t.with_place(place))
}

/// `full` shaped like `x`; dtype and place follow `x` unless given.
pub fn full_like<C: DeviceContext + ?Sized>(
    ctx: &C,
    x: &DenseTensor,
    value: f64,
    dtype: Option<DataType>,
    place: Option<Place>,
) -> Result<DenseTensor> {
    let dtype = dtype.unwrap_or(x.dtype());
    let place = place.unwrap_or_else(|| x.place().clone());
    full(ctx, x.dims(), value, dtype, Some(place))
}

/// Contiguous copy with its own storage.
pub fn assign<C: DeviceContext + ?Sized>(_ctx: &C, x: &DenseTensor) -> Result<DenseTensor> {
    Ok(x.contiguous())
}

/// `x * scale + bias`, or `(x + bias) * scale` when `bias_after_scale` is off.
pub fn scale<C: DeviceContext + ?Sized>(
    _ctx: &C,
    x: &DenseTensor,
    scale: f64,
    bias: f64,
    bias_after_scale: bool,
) -> Result<DenseTensor> {
    let dtype = x.dtype();
    let out = dispatch_numeric!(dtype, "scale", |T| {
        let values = x
            .to_vec::<T>()?
            .into_iter()
            .map(|v| {
                let v = ToPrimitive::to_f64(&v).unwrap_or(f64::NAN);
                let y = if bias_after_scale {
                    v * scale + bias
                } else {
                    (v + bias) * scale
                };
                cast::<T>("scale", y, dtype)
            })
            .collect::<Result<Vec<T>>>()?;
        DenseTensor::from_vec(values, x.dims())
    })?;
    Ok(out.with_place(x.place().clone()))
}

/// Element-wise sum of same-shaped, same-dtype tensors.
pub fn add_n<C: DeviceContext + ?Sized>(_ctx: &C, xs: &[&DenseTensor]) -> Result<DenseTensor> {
    let (first, rest) = xs
        .split_first()
        .ok_or_else(|| Error::Invalid("add_n: no inputs".to_string()))?;
    for x in rest {
        if x.dtype() != first.dtype() {
            return Err(Error::DtypeMismatch {
                op: "add_n",
                expected: first.dtype(),
                actual: x.dtype(),
            });
        }
        if x.dims() != first.dims() {
            return Err(Error::ShapeMismatch {
                op: "add_n",
                lhs: first.dims_i64(),
                rhs: x.dims_i64(),
            });
        }
    }

    let out = dispatch_numeric!(first.dtype(), "add_n", |T| {
        let mut acc = first.to_ndarray::<T>()?;
        for x in rest {
            acc += &x.to_ndarray::<T>()?;
        }
        DenseTensor::from_ndarray(&acc)
    })?;
    Ok(out.with_place(first.place().clone()))
}

fn assign_kernel(ctx: &dyn DeviceContext, args: &KernelArgs<'_>) -> Result<DenseTensor> {
    assign(ctx, args.input(0)?)
}

fn scale_kernel(ctx: &dyn DeviceContext, args: &KernelArgs<'_>) -> Result<DenseTensor> {
    scale(
        ctx,
        args.input(0)?,
        args.float(0)?,
        args.float(1)?,
        args.bool(2)?,
    )
}

pub(crate) fn register(factory: &mut KernelFactory) {
    factory.register_all_backends("assign", DataLayout::AllLayout, assign_kernel);
    factory.register_all_backends("scale", DataLayout::AllLayout, scale_kernel);
}

#[cfg(test)]
mod tests {
    use half::f16;

    use super::*;
    use crate::kernels::{CpuContext, CustomContext};

    #[test]
    fn full_uses_context_place_by_default() {
        let t = full(&CpuContext::new(), &[2, 2], 1.0, DataType::Float32, None).unwrap();
        assert_eq!(t.place(), &Place::Cpu);
        assert_eq!(t.to_vec::<f32>().unwrap(), vec![1.0; 4]);

        let npu = CustomContext::new("npu", 1);
        let t = full(&npu, &[3], 0.0, DataType::Int64, None).unwrap();
        assert_eq!(t.place(), &npu.place());
        assert_eq!(t.to_vec::<i64>().unwrap(), vec![0; 3]);
    }

    #[test]
    fn full_fills_bool_and_half() {
        let ctx = CpuContext::new();
        let b = full(&ctx, &[2], 1.0, DataType::Bool, None).unwrap();
        assert_eq!(b.contiguous_bytes(), vec![1, 1]);
        let h = full(&ctx, &[2], 0.5, DataType::Float16, None).unwrap();
        assert_eq!(h.to_vec::<f16>().unwrap(), vec![f16::from_f32(0.5); 2]);
        assert!(full(&ctx, &[1], -1.0, DataType::UInt8, None).is_err());
    }

    #[test]
    fn full_like_inherits_unless_overridden() {
        let ctx = CpuContext::new();
        let x = DenseTensor::from_vec(vec![1i32, 2, 3], &[3])
            .unwrap()
            .with_place(Place::Gpu(0));
        let z = full_like(&ctx, &x, 0.0, None, None).unwrap();
        assert_eq!(z.dtype(), DataType::Int32);
        assert_eq!(z.place(), &Place::Gpu(0));

        let o = full_like(&ctx, &x, 1.0, Some(DataType::Float64), Some(Place::Cpu)).unwrap();
        assert_eq!(o.to_vec::<f64>().unwrap(), vec![1.0; 3]);
        assert_eq!(o.place(), &Place::Cpu);
    }

    #[test]
    fn scale_orders_bias() {
        let ctx = CpuContext::new();
        let x = DenseTensor::from_vec(vec![1.0f32, 2.0], &[2]).unwrap();
        let after = scale(&ctx, &x, 2.0, 1.0, true).unwrap();
        let before = scale(&ctx, &x, 2.0, 1.0, false).unwrap();
        assert_eq!(after.to_vec::<f32>().unwrap(), vec![3.0, 5.0]);
        assert_eq!(before.to_vec::<f32>().unwrap(), vec![4.0, 6.0]);
    }

    #[test]
    fn add_n_sums_and_checks() {
        let ctx = CpuContext::new();
        let a = DenseTensor::from_vec(vec![1i64, 2], &[2]).unwrap();
        let b = DenseTensor::from_vec(vec![10i64, 20], &[2]).unwrap();
        let sum = add_n(&ctx, &[&a, &b, &a]).unwrap();
        assert_eq!(sum.to_vec::<i64>().unwrap(), vec![12, 24]);

        let c = DenseTensor::from_vec(vec![1i64, 2, 3], &[3]).unwrap();
        assert!(matches!(
            add_n(&ctx, &[&a, &c]),
            Err(Error::ShapeMismatch { .. })
        ));
        let flags = full(&ctx, &[2], 1.0, DataType::Bool, None).unwrap();
        assert!(matches!(
            add_n(&ctx, &[&flags, &flags]),
            Err(Error::UnsupportedDtype { .. })
        ));
    }

    #[test]
    fn assign_detaches_storage() {
        let ctx = CpuContext::new();
        let x = DenseTensor::from_vec(vec![1u8, 2], &[2]).unwrap();
        let y = assign(&ctx, &x).unwrap();
        assert!(!y.shares_storage_with(&x));
        assert_eq!(y.to_vec::<u8>().unwrap(), vec![1, 2]);
    }
}
