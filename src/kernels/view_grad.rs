//! Gradients of views. A view never moves data, so its gradient is the same
//! view run backwards: reinterpret `out_grad` with the metadata `input` had
//! before the forward view.

use crate::{
    error::Result,
    kernels::{DataLayout, DeviceContext, KernelArgs, KernelFactory, view_dtype, view_shape},
    tensor::DenseTensor,
    types::DataType,
};

/// `dims` is the forward view's requested shape; the target is re-derived
/// from `input` at call time.
pub fn view_shape_grad<C: DeviceContext + ?Sized>(
    ctx: &C,
    input: &DenseTensor,
    out_grad: &DenseTensor,
    _dims: &[i64],
) -> Result<DenseTensor> {
    view_shape(ctx, out_grad, &input.dims_i64())
}

/// `dtype` is the forward view's requested dtype; the target is `input`'s.
pub fn view_dtype_grad<C: DeviceContext + ?Sized>(
    ctx: &C,
    input: &DenseTensor,
    out_grad: &DenseTensor,
    _dtype: DataType,
) -> Result<DenseTensor> {
    view_dtype(ctx, out_grad, input.dtype())
}

fn view_shape_grad_kernel(ctx: &dyn DeviceContext, args: &KernelArgs<'_>) -> Result<DenseTensor> {
    view_shape_grad(ctx, args.input(0)?, args.input(1)?, args.int64s(0)?)
}

fn view_dtype_grad_kernel(ctx: &dyn DeviceContext, args: &KernelArgs<'_>) -> Result<DenseTensor> {
    view_dtype_grad(ctx, args.input(0)?, args.input(1)?, args.dtype(0)?)
}

pub(crate) fn register(factory: &mut KernelFactory) {
    factory.register_all_backends_except_custom(
        "view_grad_shape",
        DataLayout::Strided,
        view_shape_grad_kernel,
    );
    factory.register_all_backends_except_custom(
        "view_grad_dtype",
        DataLayout::Strided,
        view_dtype_grad_kernel,
    );
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{error::Error, kernels::CpuContext};

    #[test]
    fn shape_grad_restores_input_shape() {
        let ctx = CpuContext::new();
        let input = DenseTensor::from_vec(vec![0f32; 6], &[2, 3]).unwrap();
        let out_grad = DenseTensor::from_vec((1..=6).map(|v| v as f32).collect(), &[3, 2]).unwrap();

        let input_grad = view_shape_grad(&ctx, &input, &out_grad, &[3, 2]).unwrap();

        assert_eq!(input_grad.dims(), &[2, 3]);
        assert!(input_grad.shares_storage_with(&out_grad));
        assert_eq!(
            input_grad.to_vec::<f32>().unwrap(),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
        );
    }

    #[test]
    fn dtype_grad_restores_input_dtype_bits() {
        let ctx = CpuContext::new();
        let input = DenseTensor::from_vec(vec![0f32; 3], &[3]).unwrap();
        let pattern = vec![0x3f80_0000i32, -0x4000_0000, 0x0000_0001];
        let out_grad = DenseTensor::from_vec(pattern.clone(), &[3]).unwrap();

        let input_grad = view_dtype_grad(&ctx, &input, &out_grad, DataType::Int32).unwrap();

        assert_eq!(input_grad.dtype(), DataType::Float32);
        let bits: Vec<i32> = input_grad
            .to_vec::<f32>()
            .unwrap()
            .into_iter()
            .map(|v| v.to_bits() as i32)
            .collect();
        assert_eq!(bits, pattern);
    }

    #[rstest]
    #[case(vec![2, 3], vec![3, 2])]
    #[case(vec![4], vec![2, 2])]
    #[case(vec![2, 1, 3], vec![-1])]
    #[case(vec![], vec![1, 1])]
    fn shape_round_trip(#[case] dims: Vec<usize>, #[case] view: Vec<i64>) {
        let ctx = CpuContext::new();
        let numel: usize = dims.iter().product();
        let x = DenseTensor::from_vec((0..numel as i64).collect(), &dims).unwrap();
        let y = view_shape(&ctx, &x, &view).unwrap();
        let back = view_shape_grad(&ctx, &x, &y, &view).unwrap();
        assert_eq!(back.dims(), x.dims());
        assert_eq!(back.to_vec::<i64>().unwrap(), x.to_vec::<i64>().unwrap());
    }

    #[rstest]
    #[case(DataType::Int32)]
    #[case(DataType::UInt8)]
    #[case(DataType::Float64)]
    #[case(DataType::BFloat16)]
    fn dtype_round_trip(#[case] target: DataType) {
        let ctx = CpuContext::new();
        let x = DenseTensor::from_vec(vec![1.5f32, -3.0, 8.25, 0.5], &[2, 2]).unwrap();
        let y = view_dtype(&ctx, &x, target).unwrap();
        let back = view_dtype_grad(&ctx, &x, &y, target).unwrap();
        assert_eq!(back.dtype(), DataType::Float32);
        assert_eq!(back.dims(), x.dims());
        assert_eq!(back.contiguous_bytes(), x.contiguous_bytes());
    }

    #[test]
    fn shape_grad_with_mismatched_count_fails() {
        let ctx = CpuContext::new();
        let input = DenseTensor::from_vec(vec![0f32; 6], &[2, 3]).unwrap();
        let out_grad = DenseTensor::from_vec(vec![0f32; 4], &[4]).unwrap();
        assert!(matches!(
            view_shape_grad(&ctx, &input, &out_grad, &[4]),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
