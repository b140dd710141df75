use crate::{
    error::{Error, Result},
    kernels::{DeviceContext, add_n, assign, concat, full_like, split, stack, unstack},
    tensor::{DenseTensor, TensorArray},
    types::{DataType, normalize_axis},
};

pub fn array_length<C: DeviceContext + ?Sized>(ctx: &C, array: &TensorArray) -> Result<DenseTensor> {
    Ok(DenseTensor::from_vec(vec![array.len() as i64], &[1])?.with_place(ctx.place()))
}

/// Same length as `array`; each initialized slot becomes `full_like(slot, value)`.
pub fn create_array_like<C: DeviceContext + ?Sized>(
    ctx: &C,
    array: &TensorArray,
    value: f64,
) -> Result<TensorArray> {
    let slots = array
        .slots()
        .map(|slot| slot.map(|t| full_like(ctx, t, value, None, None)).transpose())
        .collect::<Result<Vec<_>>>()?;
    Ok(TensorArray::from_slots(array.dtype(), slots))
}

/// Stacks (or concatenates) every slot along `axis`. The second output holds
/// each slot's extent along `axis` as int32, the information
/// `tensor_to_array` needs to split a gradient back.
pub fn array_to_tensor<C: DeviceContext + ?Sized>(
    ctx: &C,
    array: &TensorArray,
    axis: i64,
    use_stack: bool,
) -> Result<(DenseTensor, DenseTensor)> {
    let items = array.initialized("array_to_tensor")?;
    let Some(first) = items.first() else {
        return Err(Error::Invalid("array_to_tensor: array is empty".to_string()));
    };

    let (out, extents) = if use_stack {
        (stack(ctx, &items, axis)?, vec![1i32; items.len()])
    } else {
        let a = normalize_axis(axis, first.rank(), "array_to_tensor")?;
        let extents = items
            .iter()
            .map(|t| {
                t.dims().get(a).map(|&d| d as i32).ok_or_else(|| Error::ShapeMismatch {
                    op: "array_to_tensor",
                    lhs: first.dims_i64(),
                    rhs: t.dims_i64(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        (concat(ctx, &items, axis)?, extents)
    };
    let n = extents.len();
    let index = DenseTensor::from_vec(extents, &[n])?.with_place(out.place().clone());
    Ok((out, index))
}

/// Gradient of `array_to_tensor`: splits `out_grad` into slots shaped like
/// those of `array`.
pub fn tensor_to_array<C: DeviceContext + ?Sized>(
    ctx: &C,
    array: &TensorArray,
    out_grad: &DenseTensor,
    axis: i64,
    use_stack: bool,
) -> Result<TensorArray> {
    let items = array.initialized("tensor_to_array")?;
    let pieces = if use_stack {
        let pieces = unstack(ctx, out_grad, axis)?;
        if pieces.len() != items.len() {
            return Err(Error::ShapeMismatch {
                op: "tensor_to_array",
                lhs: vec![items.len() as i64],
                rhs: vec![pieces.len() as i64],
            });
        }
        pieces
    } else {
        let a = normalize_axis(axis, out_grad.rank(), "tensor_to_array")?;
        let sections = items
            .iter()
            .map(|t| {
                t.dims().get(a).copied().ok_or(Error::InvalidAxis {
                    op: "tensor_to_array",
                    axis,
                    rank: t.rank(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        split(ctx, out_grad, &sections, axis)?
    };
    Ok(TensorArray::from_tensors(out_grad.dtype(), pieces))
}

/// Slot-wise sum. The result is as long as the longest input; a slot is
/// summed over the inputs that have it initialized.
pub fn add_n_array<C: DeviceContext + ?Sized>(
    ctx: &C,
    arrays: &[&TensorArray],
) -> Result<TensorArray> {
    let dtype: DataType = arrays
        .first()
        .map(|a| a.dtype())
        .ok_or_else(|| Error::Invalid("add_n_array: no inputs".to_string()))?;
    if let Some(a) = arrays.iter().find(|a| a.dtype() != dtype) {
        return Err(Error::DtypeMismatch {
            op: "add_n_array",
            expected: dtype,
            actual: a.dtype(),
        });
    }

    let len = arrays.iter().map(|a| a.len()).max().unwrap_or(0);
    let slots = (0..len)
        .map(|i| {
            let present: Vec<&DenseTensor> = arrays.iter().filter_map(|a| a.get(i)).collect();
            if present.is_empty() {
                Ok(None)
            } else {
                add_n(ctx, &present).map(Some)
            }
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(TensorArray::from_slots(dtype, slots))
}

/// A dense copy of slot `start`.
pub fn slice_array_dense<C: DeviceContext + ?Sized>(
    ctx: &C,
    array: &TensorArray,
    start: i64,
) -> Result<DenseTensor> {
    assign(ctx, array.read(start, "slice_array_dense")?)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::kernels::CpuContext;

    fn array_of(rows: &[&[f32]]) -> TensorArray {
        TensorArray::from_tensors(
            DataType::Float32,
            rows.iter()
                .map(|r| DenseTensor::from_vec(r.to_vec(), &[1, r.len()]).unwrap())
                .collect(),
        )
    }

    #[test]
    fn concat_round_trip_through_gradient() {
        let ctx = CpuContext::new();
        let a = array_of(&[&[1., 2.], &[3., 4., 5.]]);
        let (out, index) = array_to_tensor(&ctx, &a, 1, false).unwrap();
        assert_eq!(out.dims(), &[1, 5]);
        assert_eq!(index.to_vec::<i32>().unwrap(), vec![2, 3]);

        let grads = tensor_to_array(&ctx, &a, &out, 1, false).unwrap();
        assert_eq!(grads.len(), 2);
        assert_eq!(grads.get(1).unwrap().to_vec::<f32>().unwrap(), vec![3., 4., 5.]);
    }

    #[test]
    fn stack_round_trip_through_gradient() {
        let ctx = CpuContext::new();
        let a = array_of(&[&[1., 2.], &[3., 4.], &[5., 6.]]);
        let (out, index) = array_to_tensor(&ctx, &a, 0, true).unwrap();
        assert_eq!(out.dims(), &[3, 1, 2]);
        assert_eq!(index.to_vec::<i32>().unwrap(), vec![1, 1, 1]);

        let grads = tensor_to_array(&ctx, &a, &out, 0, true).unwrap();
        assert_eq!(grads.get(2).unwrap().dims(), &[1, 2]);
        assert_eq!(grads.get(2).unwrap().to_vec::<f32>().unwrap(), vec![5., 6.]);
    }

    #[rstest]
    #[case::lower_rank(1, false)]
    #[case::same_rank(0, false)]
    #[case::stacked(0, true)]
    fn mismatched_slots_are_rejected(#[case] axis: i64, #[case] use_stack: bool) {
        let ctx = CpuContext::new();
        let a = array_of(&[&[1., 2.]])
            .with_item(1, DenseTensor::from_vec(vec![3f32], &[1]).unwrap(), "test")
            .unwrap();
        assert!(matches!(
            array_to_tensor(&ctx, &a, axis, use_stack),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn gradient_that_does_not_fit_the_slots_is_rejected() {
        let ctx = CpuContext::new();
        let a = array_of(&[&[1., 2.], &[3., 4., 5.]]);
        let short = DenseTensor::from_vec(vec![0f32; 4], &[1, 4]).unwrap();
        assert!(matches!(
            tensor_to_array(&ctx, &a, &short, 1, false),
            Err(Error::ShapeMismatch { .. })
        ));

        let stacked = DenseTensor::from_vec(vec![0f32; 4], &[2, 1, 2]).unwrap();
        let three = array_of(&[&[1., 2.], &[3., 4.], &[5., 6.]]);
        assert!(matches!(
            tensor_to_array(&ctx, &three, &stacked, 0, true),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn empty_array_can_not_become_tensor() {
        let ctx = CpuContext::new();
        let a = TensorArray::new(DataType::Float32);
        assert!(array_to_tensor(&ctx, &a, 0, true).is_err());
        assert_eq!(array_length(&ctx, &a).unwrap().to_vec::<i64>().unwrap(), vec![0]);
    }

    #[test]
    fn add_n_array_sums_overlapping_slots() {
        let ctx = CpuContext::new();
        let a = array_of(&[&[1., 1.], &[2., 2.]]);
        let b = array_of(&[&[10., 10.]]);
        let sum = add_n_array(&ctx, &[&a, &b]).unwrap();
        assert_eq!(sum.len(), 2);
        assert_eq!(sum.get(0).unwrap().to_vec::<f32>().unwrap(), vec![11., 11.]);
        assert_eq!(sum.get(1).unwrap().to_vec::<f32>().unwrap(), vec![2., 2.]);
    }

    #[test]
    fn like_and_slice() {
        let ctx = CpuContext::new();
        let a = array_of(&[&[1., 2.]])
            .with_item(2, DenseTensor::from_vec(vec![7f32], &[1]).unwrap(), "test")
            .unwrap();
        let ones = create_array_like(&ctx, &a, 1.0).unwrap();
        assert_eq!(ones.len(), 3);
        assert!(ones.get(1).is_none());
        assert_eq!(ones.get(2).unwrap().to_vec::<f32>().unwrap(), vec![1.]);

        let s = slice_array_dense(&ctx, &a, 2).unwrap();
        assert_eq!(s.to_vec::<f32>().unwrap(), vec![7.]);
        assert!(!s.shares_storage_with(a.get(2).unwrap()));
    }
}
