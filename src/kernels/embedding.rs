use log::debug;
use ndarray::Array2;

use crate::{
    error::{Error, Result},
    kernels::DeviceContext,
    tensor::{DenseTensor, Numeric, dispatch_numeric},
};

fn scatter_rows<T: Numeric>(
    ids: &[i64],
    out_grad: &DenseTensor,
    vocab: usize,
    width: usize,
    padding_idx: i64,
) -> Result<DenseTensor> {
    let og = Array2::from_shape_vec((ids.len(), width), out_grad.to_vec::<T>()?)
        .map_err(|e| Error::Invalid(e.to_string()))?;
    let mut grad = Array2::<T>::zeros((vocab, width));
    for (row, &id) in ids.iter().enumerate() {
        if padding_idx >= 0 && id == padding_idx {
            continue;
        }
        if id < 0 || id as usize >= vocab {
            return Err(Error::IndexOutOfRange {
                op: "embedding_grad",
                index: id,
                len: vocab,
            });
        }
        let mut dst = grad.row_mut(id as usize);
        dst += &og.row(row);
    }
    DenseTensor::from_ndarray(&grad.into_dyn())
}

/// Gradient of an embedding lookup with respect to its `[vocab, width]`
/// weight: every `out_grad` row is added to the weight row its id selected.
/// Rows whose id equals a non-negative `padding_idx` are dropped.
pub fn embedding_grad<C: DeviceContext + ?Sized>(
    _ctx: &C,
    x: &DenseTensor,
    weight: &DenseTensor,
    out_grad: &DenseTensor,
    padding_idx: i64,
    sparse: bool,
) -> Result<DenseTensor> {
    let ids = x.to_indices("embedding_grad")?;
    let &[vocab, width] = weight.dims() else {
        return Err(Error::ShapeMismatch {
            op: "embedding_grad",
            lhs: weight.dims_i64(),
            rhs: vec![-1, -1],
        });
    };
    let mut expected = x.dims_i64();
    expected.push(width as i64);
    if out_grad.dims_i64() != expected {
        return Err(Error::ShapeMismatch {
            op: "embedding_grad",
            lhs: expected,
            rhs: out_grad.dims_i64(),
        });
    }
    if out_grad.dtype() != weight.dtype() {
        return Err(Error::DtypeMismatch {
            op: "embedding_grad",
            expected: weight.dtype(),
            actual: out_grad.dtype(),
        });
    }
    if sparse {
        debug!("embedding_grad: sparse gradient is produced as a dense tensor");
    }

    let grad = dispatch_numeric!(weight.dtype(), "embedding_grad", |T| {
        scatter_rows::<T>(&ids, out_grad, vocab, width, padding_idx)
    })?;
    Ok(grad.with_place(weight.place().clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::CpuContext;

    fn setup() -> (DenseTensor, DenseTensor, DenseTensor) {
        let ids = DenseTensor::from_vec(vec![0i64, 2, 0], &[3]).unwrap();
        let weight = DenseTensor::from_vec(vec![0f32; 8], &[4, 2]).unwrap();
        let og = DenseTensor::from_vec(vec![1f32, 2., 3., 4., 5., 6.], &[3, 2]).unwrap();
        (ids, weight, og)
    }

    #[test]
    fn accumulates_repeated_ids() {
        let (ids, weight, og) = setup();
        let g = embedding_grad(&CpuContext::new(), &ids, &weight, &og, -1, false).unwrap();
        assert_eq!(g.dims(), &[4, 2]);
        assert_eq!(
            g.to_vec::<f32>().unwrap(),
            vec![6., 8., 0., 0., 3., 4., 0., 0.]
        );
    }

    #[test]
    fn skips_padding_rows() {
        let (ids, weight, og) = setup();
        let g = embedding_grad(&CpuContext::new(), &ids, &weight, &og, 0, true).unwrap();
        assert_eq!(
            g.to_vec::<f32>().unwrap(),
            vec![0., 0., 0., 0., 3., 4., 0., 0.]
        );
    }

    #[test]
    fn rejects_out_of_range_ids_and_bad_shapes() {
        let (_, weight, og) = setup();
        let ids = DenseTensor::from_vec(vec![0i32, 9, 1], &[3]).unwrap();
        assert!(matches!(
            embedding_grad(&CpuContext::new(), &ids, &weight, &og, -1, false),
            Err(Error::IndexOutOfRange { index: 9, .. })
        ));

        let short = DenseTensor::from_vec(vec![0i64, 1], &[2]).unwrap();
        assert!(matches!(
            embedding_grad(&CpuContext::new(), &short, &weight, &og, -1, false),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
