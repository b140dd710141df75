//! Symbolic reverse mode. Gradients are new nodes appended to the same graph,
//! so they run with the rest of the program.

use std::collections::HashMap;

use log::trace;

use crate::{
    builder::{Builder, Value},
    error::{Error, Result},
    identity::Id,
    types::ValueType,
};

/// Gradients of `outputs` with respect to `wrt`, one per `wrt` value and
/// `None` where nothing flows back. Without `seeds` every output is seeded
/// with ones.
pub fn grad(
    b: &mut Builder<'_>,
    outputs: &[Value],
    seeds: Option<&[Value]>,
    wrt: &[Value],
) -> Result<Vec<Option<Value>>> {
    if let Some(seeds) = seeds {
        if seeds.len() != outputs.len() {
            return Err(Error::Invalid(format!(
                "grad: {} seeds for {} outputs",
                seeds.len(),
                outputs.len()
            )));
        }
    }
    let end = b.graph().len();
    let mut grads: HashMap<Id, Vec<Value>> = HashMap::new();

    for (i, &out) in outputs.iter().enumerate() {
        let seed = match seeds {
            Some(seeds) => seeds[i],
            None => b.ones_like(out, None, None)?,
        };
        grads.entry(out.id()).or_default().push(seed);
    }

    for index in (0..end).rev() {
        let node = b.graph().nodes[index].clone();
        let out_grads = node
            .outputs()
            .into_iter()
            .map(|id| accumulate(b, &mut grads, id))
            .collect::<Result<Vec<_>>>()?;
        if out_grads.iter().all(Option::is_none) {
            continue;
        }
        trace!("vjp {} {:?}", node.name(), node.outputs());
        let in_grads = node.vjp(b, &out_grads)?;
        for (id, g) in node.inputs().into_iter().zip(in_grads) {
            if let Some(g) = g {
                grads.entry(id).or_default().push(g);
            }
        }
    }

    wrt.iter()
        .map(|v| accumulate(b, &mut grads, v.id()))
        .collect()
}

/// Folds every contribution to `id` into one value and keeps it for later
/// lookups.
fn accumulate(
    b: &mut Builder<'_>,
    grads: &mut HashMap<Id, Vec<Value>>,
    id: Id,
) -> Result<Option<Value>> {
    let total = match grads.get(&id).map(Vec::as_slice) {
        None | Some([]) => return Ok(None),
        Some([single]) => return Ok(Some(*single)),
        Some(parts) => {
            let parts = parts.to_vec();
            sum(b, &parts)?
        }
    };
    grads.insert(id, vec![total]);
    Ok(Some(total))
}

fn sum(b: &mut Builder<'_>, parts: &[Value]) -> Result<Value> {
    match b.type_of(parts[0])?.clone() {
        ValueType::Tensor(_) => b.add_n(parts),
        ValueType::Array(_) => b.add_n_array(parts),
        ValueType::Vector(items) => {
            let pieces = parts
                .iter()
                .map(|&p| b.builtin_split(p))
                .collect::<Result<Vec<_>>>()?;
            let summed = (0..items.len())
                .map(|i| {
                    let column: Vec<Value> = pieces.iter().map(|p| p[i]).collect();
                    sum(b, &column)
                })
                .collect::<Result<Vec<_>>>()?;
            b.builtin_combine(&summed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        builder::Program,
        context::Context,
        tensor::{DenseTensor, RuntimeValue, TensorArray},
        types::DataType,
    };

    fn floats(v: &RuntimeValue) -> Vec<f32> {
        v.as_tensor("test").unwrap().to_vec::<f32>().unwrap()
    }

    #[test]
    fn chain_through_view_and_scale() {
        let program = Program::build(|b| {
            let x = b.data("x", &[2, 3], DataType::Float32);
            let v = b.view_shape(x, &[3, 2])?;
            let y = b.scale(v, 2.0, 1.0, true)?;
            let g = grad(b, &[y], None, &[x])?;
            Ok(vec![g[0].unwrap()])
        })
        .unwrap();
        assert!(program.graph.nodes.iter().any(|n| n.name() == "view_grad_shape"));

        let x = DenseTensor::from_vec(vec![0f32; 6], &[2, 3]).unwrap();
        let out = program.run(&mut Context::new(), vec![x.into()]).unwrap();
        let g = out[0].as_tensor("test").unwrap();
        assert_eq!(g.dims(), &[2, 3]);
        assert_eq!(floats(&out[0]), vec![2.0; 6]);
    }

    #[test]
    fn reused_values_accumulate() {
        let program = Program::build(|b| {
            let x = b.data("x", &[2], DataType::Float32);
            let y = b.add_n(&[x, x])?;
            let z = b.add_n(&[y, x])?;
            let g = grad(b, &[z], None, &[x, y])?;
            Ok(vec![g[0].unwrap(), g[1].unwrap()])
        })
        .unwrap();

        let x = DenseTensor::from_vec(vec![5f32, 7.], &[2]).unwrap();
        let out = program.run(&mut Context::new(), vec![x.into()]).unwrap();
        assert_eq!(floats(&out[0]), vec![3., 3.]);
        assert_eq!(floats(&out[1]), vec![1., 1.]);
    }

    #[test]
    fn split_and_concat_route_seeds() {
        let program = Program::build(|b| {
            let x = b.data("x", &[1, 6], DataType::Float32);
            let seed = b.data("seed", &[1, 4], DataType::Float32);
            let parts = b.split_with_num(x, 3, 1)?;
            let z = b.concat(&[parts[2], parts[0]], 1)?;
            let g = grad(b, &[z], Some(&[seed]), &[x])?;
            Ok(vec![g[0].unwrap()])
        })
        .unwrap();

        let x = DenseTensor::from_vec(vec![0f32; 6], &[1, 6]).unwrap();
        let seed = DenseTensor::from_vec(vec![1f32, 2., 3., 4.], &[1, 4]).unwrap();
        let out = program
            .run(&mut Context::new(), vec![x.into(), seed.into()])
            .unwrap();
        assert_eq!(floats(&out[0]), vec![3., 4., 0., 0., 1., 2.]);
    }

    #[test]
    fn dtype_view_grad_restores_dtype() {
        Program::build(|b| {
            let x = b.data("x", &[2, 2], DataType::Float32);
            let h = b.view_dtype(x, DataType::Float16)?;
            let g = grad(b, &[h], None, &[x])?;
            let g = g[0].unwrap();
            assert_eq!(b.type_of(g)?.to_string(), "tensor<2x2xfloat32>");
            Ok(vec![g])
        })
        .unwrap();
    }

    #[test]
    fn array_to_tensor_grad_is_an_array() {
        let program = Program::build(|b| {
            let a = b.create_array(DataType::Float32);
            let x = b.data("x", &[1, 2], DataType::Float32);
            let i0 = b.data("i0", &[1], DataType::Int64);
            let i1 = b.data("i1", &[1], DataType::Int64);
            let a = b.array_write_(a, x, i0)?;
            let a = b.array_write_(a, x, i1)?;
            let (out, _) = b.array_to_tensor(a, 0, true)?;
            let seed = b.data("seed", &[2, 1, 2], DataType::Float32);
            let g = grad(b, &[out], Some(&[seed]), &[a, x])?;
            assert!(g[1].is_none());
            Ok(vec![g[0].unwrap()])
        })
        .unwrap();

        let x = DenseTensor::from_vec(vec![0f32; 2], &[1, 2]).unwrap();
        let i0 = DenseTensor::from_vec(vec![0i64], &[1]).unwrap();
        let i1 = DenseTensor::from_vec(vec![1i64], &[1]).unwrap();
        let seed = DenseTensor::from_vec(vec![1f32, 2., 3., 4.], &[2, 1, 2]).unwrap();
        let out = program
            .run(&mut Context::new(), vec![x.into(), i0.into(), i1.into(), seed.into()])
            .unwrap();
        let g: &TensorArray = out[0].as_array("test").unwrap();
        assert_eq!(g.len(), 2);
        assert_eq!(g.get(1).unwrap().to_vec::<f32>().unwrap(), vec![3., 4.]);
    }

    #[test]
    fn unreachable_inputs_get_none() {
        Program::build(|b| {
            let x = b.data("x", &[2], DataType::Float32);
            let y = b.data("y", &[2], DataType::Float32);
            let z = b.assign(x)?;
            let g = grad(b, &[z], None, &[x, y])?;
            assert!(g[0].is_some());
            assert!(g[1].is_none());
            Ok(vec![z])
        })
        .unwrap();
    }
}
