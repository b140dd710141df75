use log::debug;

use crate::{
    builder::{Builder, Value},
    context::Context,
    error::{Error, Result},
    graph::Graph,
    identity::Id,
    tensor::RuntimeValue,
};

/// A finished graph together with its feeds and results.
#[derive(Debug, Clone)]
pub struct Program {
    pub graph: Graph,
    pub inputs: Vec<Id>,
    pub outputs: Vec<Id>,
}

impl Program {
    /// Runs `f` against a fresh graph; the values it returns become the
    /// program outputs and every `data` node becomes an input, in order.
    pub fn build<F>(f: F) -> Result<Program>
    where
        F: FnOnce(&mut Builder<'_>) -> Result<Vec<Value>>,
    {
        let mut graph = Graph::new();
        let outputs = f(&mut Builder::new(&mut graph))?;
        let inputs = graph.inputs().to_vec();
        Ok(Program {
            graph,
            inputs,
            outputs: outputs.iter().map(Value::id).collect(),
        })
    }

    pub fn run(&self, ctx: &mut Context, feeds: Vec<RuntimeValue>) -> Result<Vec<RuntimeValue>> {
        if feeds.len() != self.inputs.len() {
            return Err(Error::FeedCount {
                expected: self.inputs.len(),
                actual: feeds.len(),
            });
        }
        for (&id, feed) in self.inputs.iter().zip(feeds) {
            ctx.insert(id, feed);
        }

        let check_types = ctx.config().check_types;
        for node in &self.graph.nodes {
            debug!("run {} {:?} -> {:?}", node.name(), node.inputs(), node.outputs());
            node.eval(ctx)?;
            if check_types {
                for id in node.outputs() {
                    self.check(ctx, id)?;
                }
            }
        }

        self.outputs
            .iter()
            .map(|id| ctx.checked_get(id).cloned())
            .collect()
    }

    fn check(&self, ctx: &Context, id: Id) -> Result<()> {
        let ty = self.graph.value_type(id)?;
        let value = ctx.checked_get(&id)?;
        if value.conforms_to(ty) {
            return Ok(());
        }
        Err(Error::RuntimeType {
            id,
            expected: ty.to_string(),
            actual: describe(value),
        })
    }
}

fn describe(value: &RuntimeValue) -> String {
    match value {
        RuntimeValue::Tensor(t) => format!("{} tensor {:?}", t.dtype(), t.dims()),
        RuntimeValue::Array(a) => format!("{} array of {} slots", a.dtype(), a.len()),
        RuntimeValue::Vector(vs) => format!("vector of {}", vs.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ExecutorConfig, kernels::CpuContext, tensor::DenseTensor, types::DataType};

    fn program() -> Program {
        Program::build(|b| {
            let x = b.data("x", &[2, 2], DataType::Float32);
            let y = b.view_shape(x, &[4])?;
            Ok(vec![b.scale(y, 3.0, 0.0, true)?])
        })
        .unwrap()
    }

    #[test]
    fn graph_lists_nodes_with_types() {
        let text = program().graph.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "0: data () -> (%1: tensor<2x2xfloat32>)");
        assert_eq!(lines[1], "1: view_shape (%1) -> (%2: tensor<4xfloat32>)");
        assert!(lines[2].starts_with("2: scale (%2)"));
    }

    #[test]
    fn type_checks_can_be_turned_off() {
        let program = program();
        let bad = DenseTensor::from_vec(vec![1f32; 4], &[4]).unwrap();

        let mut checked = Context::new();
        assert!(matches!(
            program.run(&mut checked, vec![bad.clone().into()]),
            Err(Error::RuntimeType { .. })
        ));

        let mut unchecked = Context::with_device(CpuContext::new(), ExecutorConfig::unchecked());
        let out = program.run(&mut unchecked, vec![bad.into()]).unwrap();
        assert_eq!(
            out[0].as_tensor("test").unwrap().to_vec::<f32>().unwrap(),
            vec![3.; 4]
        );
    }

    #[test]
    fn build_errors_propagate() {
        let err = Program::build(|b| {
            let x = b.data("x", &[3], DataType::Float32);
            Ok(vec![b.view_dtype(x, DataType::Float64)?])
        });
        assert!(matches!(err, Err(Error::NotViewable(_))));
    }
}
