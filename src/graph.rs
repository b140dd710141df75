use core::fmt::{Display, Formatter, Result as FmtResult};
use std::collections::HashMap;

use itertools::Itertools;
use log::trace;

use crate::{
    error::{Error, Result},
    identity::{Id, IdGenerator, generators::Sequential},
    ops::Op,
    types::{TensorType, ValueType},
};

/// A program under construction: nodes in insertion order, the type of every
/// value they define, and the parameters the program reads or writes.
#[derive(Debug, Clone)]
pub struct Graph<G: IdGenerator<Id = Id> = Sequential> {
    pub nodes: Vec<Box<dyn Op>>,
    types: HashMap<Id, ValueType>,
    parameters: HashMap<String, TensorType>,
    inputs: Vec<Id>,
    generator: G,
}

impl Graph {
    pub fn new() -> Self {
        Self {
            nodes: vec![],
            types: HashMap::new(),
            parameters: HashMap::new(),
            inputs: vec![],
            generator: Sequential::new(),
        }
    }

    pub fn push(&mut self, op: Box<dyn Op>) {
        trace!("emit {} {:?} -> {:?}", op.name(), op.inputs(), op.outputs());
        self.nodes.push(op);
    }

    /// A new value of type `ty`.
    pub fn fresh(&mut self, ty: ValueType) -> Id {
        let id = self.generator.fresh();
        self.types.insert(id, ty);
        id
    }

    pub fn contains(&self, id: Id) -> bool {
        self.types.contains_key(&id)
    }

    pub fn value_type(&self, id: Id) -> Result<&ValueType> {
        self.types.get(&id).ok_or(Error::InvalidValue(id))
    }

    pub(crate) fn add_input(&mut self, id: Id) {
        self.inputs.push(id);
    }

    /// Values fed by position when the program runs.
    pub fn inputs(&self) -> &[Id] {
        &self.inputs
    }

    /// Declares `name`. Redeclaring keeps the dtype and takes the new shape.
    pub fn declare_parameter(&mut self, name: &str, ty: TensorType) -> Result<()> {
        match self.parameters.get(name) {
            Some(prev) if prev.dtype != ty.dtype => {
                return Err(Error::DtypeMismatch {
                    op: "set_parameter",
                    expected: prev.dtype,
                    actual: ty.dtype,
                });
            }
            _ => {}
        }
        self.parameters.insert(name.to_string(), ty);
        Ok(())
    }

    pub fn parameter_type(&self, name: &str) -> Result<&TensorType> {
        self.parameters
            .get(name)
            .ok_or_else(|| Error::UnknownParameter(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Graph {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for (i, node) in self.nodes.iter().enumerate() {
            let outputs = node
                .outputs()
                .iter()
                .map(|id| match self.types.get(id) {
                    Some(ty) => format!("{id}: {ty}"),
                    None => id.to_string(),
                })
                .join(", ");
            writeln!(
                f,
                "{i}: {} ({}) -> ({outputs})",
                node.name(),
                node.inputs().iter().join(", "),
            )?;
        }
        Ok(())
    }
}
