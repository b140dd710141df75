use std::fmt;

use crate::identity::Id;

/// Handle to one output of a node in the graph under construction.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct Value {
    id: Id,
}

impl Value {
    pub fn new(id: Id) -> Value {
        Value { id }
    }

    pub fn id(&self) -> Id {
        self.id
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
