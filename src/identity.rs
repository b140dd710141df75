pub trait IdGenerator {
    type Id: Copy + Eq + std::hash::Hash;
    fn fresh(&mut self) -> Self::Id;
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Id(usize);

impl Id {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0)
    }
}

pub mod generators {
    use crate::identity::{self, IdGenerator};

    /// Hands out increasing ids. Values in a graph are never released, so
    /// ids double as a definition order.
    #[derive(Debug, Clone, Default)]
    pub struct Sequential {
        counter: usize,
    }

    impl Sequential {
        pub fn new() -> Sequential {
            Self { counter: 0 }
        }
    }

    impl IdGenerator for Sequential {
        type Id = identity::Id;

        fn fresh(&mut self) -> Self::Id {
            self.counter += 1;
            identity::Id(self.counter)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{IdGenerator, generators::Sequential};

    #[test]
    fn sequential_ids_increase() {
        let mut g = Sequential::new();
        let a = g.fresh();
        let b = g.fresh();
        assert!(a < b);
        assert_eq!(a.to_string(), "%1");
    }
}
