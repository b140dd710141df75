use std::{collections::HashMap, fmt, sync::OnceLock};

use log::debug;

use crate::{
    error::{Error, Result},
    kernels::{DeviceContext, elementwise, view, view_grad},
    tensor::DenseTensor,
    types::{Backend, DataType},
};

/// Tensor representation a kernel accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataLayout {
    /// Any layout; the kernel normalizes its inputs itself.
    AllLayout,
    /// Kernels that work on strides directly and never copy.
    Strided,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelKey {
    pub backend: Backend,
    pub layout: DataLayout,
    pub dtype: DataType,
}

impl fmt::Display for KernelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {:?}, {})", self.backend, self.layout, self.dtype)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Int64s(Vec<i64>),
    DataType(DataType),
    Float(f64),
    Bool(bool),
}

pub struct KernelArgs<'a> {
    pub name: &'static str,
    pub inputs: Vec<&'a DenseTensor>,
    pub attrs: Vec<Attribute>,
}

impl<'a> KernelArgs<'a> {
    pub fn new(name: &'static str, inputs: Vec<&'a DenseTensor>, attrs: Vec<Attribute>) -> Self {
        Self {
            name,
            inputs,
            attrs,
        }
    }

    pub fn input(&self, i: usize) -> Result<&'a DenseTensor> {
        self.inputs.get(i).copied().ok_or_else(|| Error::KernelArgs {
            name: self.name,
            reason: format!("missing input {i}"),
        })
    }

    pub fn int64s(&self, i: usize) -> Result<&[i64]> {
        match self.attrs.get(i) {
            Some(Attribute::Int64s(v)) => Ok(v),
            other => Err(self.bad_attr(i, "int64s", other)),
        }
    }

    pub fn dtype(&self, i: usize) -> Result<DataType> {
        match self.attrs.get(i) {
            Some(Attribute::DataType(d)) => Ok(*d),
            other => Err(self.bad_attr(i, "dtype", other)),
        }
    }

    pub fn float(&self, i: usize) -> Result<f64> {
        match self.attrs.get(i) {
            Some(Attribute::Float(v)) => Ok(*v),
            other => Err(self.bad_attr(i, "float", other)),
        }
    }

    pub fn bool(&self, i: usize) -> Result<bool> {
        match self.attrs.get(i) {
            Some(Attribute::Bool(v)) => Ok(*v),
            other => Err(self.bad_attr(i, "bool", other)),
        }
    }

    fn bad_attr(&self, i: usize, expected: &str, got: Option<&Attribute>) -> Error {
        Error::KernelArgs {
            name: self.name,
            reason: format!("attribute {i} should be {expected}, got {got:?}"),
        }
    }
}

pub type KernelFn = fn(&dyn DeviceContext, &KernelArgs<'_>) -> Result<DenseTensor>;

/// Maps an op name and a `KernelKey` to the function that runs it.
#[derive(Default)]
pub struct KernelFactory {
    kernels: HashMap<&'static str, HashMap<KernelKey, KernelFn>>,
}

impl KernelFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory holding every kernel this crate ships.
    pub fn with_builtin() -> Self {
        let mut factory = Self::new();
        view::register(&mut factory);
        view_grad::register(&mut factory);
        elementwise::register(&mut factory);
        factory
    }

    pub fn global() -> &'static KernelFactory {
        static FACTORY: OnceLock<KernelFactory> = OnceLock::new();
        FACTORY.get_or_init(Self::with_builtin)
    }

    pub fn register(&mut self, name: &'static str, key: KernelKey, kernel: KernelFn) {
        self.kernels.entry(name).or_default().insert(key, kernel);
    }

    fn register_backends(
        &mut self,
        name: &'static str,
        layout: DataLayout,
        backends: impl Iterator<Item = Backend>,
        kernel: KernelFn,
    ) {
        for backend in backends {
            for dtype in DataType::ALL {
                let key = KernelKey {
                    backend,
                    layout,
                    dtype,
                };
                self.register(name, key, kernel);
            }
        }
    }

    pub fn register_all_backends(&mut self, name: &'static str, layout: DataLayout, kernel: KernelFn) {
        self.register_backends(name, layout, Backend::ALL.into_iter(), kernel);
    }

    /// Registers `kernel` for every dtype on every backend but custom devices,
    /// which bring their own kernels.
    pub fn register_all_backends_except_custom(
        &mut self,
        name: &'static str,
        layout: DataLayout,
        kernel: KernelFn,
    ) {
        let backends = Backend::ALL.into_iter().filter(|b| *b != Backend::Custom);
        self.register_backends(name, layout, backends, kernel);
    }

    pub fn has_kernel(&self, name: &str) -> bool {
        self.kernels.contains_key(name)
    }

    /// Exact match first, then the same key under `AllLayout`.
    pub fn select(&self, name: &str, key: KernelKey) -> Result<KernelFn> {
        let not_found = || Error::KernelNotFound {
            name: name.to_string(),
            key: key.to_string(),
        };
        let table = self.kernels.get(name).ok_or_else(not_found)?;
        let fallback = KernelKey {
            layout: DataLayout::AllLayout,
            ..key
        };
        table
            .get(&key)
            .or_else(|| table.get(&fallback))
            .copied()
            .ok_or_else(not_found)
    }

    /// Selects by the context's backend and the first input's dtype, then runs.
    pub fn run(
        &self,
        ctx: &dyn DeviceContext,
        layout: DataLayout,
        args: KernelArgs<'_>,
    ) -> Result<DenseTensor> {
        let key = KernelKey {
            backend: ctx.backend(),
            layout,
            dtype: args.input(0)?.dtype(),
        };
        debug!("dispatch kernel `{}` for {key}", args.name);
        let kernel = self.select(args.name, key)?;
        kernel(ctx, &args)
    }
}
