//! A small tensor IR: a builder that records typed nodes, strided view
//! kernels, and a host interpreter that runs the result.
//!
//! ```rust
//! use irgrad::{Context, DataType, DenseTensor, Program, grad};
//!
//! let program = Program::build(|b| {
//!     let x = b.data("x", &[2, 3], DataType::Float32);
//!     let y = b.view_shape(x, &[3, -1])?;
//!     let dx = grad(b, &[y], None, &[x])?;
//!     Ok(vec![y, dx[0].unwrap()])
//! })?;
//!
//! let x = DenseTensor::from_vec(vec![1f32, 2., 3., 4., 5., 6.], &[2, 3])?;
//! let out = program.run(&mut Context::new(), vec![x.into()])?;
//! assert_eq!(out[0].as_tensor("y")?.dims(), &[3, 2]);
//! assert_eq!(out[1].as_tensor("dx")?.dims(), &[2, 3]);
//! # Ok::<(), irgrad::Error>(())
//! ```

pub mod autodiff;
pub mod builder;
pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod identity;
pub mod kernels;
pub mod ops;
pub mod tensor;
pub mod types;

pub use autodiff::grad;
pub use builder::{Builder, Program, Value};
pub use config::ExecutorConfig;
pub use context::Context;
pub use error::{Error, Result};
pub use graph::Graph;
pub use identity::Id;
pub use tensor::{DenseTensor, RuntimeValue, TensorArray};
pub use types::{ArrayType, DataType, Place, TensorType, ValueType};
