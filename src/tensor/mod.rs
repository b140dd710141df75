pub mod array;
pub mod convert;
pub mod dense;
pub mod element;
pub mod storage;
pub mod value;

pub use array::TensorArray;
pub use convert::TensorData;
pub use dense::{DenseTensor, TensorMeta};
pub use element::{Element, Numeric};
pub(crate) use element::dispatch_numeric;
pub use storage::Storage;
pub use value::RuntimeValue;
