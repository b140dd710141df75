pub mod dtype;
pub mod layout;
pub mod place;
pub mod value_type;

pub use dtype::DataType;
pub use layout::{Layout, normalize_axis, reshape_stride};
pub use place::{Backend, Place};
pub use value_type::{ArrayType, DYNAMIC, TensorType, ValueType, join_dims, unify_dims};
