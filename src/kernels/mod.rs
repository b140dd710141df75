pub mod array;
pub mod concat_split;
pub mod context;
pub mod elementwise;
pub mod embedding;
pub mod registry;
pub mod view;
pub mod view_grad;

pub use array::{
    add_n_array, array_length, array_to_tensor, create_array_like, slice_array_dense,
    tensor_to_array,
};
pub use concat_split::{concat, split, stack, unstack};
pub use context::{CpuContext, CustomContext, DeviceContext};
pub use elementwise::{add_n, assign, full, full_like, scale};
pub use embedding::embedding_grad;
pub use registry::{Attribute, DataLayout, KernelArgs, KernelFactory, KernelFn, KernelKey};
pub use view::{infer_view_dims, view_dtype, view_shape};
pub use view_grad::{view_dtype_grad, view_shape_grad};
